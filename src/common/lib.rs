// Copyright (c) 2016-2020 Fabian Schuiki

//! This crate contains the fundamental utilities used by the rest of the
//! silica compiler.

pub mod arenas;
pub mod errors;
pub mod name;
pub mod source;
pub mod util;

use crate::errors::{DiagBuilder2, DiagEmitter, Severity};
use std::cell::Cell;

/// A result whose error has already been reported as a diagnostic.
///
/// Functions return `Err(())` after emitting the corresponding diagnostic;
/// callers simply propagate the failure with `?`.
pub type Result<T> = std::result::Result<T, ()>;

/// A compiler session.
///
/// Keeps track of global facts about the current compilation run, most
/// importantly whether any errors have been emitted.
pub struct Session {
    /// Whether any error diagnostics were produced.
    pub failed: Cell<bool>,
}

impl Session {
    /// Create a new session.
    pub fn new() -> Session {
        Session {
            failed: Cell::new(false),
        }
    }

    /// Check whether any error diagnostics were produced.
    pub fn failed(&self) -> bool {
        self.failed.get()
    }
}

impl Default for Session {
    fn default() -> Session {
        Session::new()
    }
}

impl DiagEmitter for Session {
    fn emit(&self, diag: DiagBuilder2) {
        if diag.get_severity() >= Severity::Error {
            self.failed.set(true);
        }
        eprintln!("{}", diag);
    }
}
