// Copyright (c) 2016-2020 Fabian Schuiki

//! A SystemVerilog elaboration engine.
//!
//! This crate ties together the member crates of the silica compiler. The
//! interesting parts live in [`svlog`], which elaborates SystemVerilog
//! syntax trees into a resolved design hierarchy, and [`common`], which
//! provides diagnostics, source management, and name interning.

// Re-export everything from the common crate.
pub use silica_common as common;

// Pull in the language crates.
pub use silica_svlog as svlog;
