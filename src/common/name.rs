// Copyright (c) 2016-2020 Fabian Schuiki

//! A name table that interns strings and assigns them unique IDs. Names are
//! used pervasively throughout the compiler to make comparisons cheap and to
//! keep symbols lean.

use std::borrow::Borrow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

/// An interned string handle. Names compare and hash in constant time.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(pub u32);

impl Name {
    /// Intern a string, yielding its name handle.
    pub fn intern(value: &str) -> Name {
        get_name_table().intern(value)
    }

    /// Obtain the interned string behind this name.
    pub fn as_str(self) -> RcStr {
        get_name_table().get(self)
    }

    /// Check whether this is the empty name.
    pub fn is_empty(self) -> bool {
        self.as_str().is_empty()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "n\"{}\"", self.as_str())
    }
}

/// A reference-counted string that can be cheaply cloned.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct RcStr(Rc<String>);

impl RcStr {
    /// Create a new reference-counted string.
    pub fn new<S: Into<String>>(value: S) -> RcStr {
        RcStr(Rc::new(value.into()))
    }
}

impl Borrow<str> for RcStr {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Deref for RcStr {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RcStr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

/// A table that assigns unique IDs to strings.
pub struct NameTable {
    map: RefCell<HashMap<RcStr, Name>>,
    vect: RefCell<Vec<RcStr>>,
}

impl NameTable {
    fn new() -> NameTable {
        NameTable {
            map: RefCell::new(HashMap::new()),
            vect: RefCell::new(Vec::new()),
        }
    }

    /// Intern a string, yielding its name handle.
    pub fn intern(&self, value: &str) -> Name {
        if let Some(&name) = self.map.borrow().get(value) {
            return name;
        }
        let mut vect = self.vect.borrow_mut();
        let name = Name(vect.len() as u32);
        let value = RcStr::new(value);
        vect.push(value.clone());
        self.map.borrow_mut().insert(value, name);
        name
    }

    /// Obtain the string behind a name handle.
    pub fn get(&self, name: Name) -> RcStr {
        self.vect.borrow()[name.0 as usize].clone()
    }
}

/// Get the global name table.
pub fn get_name_table() -> Rc<NameTable> {
    thread_local!(static TBL: Rc<NameTable> = {
        let tbl = NameTable::new();
        // Reserve ID 0 for the empty name.
        tbl.intern("");
        Rc::new(tbl)
    });
    TBL.with(|x| x.clone())
}

/// The empty name.
pub const EMPTY_NAME: Name = Name(0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_identity() {
        let a = Name::intern("frobnicate");
        let b = Name::intern("frobnicate");
        let c = Name::intern("frobnicatf");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(&*a.as_str(), "frobnicate");
    }

    #[test]
    fn empty_name() {
        assert_eq!(Name::intern(""), EMPTY_NAME);
        assert!(EMPTY_NAME.is_empty());
    }
}
