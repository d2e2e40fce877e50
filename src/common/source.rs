// Copyright (c) 2016-2020 Fabian Schuiki

//! A global source file table that assigns an opaque ID to each processed
//! source file. This keeps source locations lean and allows for simple
//! querying of information.

use crate::name::RcStr;
use memmap::Mmap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::rc::Rc;

pub const INVALID_SOURCE: Source = Source(0);
pub const INVALID_LOCATION: Location = Location {
    source: INVALID_SOURCE,
    offset: 0,
};
pub const INVALID_SPAN: Span = Span {
    source: INVALID_SOURCE,
    begin: 0,
    end: 0,
};

/// A handle to a source file managed by the global source manager.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Source(pub u32);

impl Source {
    /// Return the path of this source file.
    pub fn get_path(self) -> RcStr {
        get_source_manager().with(self, |x| x.path.clone())
    }

    /// Access the contents of this source file.
    pub fn get_content(self) -> Rc<SourceContent> {
        get_source_manager().with(self, |x| x.content.clone())
    }

    /// Copy a range of the source content into a string owned by the caller.
    pub fn extract(self, begin: usize, end: usize) -> String {
        self.get_content().extract(begin, end)
    }

    /// Check whether this is the invalid source handle.
    pub fn is_invalid(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0 > 0 {
            write!(f, "Source({}; \"{}\")", self.0, self.get_path())
        } else {
            write!(f, "Source(INVALID)")
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0 > 0 {
            fmt::Display::fmt(&self.get_path(), f)
        } else {
            write!(f, "<invalid>")
        }
    }
}

/// The contents of a source file.
pub struct SourceContent(String);

impl SourceContent {
    /// Obtain the contents as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Obtain the contents as raw bytes.
    pub fn bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Copy a range of the content into a string owned by the caller.
    pub fn extract(&self, begin: usize, end: usize) -> String {
        self.0
            .get(begin..end)
            .map(String::from)
            .unwrap_or_else(String::new)
    }
}

struct SourceFile {
    path: RcStr,
    content: Rc<SourceContent>,
}

/// A manager for source files and their assigned IDs.
pub struct SourceManager {
    map: RefCell<HashMap<RcStr, Source>>,
    vect: RefCell<Vec<Rc<SourceFile>>>,
}

impl SourceManager {
    fn new() -> SourceManager {
        SourceManager {
            map: RefCell::new(HashMap::new()),
            vect: RefCell::new(Vec::new()),
        }
    }

    fn with<F, R>(&self, source: Source, f: F) -> R
    where
        F: FnOnce(&SourceFile) -> R,
    {
        let vect = self.vect.borrow();
        assert!(
            source.0 > 0 && source.0 as usize <= vect.len(),
            "invalid source file handle {:?}",
            source.0
        );
        f(&vect[(source.0 - 1) as usize])
    }

    /// Add an in-memory source file with the given name and content.
    ///
    /// Panics if a file with the same name was added before. Future calls to
    /// `open` with the same filename will yield the provided contents.
    pub fn add(&self, filename: &str, content: &str) -> Source {
        assert!(
            !self.map.borrow().contains_key(filename),
            "add failed: source \"{}\" already exists",
            filename
        );
        self.add_file(RcStr::new(filename), String::from(content))
    }

    /// Create a virtual file from the contents of a string and add it to the
    /// source manager. The file can only be used with the returned `Source`,
    /// since there is no name associated with it by which it could be referred
    /// to.
    pub fn add_anonymous<S>(&self, content: S) -> Source
    where
        S: Into<String>,
    {
        let mut vect = self.vect.borrow_mut();
        vect.push(Rc::new(SourceFile {
            path: RcStr::new("<anonymous>"),
            content: Rc::new(SourceContent(content.into())),
        }));
        Source(vect.len() as u32)
    }

    /// Open a source file on disk, memory-mapping its contents.
    pub fn open(&self, filename: &str) -> Option<Source> {
        if let Some(&id) = self.map.borrow().get(filename) {
            return Some(id);
        }
        let file = File::open(Path::new(filename)).ok()?;
        let mmap = unsafe { Mmap::map(&file).ok()? };
        let content = String::from_utf8_lossy(&mmap).into_owned();
        Some(self.add_file(RcStr::new(filename), content))
    }

    fn add_file(&self, path: RcStr, content: String) -> Source {
        let mut vect = self.vect.borrow_mut();
        vect.push(Rc::new(SourceFile {
            path: path.clone(),
            content: Rc::new(SourceContent(content)),
        }));
        let id = Source(vect.len() as u32);
        self.map.borrow_mut().insert(path, id);
        id
    }
}

/// Get the global source manager.
pub fn get_source_manager() -> Rc<SourceManager> {
    thread_local!(static MNGR: Rc<SourceManager> = {
        Rc::new(SourceManager::new())
    });
    MNGR.with(|x| x.clone())
}

/// A single location within a source file, expressed as a byte offset.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Location {
    pub source: Source,
    pub offset: usize,
}

impl Location {
    /// Create a new location.
    pub fn new(source: Source, offset: usize) -> Location {
        Location { source, offset }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.offset)
    }
}

/// A range of locations within a source file, expressed as byte offsets.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Span {
    pub source: Source,
    pub begin: usize,
    pub end: usize,
}

impl Span {
    /// Create a new span from two byte offsets.
    pub fn new(source: Source, begin: usize, end: usize) -> Span {
        Span { source, begin, end }
    }

    /// Create a new span that covers two spans.
    pub fn union<S: Into<Span>>(a: S, b: S) -> Span {
        let (a, b) = (a.into(), b.into());
        assert_eq!(a.source, b.source, "cannot union spans of separate sources");
        Span {
            source: a.source,
            begin: std::cmp::min(a.begin, b.begin),
            end: std::cmp::max(a.end, b.end),
        }
    }

    /// Return the location at the beginning of this span.
    pub fn begin(&self) -> Location {
        Location {
            source: self.source,
            offset: self.begin,
        }
    }

    /// Return the location at the end of this span.
    pub fn end(&self) -> Location {
        Location {
            source: self.source,
            offset: self.end,
        }
    }

    /// Copy the portion of the source file covered by this span.
    pub fn extract(&self) -> String {
        if self.is_invalid() {
            String::new()
        } else {
            self.source.extract(self.begin, self.end)
        }
    }

    /// Check whether this is the invalid span.
    pub fn is_invalid(&self) -> bool {
        self.source.is_invalid()
    }
}

impl From<Location> for Span {
    fn from(loc: Location) -> Span {
        Span {
            source: loc.source,
            begin: loc.offset,
            end: loc.offset,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}-{}", self.source, self.begin, self.end)
    }
}

/// A wrapper that associates a span with a value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    /// Wrap a given value together with the span it covers.
    pub fn new(value: T, span: Span) -> Spanned<T> {
        Spanned { value, span }
    }

    /// Map the value, preserving the span.
    pub fn map<F, U>(self, f: F) -> Spanned<U>
    where
        F: FnOnce(T) -> U,
    {
        Spanned::new(f(self.value), self.span)
    }
}

impl<T> fmt::Display for Spanned<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.value.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_manager() {
        let sm = get_source_manager();
        let a = sm.add("flabberghasted.sv", "module foo; endmodule");
        assert_eq!(a.extract(0, 6), "module");
        assert_eq!(&*a.get_path(), "flabberghasted.sv");
    }

    #[test]
    fn span_union() {
        let sm = get_source_manager();
        let src = sm.add_anonymous("abcdefghijkl");
        let a = Span::new(src, 2, 5);
        let b = Span::new(src, 7, 9);
        let u = Span::union(a, b);
        assert_eq!(u.begin, 2);
        assert_eq!(u.end, 9);
        assert_eq!(u.extract(), "cdefghi");
    }
}
