// Copyright (c) 2016-2020 Fabian Schuiki

//! Arenas that own the nodes allocated during a compilation. Nothing is ever
//! deallocated individually; destroying the arena frees everything in one
//! step.

use typed_arena::Arena;

/// An arena that hands out references to the values moved into it.
pub struct TypedArena<T>(Arena<T>);

impl<T> TypedArena<T> {
    /// Create a new arena.
    pub fn new() -> TypedArena<T> {
        TypedArena(Arena::new())
    }

    /// Move a value into the arena, returning a reference with the arena's
    /// lifetime.
    pub fn alloc(&self, value: T) -> &mut T {
        self.0.alloc(value)
    }

    /// Move an iterator of values into the arena, returning a slice.
    pub fn alloc_extend<I>(&self, iter: I) -> &mut [T]
    where
        I: IntoIterator<Item = T>,
    {
        self.0.alloc_extend(iter)
    }
}

impl<T> Default for TypedArena<T> {
    fn default() -> TypedArena<T> {
        TypedArena::new()
    }
}

/// Allocates values of a specific type.
///
/// Implemented by composite arenas that own several `TypedArena`s, such that
/// `arena.alloc(value)` dispatches to the one matching the value's type.
pub trait Alloc<'a, T> {
    /// Move a value into the arena.
    fn alloc(&'a self, value: T) -> &'a mut T;
}

impl<'a, T: 'a> Alloc<'a, T> for TypedArena<T> {
    fn alloc(&'a self, value: T) -> &'a mut T {
        TypedArena::alloc(self, value)
    }
}
