//! Ordered collection deduplicated by a caller-defined identity function.
//!
//! Elements are held as `Rc<T>`. `add_or_find` hands back the instance that
//! is already stored when an identity-equal element exists, so two callers
//! that add "the same" machine end up holding the same allocation
//! (`Rc::ptr_eq`), not two equal copies.

use std::fmt;
use std::rc::Rc;


/// Ordered, identity-deduplicated set.
///
/// Invariant: no two stored elements are equal under `same`.
pub struct IdentitySet<T> {
    items: Vec<Rc<T>>,
    same: fn(&T, &T) -> bool,
}

impl<T: PartialEq> IdentitySet<T> {
    /// An empty set whose identity is `T`'s `PartialEq`.
    pub fn new() -> Self {
        IdentitySet {
            items: Vec::new(),
            same: <T as PartialEq>::eq,
        }
    }
}

impl<T: PartialEq> Default for IdentitySet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IdentitySet<T> {
    /// An empty set using `same` as the identity function.
    pub fn with_identity(same: fn(&T, &T) -> bool) -> Self {
        IdentitySet {
            items: Vec::new(),
            same,
        }
    }

    /// Return the stored element identity-equal to `item`, or append `item`
    /// and return it.
    pub fn add_or_find(&mut self, item: T) -> Rc<T> {
        self.add_or_find_rc(Rc::new(item))
    }

    /// Same as `add_or_find` for an element that is already shared.
    pub fn add_or_find_rc(&mut self, item: Rc<T>) -> Rc<T> {
        if let Some(existing) = self.items.iter().find(|e| (self.same)(e, &item)) {
            return Rc::clone(existing);
        }
        self.items.push(Rc::clone(&item));
        item
    }

    /// `add_or_find` every element of `other`, in order. Elements already
    /// present keep their position; new ones are appended.
    pub fn merge(&mut self, other: &IdentitySet<T>) {
        for item in &other.items {
            self.add_or_find_rc(Rc::clone(item));
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.iter().any(|e| (self.same)(e, item))
    }

    pub fn find<P>(&self, mut predicate: P) -> Option<Rc<T>>
    where
        P: FnMut(&T) -> bool,
    {
        self.items.iter().find(|e| predicate(e)).cloned()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rc<T>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Snapshot of the stored instances, in order.
    pub fn to_vec(&self) -> Vec<Rc<T>> {
        self.items.clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for IdentitySet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<'a, T> IntoIterator for &'a IdentitySet<T> {
    type Item = &'a Rc<T>;
    type IntoIter = std::slice::Iter<'a, Rc<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: PartialEq> FromIterator<T> for IdentitySet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = IdentitySet::new();
        for item in iter {
            set.add_or_find(item);
        }
        set
    }
}
