//! Composable filter predicates and comparators over in-memory entity values.
//!
//! A [`Predicate`] is a cheap-to-clone boolean test. Predicates are combined with
//! logical AND and evaluated by the repositories against every candidate row;
//! every read path starts from [`Predicate::not_deleted`].

use crate::lifecycle::Entity;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

type Test<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Boolean test over `T`.
pub struct Predicate<T> {
    test: Test<T>,
}

impl<T> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        Self {
            test: Arc::clone(&self.test),
        }
    }
}

impl<T> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").finish_non_exhaustive()
    }
}

impl<T: 'static> Predicate<T> {
    pub fn new<F>(test: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            test: Arc::new(test),
        }
    }

    /// Predicate that accepts everything
    pub fn always() -> Self {
        Self::new(|_| true)
    }

    /// Logical AND. `self` is evaluated first and short-circuits.
    pub fn and(self, other: Predicate<T>) -> Self {
        let (left, right) = (self.test, other.test);
        Self::new(move |value| left(value) && right(value))
    }

    /// Logical OR. `other` runs only when `self` rejects.
    pub fn or(self, other: Predicate<T>) -> Self {
        let (left, right) = (self.test, other.test);
        Self::new(move |value| left(value) || right(value))
    }

    pub fn evaluate(&self, value: &T) -> bool {
        (self.test)(value)
    }

    /// Conjunction of every predicate; `always()` for an empty input
    pub fn all<I>(predicates: I) -> Self
    where
        I: IntoIterator<Item = Predicate<T>>,
    {
        predicates.into_iter().fold(Self::always(), Self::and)
    }
}

impl<T: Entity> Predicate<T> {
    /// Matches rows that have not been soft-deleted
    pub fn not_deleted() -> Self {
        Self::new(|entity: &T| !entity.is_deleted())
    }
}

/// Combine a base predicate with an optional additional one.
pub fn combine<T: 'static>(base: Predicate<T>, additional: Option<Predicate<T>>) -> Predicate<T> {
    match additional {
        Some(additional) => base.and(additional),
        None => base,
    }
}

/// Builds a conjunction from optional filter criteria.
///
/// ```
/// use recipe_hub_domain::predicate::{Predicate, PredicateBuilder};
///
/// let min: Option<u32> = Some(3);
/// let predicate: Predicate<u32> = PredicateBuilder::new()
///     .when_some(min, |min| Predicate::new(move |v: &u32| *v >= min))
///     .when(false, || Predicate::new(|_: &u32| false))
///     .build();
///
/// assert!(predicate.evaluate(&5));
/// assert!(!predicate.evaluate(&2));
/// ```
pub struct PredicateBuilder<T> {
    predicate: Predicate<T>,
    clauses: usize,
}

impl<T: 'static> Default for PredicateBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> PredicateBuilder<T> {
    pub fn new() -> Self {
        Self {
            predicate: Predicate::always(),
            clauses: 0,
        }
    }

    pub fn and(mut self, predicate: Predicate<T>) -> Self {
        self.predicate = self.predicate.and(predicate);
        self.clauses += 1;
        self
    }

    /// Adds the clause produced by `make` only when `condition` holds
    pub fn when<F>(self, condition: bool, make: F) -> Self
    where
        F: FnOnce() -> Predicate<T>,
    {
        if condition {
            self.and(make())
        } else {
            self
        }
    }

    /// Adds a clause for a filter value that may be absent
    pub fn when_some<V, F>(self, value: Option<V>, make: F) -> Self
    where
        F: FnOnce(V) -> Predicate<T>,
    {
        match value {
            Some(value) => self.and(make(value)),
            None => self,
        }
    }

    /// Number of clauses added so far
    pub fn clauses(&self) -> usize {
        self.clauses
    }

    pub fn build(self) -> Predicate<T> {
        self.predicate
    }
}

type Compare<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Sort order applied to a result set before it is sliced into a page.
pub struct Comparator<T> {
    compare: Compare<T>,
}

impl<T> Clone for Comparator<T> {
    fn clone(&self) -> Self {
        Self {
            compare: Arc::clone(&self.compare),
        }
    }
}

impl<T> fmt::Debug for Comparator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comparator").finish_non_exhaustive()
    }
}

impl<T: 'static> Comparator<T> {
    pub fn new<F>(compare: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self {
            compare: Arc::new(compare),
        }
    }

    /// Ascending order of the extracted key
    pub fn by_key<K, F>(key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self::new(move |a, b| key(a).cmp(&key(b)))
    }

    pub fn reversed(self) -> Self {
        let compare = self.compare;
        Self::new(move |a, b| compare(b, a))
    }

    /// Reverses the order when `descending` is set
    pub fn direction(self, descending: bool) -> Self {
        if descending {
            self.reversed()
        } else {
            self
        }
    }

    /// Tie-breaker applied when `self` considers two values equal
    pub fn then(self, next: Comparator<T>) -> Self {
        let (first, second) = (self.compare, next.compare);
        Self::new(move |a, b| first(a, b).then_with(|| second(a, b)))
    }

    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.compare)(a, b)
    }
}
