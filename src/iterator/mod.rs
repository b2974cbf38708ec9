//! Lazy, single-consumer pull iterators with explicit lifecycle.
//!
//! [`Lazy`] is the crate's sequence contract: a fallible pull protocol
//! (`has_next`/`next`), explicit resource release (`recycle`), once-only
//! consumption and finalisation hooks, and combinators that take `self` by
//! value. Ownership transfer on every combinator call is the discipline that
//! makes single-consumer iteration safe; a wrapped source can no longer be
//! touched by the caller, and recycling a chain recycles everything it owns.
//!
//! Instances are not thread-safe. Moving a chain to another thread is fine;
//! sharing one instance between threads is a precondition violation, not
//! something guarded here.

use std::collections::HashSet;
use std::hash::Hash;
use std::marker::PhantomData;

use rustc_hash::FxHashSet;

use crate::error::{Result, TesseraError};

pub mod intersect;
pub mod merge;
pub mod sorted;

/// A boxed, sendable lazy iterator.
pub type BoxLazy<T> = Box<dyn Lazy<T> + Send>;

/// Pull-based, single-consumer sequence with explicit lifecycle.
pub trait Lazy<T> {
    /// Returns whether another element is available, buffering look-ahead
    /// where the implementation needs it. Errors from the underlying source
    /// surface here or on [`next`](Lazy::next), whichever pulls first.
    fn has_next(&mut self) -> Result<bool>;

    /// Returns the next element. Calling this without a preceding successful
    /// [`has_next`](Lazy::has_next) on an exhausted iterator fails with
    /// [`TesseraError::Exhausted`].
    fn next(&mut self) -> Result<T>;

    /// Releases held resources immediately. Idempotent; safe after
    /// exhaustion and safe to call repeatedly.
    fn recycle(&mut self);

    /// Transforms each element.
    fn map<U, F>(self, f: F) -> Mapped<Self, T, F>
    where
        Self: Sized,
        F: FnMut(T) -> U,
    {
        Mapped { source: self, f, _t: PhantomData }
    }

    /// Expands each element into a nested iterator, flattened in order.
    fn flat_map<U, J, F>(self, f: F) -> FlatMapped<Self, T, J, F>
    where
        Self: Sized,
        J: Lazy<U>,
        F: FnMut(T) -> J,
    {
        FlatMapped { source: self, f, current: None, _t: PhantomData }
    }

    /// Keeps only elements matching the predicate.
    fn filter<P>(self, predicate: P) -> Filtered<Self, T, P>
    where
        Self: Sized,
        P: FnMut(&T) -> bool,
    {
        Filtered { source: self, predicate, buffered: None }
    }

    /// Drops elements already seen. Unordered inputs pay for a hash set;
    /// sorted streams should prefer
    /// [`Forward::distinct_sorted`](sorted::Forward::distinct_sorted).
    fn distinct(self) -> Distinct<Self, T>
    where
        Self: Sized,
        T: Eq + Hash + Clone,
    {
        Distinct { source: self, seen: FxHashSet::default(), buffered: None }
    }

    /// Stops after `limit` elements.
    fn limit(self, limit: u64) -> Limited<Self, T>
    where
        Self: Sized,
    {
        Limited { source: self, remaining: limit, _t: PhantomData }
    }

    /// Skips the first `offset` elements.
    fn offset(self, offset: u64) -> OffsetBy<Self, T>
    where
        Self: Sized,
    {
        OffsetBy { source: self, to_skip: offset, _t: PhantomData }
    }

    /// Concatenates another iterator after this one. Recycling the pair
    /// recycles both.
    fn link<J>(self, other: J) -> Linked<Self, J, T>
    where
        Self: Sized,
        J: Lazy<T>,
    {
        Linked { first: self, second: other, first_done: false, _t: PhantomData }
    }

    /// Registers a hook fired exactly once when the iterator is fully
    /// consumed, errors, or is recycled. Hooks fire in registration order
    /// (innermost first).
    fn on_consumed<F>(self, hook: F) -> Hooked<Self, F>
    where
        Self: Sized,
        F: FnOnce(),
    {
        Hooked { source: self, hook: Some(hook) }
    }

    /// Registers a finalisation hook; same firing discipline as
    /// [`on_consumed`](Lazy::on_consumed), by convention used for resource
    /// release rather than consumption side effects.
    fn on_finalise<F>(self, hook: F) -> Hooked<Self, F>
    where
        Self: Sized,
        F: FnOnce(),
    {
        Hooked { source: self, hook: Some(hook) }
    }

    /// Remaps upstream failures to a domain-specific error before they reach
    /// the consumer.
    fn on_error<F>(self, f: F) -> OnError<Self, F>
    where
        Self: Sized,
        F: FnMut(TesseraError) -> TesseraError,
    {
        OnError { source: self, f }
    }

    /// Erases the concrete type.
    fn boxed(self) -> BoxLazy<T>
    where
        Self: Sized + Send + 'static,
    {
        Box::new(self)
    }

    /// Drains into a vector, recycling before returning, also on error.
    fn to_list(mut self) -> Result<Vec<T>>
    where
        Self: Sized,
    {
        let mut out = Vec::new();
        let res = drain(&mut self, |v| {
            out.push(v);
            true
        });
        self.recycle();
        res.map(|_| out)
    }

    /// Drains into a hash set.
    fn to_set(mut self) -> Result<HashSet<T>>
    where
        Self: Sized,
        T: Eq + Hash,
    {
        let mut out = HashSet::new();
        let res = drain(&mut self, |v| {
            out.insert(v);
            true
        });
        self.recycle();
        res.map(|_| out)
    }

    /// Counts remaining elements.
    fn count(mut self) -> Result<u64>
    where
        Self: Sized,
    {
        let mut n = 0u64;
        let res = drain(&mut self, |_| {
            n += 1;
            true
        });
        self.recycle();
        res.map(|_| n)
    }

    /// Folds remaining elements into an accumulator.
    fn reduce<A, F>(mut self, initial: A, mut accumulate: F) -> Result<A>
    where
        Self: Sized,
        F: FnMut(A, T) -> A,
    {
        let mut acc = Some(initial);
        let res = drain(&mut self, |v| {
            let prev = acc.take();
            acc = prev.map(|a| accumulate(a, v));
            true
        });
        self.recycle();
        res.map(|_| acc.take().expect("reduce accumulator is always restored"))
    }

    /// Returns the first element, if any, recycling the rest.
    fn first(mut self) -> Result<Option<T>>
    where
        Self: Sized,
    {
        let res = match self.has_next() {
            Ok(true) => self.next().map(Some),
            Ok(false) => Ok(None),
            Err(e) => Err(e),
        };
        self.recycle();
        res
    }

    /// Whether every element matches; short-circuits on the first miss.
    fn all_match<P>(mut self, mut predicate: P) -> Result<bool>
    where
        Self: Sized,
        P: FnMut(&T) -> bool,
    {
        let mut all = true;
        let res = drain(&mut self, |v| {
            all = predicate(&v);
            all
        });
        self.recycle();
        res.map(|_| all)
    }

    /// Whether any element matches; short-circuits on the first hit.
    fn any_match<P>(mut self, mut predicate: P) -> Result<bool>
    where
        Self: Sized,
        P: FnMut(&T) -> bool,
    {
        let mut any = false;
        let res = drain(&mut self, |v| {
            any = predicate(&v);
            !any
        });
        self.recycle();
        res.map(|_| any)
    }

    /// Whether no element matches.
    fn none_match<P>(self, predicate: P) -> Result<bool>
    where
        Self: Sized,
        P: FnMut(&T) -> bool,
    {
        self.any_match(predicate).map(|any| !any)
    }
}

/// Pulls every remaining element through `consume`; stops early when
/// `consume` returns false. The caller recycles afterwards.
fn drain<T, I, F>(iter: &mut I, mut consume: F) -> Result<()>
where
    I: Lazy<T> + ?Sized,
    F: FnMut(T) -> bool,
{
    while iter.has_next()? {
        if !consume(iter.next()?) {
            break;
        }
    }
    Ok(())
}

impl<T, L> Lazy<T> for Box<L>
where
    L: Lazy<T> + ?Sized,
{
    fn has_next(&mut self) -> Result<bool> {
        self.as_mut().has_next()
    }

    fn next(&mut self) -> Result<T> {
        self.as_mut().next()
    }

    fn recycle(&mut self) {
        self.as_mut().recycle()
    }
}

/// A lazy iterator over an owned vector.
pub struct Iter<T> {
    items: std::vec::IntoIter<T>,
    buffered: Option<T>,
}

/// Wraps a vector as a lazy iterator.
pub fn iter<T>(items: Vec<T>) -> Iter<T> {
    Iter { items: items.into_iter(), buffered: None }
}

impl<T> Lazy<T> for Iter<T> {
    fn has_next(&mut self) -> Result<bool> {
        if self.buffered.is_none() {
            self.buffered = self.items.next();
        }
        Ok(self.buffered.is_some())
    }

    fn next(&mut self) -> Result<T> {
        if !self.has_next()? {
            return Err(TesseraError::Exhausted);
        }
        self.buffered.take().ok_or(TesseraError::Exhausted)
    }

    fn recycle(&mut self) {
        self.buffered = None;
        self.items = Vec::new().into_iter();
    }
}

/// See [`Lazy::map`].
pub struct Mapped<I, T, F> {
    source: I,
    f: F,
    _t: PhantomData<fn() -> T>,
}

impl<T, U, I, F> Lazy<U> for Mapped<I, T, F>
where
    I: Lazy<T>,
    F: FnMut(T) -> U,
{
    fn has_next(&mut self) -> Result<bool> {
        self.source.has_next()
    }

    fn next(&mut self) -> Result<U> {
        self.source.next().map(&mut self.f)
    }

    fn recycle(&mut self) {
        self.source.recycle()
    }
}

/// See [`Lazy::flat_map`].
pub struct FlatMapped<I, T, J, F> {
    source: I,
    f: F,
    current: Option<J>,
    _t: PhantomData<fn() -> T>,
}

impl<T, U, I, J, F> Lazy<U> for FlatMapped<I, T, J, F>
where
    I: Lazy<T>,
    J: Lazy<U>,
    F: FnMut(T) -> J,
{
    fn has_next(&mut self) -> Result<bool> {
        loop {
            if let Some(current) = &mut self.current {
                if current.has_next()? {
                    return Ok(true);
                }
                current.recycle();
                self.current = None;
            }
            if !self.source.has_next()? {
                return Ok(false);
            }
            let item = self.source.next()?;
            self.current = Some((self.f)(item));
        }
    }

    fn next(&mut self) -> Result<U> {
        if !self.has_next()? {
            return Err(TesseraError::Exhausted);
        }
        match &mut self.current {
            Some(current) => current.next(),
            None => Err(TesseraError::Exhausted),
        }
    }

    fn recycle(&mut self) {
        if let Some(current) = &mut self.current {
            current.recycle();
        }
        self.current = None;
        self.source.recycle();
    }
}

/// See [`Lazy::filter`].
pub struct Filtered<I, T, P> {
    source: I,
    predicate: P,
    buffered: Option<T>,
}

impl<T, I, P> Lazy<T> for Filtered<I, T, P>
where
    I: Lazy<T>,
    P: FnMut(&T) -> bool,
{
    fn has_next(&mut self) -> Result<bool> {
        if self.buffered.is_some() {
            return Ok(true);
        }
        while self.source.has_next()? {
            let candidate = self.source.next()?;
            if (self.predicate)(&candidate) {
                self.buffered = Some(candidate);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn next(&mut self) -> Result<T> {
        if !self.has_next()? {
            return Err(TesseraError::Exhausted);
        }
        self.buffered.take().ok_or(TesseraError::Exhausted)
    }

    fn recycle(&mut self) {
        self.buffered = None;
        self.source.recycle();
    }
}

/// See [`Lazy::distinct`].
pub struct Distinct<I, T> {
    source: I,
    seen: FxHashSet<T>,
    buffered: Option<T>,
}

impl<T, I> Lazy<T> for Distinct<I, T>
where
    I: Lazy<T>,
    T: Eq + Hash + Clone,
{
    fn has_next(&mut self) -> Result<bool> {
        if self.buffered.is_some() {
            return Ok(true);
        }
        while self.source.has_next()? {
            let candidate = self.source.next()?;
            if self.seen.insert(candidate.clone()) {
                self.buffered = Some(candidate);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn next(&mut self) -> Result<T> {
        if !self.has_next()? {
            return Err(TesseraError::Exhausted);
        }
        self.buffered.take().ok_or(TesseraError::Exhausted)
    }

    fn recycle(&mut self) {
        self.buffered = None;
        self.seen.clear();
        self.source.recycle();
    }
}

/// See [`Lazy::limit`].
pub struct Limited<I, T> {
    source: I,
    remaining: u64,
    _t: PhantomData<fn() -> T>,
}

impl<T, I> Lazy<T> for Limited<I, T>
where
    I: Lazy<T>,
{
    fn has_next(&mut self) -> Result<bool> {
        if self.remaining == 0 {
            return Ok(false);
        }
        self.source.has_next()
    }

    fn next(&mut self) -> Result<T> {
        if self.remaining == 0 {
            return Err(TesseraError::Exhausted);
        }
        let item = self.source.next()?;
        self.remaining -= 1;
        Ok(item)
    }

    fn recycle(&mut self) {
        self.source.recycle()
    }
}

/// See [`Lazy::offset`].
pub struct OffsetBy<I, T> {
    source: I,
    to_skip: u64,
    _t: PhantomData<fn() -> T>,
}

impl<T, I> Lazy<T> for OffsetBy<I, T>
where
    I: Lazy<T>,
{
    fn has_next(&mut self) -> Result<bool> {
        while self.to_skip > 0 {
            if !self.source.has_next()? {
                return Ok(false);
            }
            self.source.next()?;
            self.to_skip -= 1;
        }
        self.source.has_next()
    }

    fn next(&mut self) -> Result<T> {
        if !self.has_next()? {
            return Err(TesseraError::Exhausted);
        }
        self.source.next()
    }

    fn recycle(&mut self) {
        self.source.recycle()
    }
}

/// See [`Lazy::link`].
pub struct Linked<A, B, T> {
    first: A,
    second: B,
    first_done: bool,
    _t: PhantomData<fn() -> T>,
}

impl<T, A, B> Lazy<T> for Linked<A, B, T>
where
    A: Lazy<T>,
    B: Lazy<T>,
{
    fn has_next(&mut self) -> Result<bool> {
        if !self.first_done {
            if self.first.has_next()? {
                return Ok(true);
            }
            self.first_done = true;
            self.first.recycle();
        }
        self.second.has_next()
    }

    fn next(&mut self) -> Result<T> {
        if !self.has_next()? {
            return Err(TesseraError::Exhausted);
        }
        if self.first_done { self.second.next() } else { self.first.next() }
    }

    fn recycle(&mut self) {
        self.first.recycle();
        self.second.recycle();
    }
}

/// See [`Lazy::on_consumed`] / [`Lazy::on_finalise`].
pub struct Hooked<I, F: FnOnce()> {
    source: I,
    hook: Option<F>,
}

impl<I, F: FnOnce()> Hooked<I, F> {
    fn fire(&mut self) {
        if let Some(hook) = self.hook.take() {
            hook();
        }
    }
}

impl<T, I, F> Lazy<T> for Hooked<I, F>
where
    I: Lazy<T>,
    F: FnOnce(),
{
    fn has_next(&mut self) -> Result<bool> {
        match self.source.has_next() {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.fire();
                Ok(false)
            }
            Err(e) => {
                self.fire();
                Err(e)
            }
        }
    }

    fn next(&mut self) -> Result<T> {
        match self.source.next() {
            Ok(item) => Ok(item),
            Err(e) => {
                self.fire();
                Err(e)
            }
        }
    }

    fn recycle(&mut self) {
        self.source.recycle();
        self.fire();
    }
}

/// See [`Lazy::on_error`].
pub struct OnError<I, F> {
    source: I,
    f: F,
}

impl<T, I, F> Lazy<T> for OnError<I, F>
where
    I: Lazy<T>,
    F: FnMut(TesseraError) -> TesseraError,
{
    fn has_next(&mut self) -> Result<bool> {
        self.source.has_next().map_err(&mut self.f)
    }

    fn next(&mut self) -> Result<T> {
        self.source.next().map_err(&mut self.f)
    }

    fn recycle(&mut self) {
        self.source.recycle()
    }
}
