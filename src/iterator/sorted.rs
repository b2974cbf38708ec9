//! Sorted iterators: the join engine.
//!
//! A [`Sorted`] iterator declares its [`Order`] and exposes a non-destructive
//! [`peek`](Sorted::peek); a [`Forward`] iterator can additionally seek past
//! all elements ordered strictly before a target. Merge and leapfrog
//! intersect compose forwardable streams into relational joins without
//! buffering.
//!
//! Every adapter owns explicit `last`/`next` cursor state. Seeking backward
//! relative to the last returned element is a planning bug and fails with
//! [`TesseraError::OrderingViolation`]; composing iterators with mismatched
//! orders is caught at construction and panics.

use std::cmp::Ordering as CmpOrdering;
use std::collections::VecDeque;
use std::marker::PhantomData;

use super::intersect::Intersected;
use super::merge::Merged;
use super::{Hooked, Lazy, Limited, OnError};
use crate::error::{Result, TesseraError};

/// A boxed, sendable forwardable iterator.
pub type BoxForward<T> = Box<dyn Forward<T> + Send>;

/// Declared direction of a sorted stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Order {
    /// Smallest element first.
    Ascending,
    /// Largest element first.
    Descending,
}

impl Order {
    /// Compares two elements under this order.
    pub fn cmp<T: Ord>(self, a: &T, b: &T) -> CmpOrdering {
        match self {
            Order::Ascending => a.cmp(b),
            Order::Descending => b.cmp(a),
        }
    }

    /// Whether `next` may legally follow `last` in this order.
    pub fn is_valid_next<T: Ord>(self, last: &T, next: &T) -> bool {
        self.cmp(last, next) != CmpOrdering::Greater
    }
}

/// A lazy iterator whose elements arrive in a declared [`Order`].
pub trait Sorted<T: Ord>: Lazy<T> {
    /// The order this iterator was constructed with.
    fn order(&self) -> Order;

    /// Exposes the buffered look-ahead element without consuming it.
    fn peek(&mut self) -> Result<Option<&T>>;
}

/// A sorted iterator that supports seeking ahead.
pub trait Forward<T: Ord>: Sorted<T> {
    /// Skips every element ordered strictly before `target`. When the
    /// buffered look-ahead already satisfies the target no underlying seek
    /// occurs. A target ordered before the last returned element fails with
    /// an ordering violation.
    fn forward(&mut self, target: &T) -> Result<()>;

    /// Order-aware filter; see [`Lazy::filter`].
    fn filter_sorted<P>(self, predicate: P) -> FilteredSorted<Self, T, P>
    where
        Self: Sized,
        T: Clone,
        P: FnMut(&T) -> bool,
    {
        let order = self.order();
        FilteredSorted { source: self, predicate, next: None, last: None, order }
    }

    /// Collapses runs of equal elements; needs no hash set on sorted input.
    fn distinct_sorted(self) -> DistinctSorted<Self, T>
    where
        Self: Sized,
        T: Clone,
    {
        DistinctSorted { source: self, next: None, last: None }
    }

    /// Stops after `limit` elements while staying forwardable.
    fn limit_sorted(self, limit: u64) -> Limited<Self, T>
    where
        Self: Sized,
    {
        Limited { source: self, remaining: limit, _t: PhantomData }
    }

    /// Transforms the element type while preserving forwardability. Seek
    /// targets are translated back through `reverse`. Precondition: `map` is
    /// strictly monotone from the source order into `order`.
    fn map_sorted<U, F, R>(self, map: F, reverse: R, order: Order) -> MappedSorted<Self, T, U, F, R>
    where
        Self: Sized,
        U: Ord + Clone,
        F: FnMut(T) -> U,
        R: FnMut(&U) -> T,
    {
        MappedSorted { source: self, map, reverse, order, next: None, last: None, _t: PhantomData }
    }

    /// Set-union merge with another stream of the same order.
    fn merge<J>(self, other: J) -> Merged<T>
    where
        Self: Sized + Send + 'static,
        J: Forward<T> + Send + 'static,
        T: Clone + Send + 'static,
    {
        let order = self.order();
        Merged::new(vec![Box::new(self), Box::new(other)], order)
    }

    /// Leapfrog intersection with another stream of the same order.
    fn intersect<J>(self, other: J) -> Intersected<T>
    where
        Self: Sized + Send + 'static,
        J: Forward<T> + Send + 'static,
        T: Clone + Send + 'static,
    {
        let order = self.order();
        Intersected::new(vec![Box::new(self), Box::new(other)], order)
    }

    /// Erases the concrete type, keeping forwardability.
    fn boxed_forward(self) -> BoxForward<T>
    where
        Self: Sized + Send + 'static,
    {
        Box::new(self)
    }
}

impl<T: Ord, L> Sorted<T> for Box<L>
where
    L: Sorted<T> + ?Sized,
{
    fn order(&self) -> Order {
        self.as_ref().order()
    }

    fn peek(&mut self) -> Result<Option<&T>> {
        self.as_mut().peek()
    }
}

impl<T: Ord, L> Forward<T> for Box<L>
where
    L: Forward<T> + ?Sized,
{
    fn forward(&mut self, target: &T) -> Result<()> {
        self.as_mut().forward(target)
    }
}

/// A forwardable iterator over an owned, pre-sorted vector.
pub struct SortedIter<T> {
    items: VecDeque<T>,
    order: Order,
    last: Option<T>,
}

/// Wraps a vector as a forwardable sorted iterator. The input must already
/// satisfy `order`; this is checked in debug builds only.
pub fn iter_sorted<T: Ord + Clone>(items: Vec<T>, order: Order) -> SortedIter<T> {
    debug_assert!(
        items.windows(2).all(|w| order.is_valid_next(&w[0], &w[1])),
        "iter_sorted input violates its declared order"
    );
    SortedIter { items: items.into(), order, last: None }
}

impl<T: Ord + Clone> Lazy<T> for SortedIter<T> {
    fn has_next(&mut self) -> Result<bool> {
        Ok(!self.items.is_empty())
    }

    fn next(&mut self) -> Result<T> {
        let item = self.items.pop_front().ok_or(TesseraError::Exhausted)?;
        self.last = Some(item.clone());
        Ok(item)
    }

    fn recycle(&mut self) {
        self.items.clear();
    }
}

impl<T: Ord + Clone> Sorted<T> for SortedIter<T> {
    fn order(&self) -> Order {
        self.order
    }

    fn peek(&mut self) -> Result<Option<&T>> {
        Ok(self.items.front())
    }
}

impl<T: Ord + Clone> Forward<T> for SortedIter<T> {
    fn forward(&mut self, target: &T) -> Result<()> {
        if let Some(last) = &self.last {
            if !self.order.is_valid_next(last, target) {
                return Err(TesseraError::OrderingViolation(
                    "forward target precedes the last returned element",
                ));
            }
        }
        while let Some(front) = self.items.front() {
            if self.order.cmp(front, target) == CmpOrdering::Less {
                self.items.pop_front();
            } else {
                break;
            }
        }
        Ok(())
    }
}

/// See [`Forward::filter_sorted`].
pub struct FilteredSorted<I, T, P> {
    source: I,
    predicate: P,
    next: Option<T>,
    last: Option<T>,
    order: Order,
}

impl<T, I, P> Lazy<T> for FilteredSorted<I, T, P>
where
    T: Ord + Clone,
    I: Forward<T>,
    P: FnMut(&T) -> bool,
{
    fn has_next(&mut self) -> Result<bool> {
        if self.next.is_some() {
            return Ok(true);
        }
        while self.source.has_next()? {
            let candidate = self.source.next()?;
            if (self.predicate)(&candidate) {
                self.next = Some(candidate);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn next(&mut self) -> Result<T> {
        if !self.has_next()? {
            return Err(TesseraError::Exhausted);
        }
        let item = self.next.take().ok_or(TesseraError::Exhausted)?;
        self.last = Some(item.clone());
        Ok(item)
    }

    fn recycle(&mut self) {
        self.next = None;
        self.source.recycle();
    }
}

impl<T, I, P> Sorted<T> for FilteredSorted<I, T, P>
where
    T: Ord + Clone,
    I: Forward<T>,
    P: FnMut(&T) -> bool,
{
    fn order(&self) -> Order {
        self.order
    }

    fn peek(&mut self) -> Result<Option<&T>> {
        if !self.has_next()? {
            return Ok(None);
        }
        Ok(self.next.as_ref())
    }
}

impl<T, I, P> Forward<T> for FilteredSorted<I, T, P>
where
    T: Ord + Clone,
    I: Forward<T>,
    P: FnMut(&T) -> bool,
{
    fn forward(&mut self, target: &T) -> Result<()> {
        if let Some(last) = &self.last {
            if !self.order.is_valid_next(last, target) {
                return Err(TesseraError::OrderingViolation(
                    "forward target precedes the last returned element",
                ));
            }
        }
        if let Some(next) = &self.next {
            // Look-ahead already at or past the target: skip the seek.
            if self.order.is_valid_next(target, next) {
                return Ok(());
            }
            self.last = self.next.take();
        }
        self.source.forward(target)
    }
}

/// See [`Forward::distinct_sorted`].
pub struct DistinctSorted<I, T> {
    source: I,
    next: Option<T>,
    last: Option<T>,
}

impl<T, I> Lazy<T> for DistinctSorted<I, T>
where
    T: Ord + Clone,
    I: Forward<T>,
{
    fn has_next(&mut self) -> Result<bool> {
        if self.next.is_some() {
            return Ok(true);
        }
        while self.source.has_next()? {
            let candidate = self.source.next()?;
            if self.last.as_ref() != Some(&candidate) {
                self.next = Some(candidate);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn next(&mut self) -> Result<T> {
        if !self.has_next()? {
            return Err(TesseraError::Exhausted);
        }
        let item = self.next.take().ok_or(TesseraError::Exhausted)?;
        self.last = Some(item.clone());
        Ok(item)
    }

    fn recycle(&mut self) {
        self.next = None;
        self.source.recycle();
    }
}

impl<T, I> Sorted<T> for DistinctSorted<I, T>
where
    T: Ord + Clone,
    I: Forward<T>,
{
    fn order(&self) -> Order {
        self.source.order()
    }

    fn peek(&mut self) -> Result<Option<&T>> {
        if !self.has_next()? {
            return Ok(None);
        }
        Ok(self.next.as_ref())
    }
}

impl<T, I> Forward<T> for DistinctSorted<I, T>
where
    T: Ord + Clone,
    I: Forward<T>,
{
    fn forward(&mut self, target: &T) -> Result<()> {
        let order = self.source.order();
        if let Some(last) = &self.last {
            if !order.is_valid_next(last, target) {
                return Err(TesseraError::OrderingViolation(
                    "forward target precedes the last returned element",
                ));
            }
        }
        if let Some(next) = &self.next {
            if order.is_valid_next(target, next) {
                return Ok(());
            }
            self.last = self.next.take();
        }
        self.source.forward(target)
    }
}

/// See [`Forward::map_sorted`].
pub struct MappedSorted<I, T, U, F, R> {
    source: I,
    map: F,
    reverse: R,
    order: Order,
    next: Option<U>,
    last: Option<U>,
    _t: PhantomData<fn() -> T>,
}

impl<T, U, I, F, R> Lazy<U> for MappedSorted<I, T, U, F, R>
where
    T: Ord,
    U: Ord + Clone,
    I: Forward<T>,
    F: FnMut(T) -> U,
    R: FnMut(&U) -> T,
{
    fn has_next(&mut self) -> Result<bool> {
        if self.next.is_some() {
            return Ok(true);
        }
        if !self.source.has_next()? {
            return Ok(false);
        }
        let mapped = (self.map)(self.source.next()?);
        self.next = Some(mapped);
        Ok(true)
    }

    fn next(&mut self) -> Result<U> {
        if !self.has_next()? {
            return Err(TesseraError::Exhausted);
        }
        let item = self.next.take().ok_or(TesseraError::Exhausted)?;
        self.last = Some(item.clone());
        Ok(item)
    }

    fn recycle(&mut self) {
        self.next = None;
        self.source.recycle();
    }
}

impl<T, U, I, F, R> Sorted<U> for MappedSorted<I, T, U, F, R>
where
    T: Ord,
    U: Ord + Clone,
    I: Forward<T>,
    F: FnMut(T) -> U,
    R: FnMut(&U) -> T,
{
    fn order(&self) -> Order {
        self.order
    }

    fn peek(&mut self) -> Result<Option<&U>> {
        if !self.has_next()? {
            return Ok(None);
        }
        Ok(self.next.as_ref())
    }
}

impl<T, U, I, F, R> Forward<U> for MappedSorted<I, T, U, F, R>
where
    T: Ord,
    U: Ord + Clone,
    I: Forward<T>,
    F: FnMut(T) -> U,
    R: FnMut(&U) -> T,
{
    fn forward(&mut self, target: &U) -> Result<()> {
        if let Some(last) = &self.last {
            if !self.order.is_valid_next(last, target) {
                return Err(TesseraError::OrderingViolation(
                    "forward target precedes the last returned element",
                ));
            }
        }
        if let Some(next) = &self.next {
            if self.order.is_valid_next(target, next) {
                return Ok(());
            }
            self.last = self.next.take();
        }
        let translated = (self.reverse)(target);
        self.source.forward(&translated)
    }
}

// Order-preserving lazy adapters stay sorted/forwardable when their source is.

impl<T, I> Sorted<T> for Limited<I, T>
where
    T: Ord,
    I: Sorted<T>,
{
    fn order(&self) -> Order {
        self.source.order()
    }

    fn peek(&mut self) -> Result<Option<&T>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.source.peek()
    }
}

impl<T, I> Forward<T> for Limited<I, T>
where
    T: Ord,
    I: Forward<T>,
{
    fn forward(&mut self, target: &T) -> Result<()> {
        self.source.forward(target)
    }
}

impl<T, I, F> Sorted<T> for Hooked<I, F>
where
    T: Ord,
    I: Sorted<T>,
    F: FnOnce(),
{
    fn order(&self) -> Order {
        self.source.order()
    }

    fn peek(&mut self) -> Result<Option<&T>> {
        self.source.peek()
    }
}

impl<T, I, F> Forward<T> for Hooked<I, F>
where
    T: Ord,
    I: Forward<T>,
    F: FnOnce(),
{
    fn forward(&mut self, target: &T) -> Result<()> {
        match self.source.forward(target) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.fire();
                Err(e)
            }
        }
    }
}

impl<T, I, F> Sorted<T> for OnError<I, F>
where
    T: Ord,
    I: Sorted<T>,
    F: FnMut(TesseraError) -> TesseraError,
{
    fn order(&self) -> Order {
        self.source.order()
    }

    fn peek(&mut self) -> Result<Option<&T>> {
        // An inherent limitation: the remapping closure cannot run here
        // without splitting the borrow, so peek surfaces raw errors.
        self.source.peek()
    }
}

impl<T, I, F> Forward<T> for OnError<I, F>
where
    T: Ord,
    I: Forward<T>,
    F: FnMut(TesseraError) -> TesseraError,
{
    fn forward(&mut self, target: &T) -> Result<()> {
        self.source.forward(target).map_err(&mut self.f)
    }
}
