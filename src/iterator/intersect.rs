//! Leapfrog intersection of same-order forwardable streams.

use std::cmp::Ordering as CmpOrdering;

use super::sorted::{BoxForward, Forward, Order, Sorted};
use super::Lazy;
use crate::error::{Result, TesseraError};

/// Intersection of several streams sharing one [`Order`].
///
/// The streams alternately seek each other: every input is forwarded to the
/// current maximum head until all heads agree, that element is emitted, and
/// all inputs advance. This is the merge join underlying relational pattern
/// matching; nothing is ever emitted without every input agreeing, and
/// exhaustion of any input exhausts the whole.
pub struct Intersected<T> {
    sources: Vec<BoxForward<T>>,
    order: Order,
    next: Option<T>,
    last: Option<T>,
    done: bool,
}

impl<T: Ord + Clone> Intersected<T> {
    /// Builds an intersection over `sources`. Every source must share
    /// `order`; a mismatch is a programming error and panics. An empty input
    /// list yields an immediately exhausted iterator.
    pub fn new(sources: Vec<BoxForward<T>>, order: Order) -> Intersected<T> {
        assert!(
            sources.iter().all(|s| s.order() == order),
            "intersected iterators must share one order"
        );
        let done = sources.is_empty();
        Intersected { sources, order, next: None, last: None, done }
    }

    fn finish(&mut self) {
        self.done = true;
        for source in &mut self.sources {
            source.recycle();
        }
    }

    /// Leapfrogs until every head agrees, buffering the agreed element.
    fn seek_agreement(&mut self) -> Result<bool> {
        loop {
            let mut target: Option<T> = None;
            let mut exhausted = false;
            for i in 0..self.sources.len() {
                match self.sources[i].peek()? {
                    None => {
                        exhausted = true;
                        break;
                    }
                    Some(head) => {
                        let bigger = match &target {
                            None => true,
                            Some(t) => self.order.cmp(head, t) == CmpOrdering::Greater,
                        };
                        if bigger {
                            target = Some(head.clone());
                        }
                    }
                }
            }
            let target = match target {
                Some(target) if !exhausted => target,
                _ => {
                    self.finish();
                    return Ok(false);
                }
            };
            let mut agreed = true;
            for i in 0..self.sources.len() {
                self.sources[i].forward(&target)?;
                match self.sources[i].peek()? {
                    None => {
                        exhausted = true;
                        break;
                    }
                    Some(head) => {
                        if *head != target {
                            agreed = false;
                        }
                    }
                }
            }
            if exhausted {
                self.finish();
                return Ok(false);
            }
            if agreed {
                // Consume the agreed element from every input.
                let mut emitted: Option<T> = None;
                for source in &mut self.sources {
                    let value = source.next()?;
                    emitted.get_or_insert(value);
                }
                self.next = emitted;
                return Ok(true);
            }
        }
    }
}

impl<T: Ord + Clone> Lazy<T> for Intersected<T> {
    fn has_next(&mut self) -> Result<bool> {
        if self.next.is_some() {
            return Ok(true);
        }
        if self.done {
            return Ok(false);
        }
        self.seek_agreement()
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
        self.finish();
    }
}

impl<T: Ord + Clone> Sorted<T> for Intersected<T> {
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

impl<T: Ord + Clone> Forward<T> for Intersected<T> {
    fn forward(&mut self, target: &T) -> Result<()> {
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
        for source in &mut self.sources {
            source.forward(target)?;
        }
        Ok(())
    }
}
