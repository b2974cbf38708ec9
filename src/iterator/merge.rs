//! K-way set-union merge of same-order forwardable streams.

use std::cmp::Ordering as CmpOrdering;

use super::sorted::{BoxForward, Forward, Order, Sorted};
use super::Lazy;
use crate::error::{Result, TesseraError};

enum Head<T> {
    /// The source has not been pulled for this slot yet.
    Pending,
    /// The buffered head element of the source.
    Value(T),
    /// The source is exhausted and has been recycled.
    Done,
}

/// Union of several streams sharing one [`Order`]: at each step the smallest
/// head is emitted and every input holding an equal head is advanced, so
/// duplicates across inputs collapse to a single occurrence.
pub struct Merged<T> {
    sources: Vec<BoxForward<T>>,
    heads: Vec<Head<T>>,
    order: Order,
    last: Option<T>,
}

impl<T: Ord + Clone> Merged<T> {
    /// Builds a merge over `sources`. Every source must share `order`;
    /// a mismatch is a programming error and panics. An empty input yields
    /// an immediately exhausted iterator.
    pub fn new(sources: Vec<BoxForward<T>>, order: Order) -> Merged<T> {
        assert!(
            sources.iter().all(|s| s.order() == order),
            "merged iterators must share one order"
        );
        let heads = sources.iter().map(|_| Head::Pending).collect();
        Merged { sources, heads, order, last: None }
    }

    /// Fills every pending head slot, recycling sources as they exhaust.
    fn prime(&mut self) -> Result<()> {
        for i in 0..self.sources.len() {
            if matches!(self.heads[i], Head::Pending) {
                if self.sources[i].has_next()? {
                    self.heads[i] = Head::Value(self.sources[i].next()?);
                } else {
                    self.sources[i].recycle();
                    self.heads[i] = Head::Done;
                }
            }
        }
        Ok(())
    }

    fn min_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, head) in self.heads.iter().enumerate() {
            let Head::Value(value) = head else { continue };
            match best {
                None => best = Some(i),
                Some(b) => {
                    if let Head::Value(current) = &self.heads[b] {
                        if self.order.cmp(value, current) == CmpOrdering::Less {
                            best = Some(i);
                        }
                    }
                }
            }
        }
        best
    }
}

impl<T: Ord + Clone> Lazy<T> for Merged<T> {
    fn has_next(&mut self) -> Result<bool> {
        self.prime()?;
        Ok(self.min_index().is_some())
    }

    fn next(&mut self) -> Result<T> {
        self.prime()?;
        let min = self.min_index().ok_or(TesseraError::Exhausted)?;
        let Head::Value(value) = std::mem::replace(&mut self.heads[min], Head::Pending) else {
            return Err(TesseraError::Exhausted);
        };
        // Consume equal heads from every other input, emitting only once.
        for head in &mut self.heads {
            if let Head::Value(other) = head {
                if *other == value {
                    *head = Head::Pending;
                }
            }
        }
        self.last = Some(value.clone());
        Ok(value)
    }

    fn recycle(&mut self) {
        for (i, source) in self.sources.iter_mut().enumerate() {
            source.recycle();
            self.heads[i] = Head::Done;
        }
    }
}

impl<T: Ord + Clone> Sorted<T> for Merged<T> {
    fn order(&self) -> Order {
        self.order
    }

    fn peek(&mut self) -> Result<Option<&T>> {
        self.prime()?;
        match self.min_index() {
            Some(i) => match &self.heads[i] {
                Head::Value(value) => Ok(Some(value)),
                _ => Ok(None),
            },
            None => Ok(None),
        }
    }
}

impl<T: Ord + Clone> Forward<T> for Merged<T> {
    fn forward(&mut self, target: &T) -> Result<()> {
        if let Some(last) = &self.last {
            if !self.order.is_valid_next(last, target) {
                return Err(TesseraError::OrderingViolation(
                    "forward target precedes the last returned element",
                ));
            }
        }
        for i in 0..self.sources.len() {
            let keep = match &self.heads[i] {
                Head::Done => true,
                Head::Value(value) => self.order.is_valid_next(target, value),
                Head::Pending => false,
            };
            if !keep {
                self.heads[i] = Head::Pending;
                self.sources[i].forward(target)?;
            }
        }
        Ok(())
    }
}
