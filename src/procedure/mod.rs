//! Executable traversal procedures.
//!
//! A [`Procedure`] is the output of a query planner: an ordered list of
//! [`Step`]s that folds, left to right, into a single forwardable iterator
//! of keys. Execution is entirely lazy except for [`Step::Expand`], which
//! materializes the current frontier to open one edge scan per source
//! vertex before merging the neighbour streams.
//!
//! Every scan runs ascending, so the frontier stays forwardable end to end
//! and intersection steps can leapfrog over it.

use std::ops::Bound;

use tracing::debug;

use crate::encoding::{
    Direction, EdgeTypeId, Key, TypeId, Value, ValueType, VertexKind,
};
use crate::error::{Result, TesseraError};
use crate::iterator::sorted::{iter_sorted, BoxForward, Forward, Order};
use crate::iterator::Lazy;
use crate::iterator::merge::Merged;
use crate::iterator::intersect::Intersected;
use crate::predicate::PredicateOp;
use crate::storage::ReadStore;

/// One traversal operation over the key space.
#[derive(Debug)]
pub enum Step {
    /// Establish a frontier of all instance vertices of one type.
    ScanVertices {
        /// Entity, relation or attribute.
        kind: VertexKind,
        /// The type to scan.
        type_id: TypeId,
    },
    /// Establish a frontier of attribute-index entries of one value type,
    /// optionally narrowed to a value range.
    ScanAttributes {
        /// The value type whose index partition is scanned.
        value_type: ValueType,
        /// Lower value bound.
        lower: Bound<Value>,
        /// Upper value bound.
        upper: Bound<Value>,
    },
    /// Replace the frontier with the set union of each vertex's neighbours
    /// over edges of one type.
    Expand {
        /// Which edge partition to follow.
        direction: Direction,
        /// The edge type to follow.
        edge_type: EdgeTypeId,
    },
    /// Keep only frontier keys also produced by a sub-procedure.
    Intersect(Procedure),
    /// Keep only attribute-index entries whose value satisfies a predicate.
    FilterAttribute {
        /// The comparison to apply.
        op: PredicateOp,
        /// The right-hand operand.
        rhs: Value,
    },
}

impl Step {
    fn is_scan(&self) -> bool {
        matches!(self, Step::ScanVertices { .. } | Step::ScanAttributes { .. })
    }
}

/// A planned traversal: steps folded into one iterator at execution time.
#[derive(Debug, Default)]
pub struct Procedure {
    steps: Vec<Step>,
}

impl Procedure {
    /// Wraps a planned step list.
    pub fn new(steps: Vec<Step>) -> Procedure {
        Procedure { steps }
    }

    /// Folds the steps into a single forwardable key stream over `store`.
    ///
    /// An empty procedure yields an immediately exhausted iterator.
    ///
    /// # Panics
    ///
    /// Panics if a scan step appears anywhere but first: scans establish
    /// the frontier, so a later scan is a planner bug.
    pub fn execute(&self, store: &dyn ReadStore) -> Result<BoxForward<Key>> {
        debug!(steps = self.steps.len(), "executing procedure");
        let mut frontier: BoxForward<Key> =
            iter_sorted(Vec::new(), Order::Ascending).boxed_forward();
        for (index, step) in self.steps.iter().enumerate() {
            assert!(
                index == 0 || !step.is_scan(),
                "scan steps must open a procedure"
            );
            frontier = match step {
                Step::ScanVertices { kind, type_id } => {
                    let (lower, upper) = Key::vertex_range(*kind, *type_id);
                    store.scan(&lower, &upper, Order::Ascending)?
                }
                Step::ScanAttributes { value_type, lower, upper } => {
                    let (lower, upper) = attribute_bounds(*value_type, lower, upper)?;
                    store.scan(&lower, &upper, Order::Ascending)?
                }
                Step::Expand { direction, edge_type } => {
                    expand(store, frontier, *direction, *edge_type)?
                }
                Step::Intersect(sub) => {
                    let other = sub.execute(store)?;
                    Intersected::new(vec![frontier, other], Order::Ascending).boxed_forward()
                }
                Step::FilterAttribute { op, rhs } => {
                    let op = op.clone();
                    let rhs = rhs.clone();
                    frontier
                        .filter_sorted(move |key: &Key| match key.decode() {
                            Ok(crate::encoding::DecodedKey::AttributeIndex { value, .. }) => {
                                op.apply(&value, &rhs)
                            }
                            // Non-attribute keys never satisfy a value predicate.
                            _ => false,
                        })
                        .boxed_forward()
                }
            };
        }
        Ok(frontier)
    }
}

fn attribute_bounds(
    value_type: ValueType,
    lower: &Bound<Value>,
    upper: &Bound<Value>,
) -> Result<(Key, Key)> {
    let check = |value: &Value| -> Result<()> {
        if value.value_type() == value_type {
            Ok(())
        } else {
            Err(TesseraError::Encoding(format!(
                "bound of type {:?} in a {value_type:?} scan",
                value.value_type()
            )))
        }
    };
    let (type_lower, type_upper) = Key::attribute_type_range(value_type);
    let lower = match lower {
        Bound::Unbounded => type_lower,
        Bound::Included(value) => {
            check(value)?;
            Key::attribute_value_range(value)?.0
        }
        Bound::Excluded(value) => {
            check(value)?;
            Key::attribute_value_range(value)?.1
        }
    };
    let upper = match upper {
        Bound::Unbounded => type_upper,
        Bound::Included(value) => {
            check(value)?;
            Key::attribute_value_range(value)?.1
        }
        Bound::Excluded(value) => {
            check(value)?;
            Key::attribute_value_range(value)?.0
        }
    };
    Ok((lower, upper))
}

fn expand(
    store: &dyn ReadStore,
    frontier: BoxForward<Key>,
    direction: Direction,
    edge_type: EdgeTypeId,
) -> Result<BoxForward<Key>> {
    let sources = frontier.to_list()?;
    let mut neighbours: Vec<BoxForward<Key>> = Vec::with_capacity(sources.len());
    for src in sources {
        let (lower, upper) = Key::edge_range(direction, &src, Some(edge_type))?;
        let scan = store.scan(&lower, &upper, Order::Ascending)?;
        // Within one (src, edge type) range, edge keys sort by destination,
        // so mapping to the destination preserves ascending order.
        let mapped = scan.map_sorted(
            |edge: Key| {
                edge.edge_destination()
                    .expect("edge range scan yielded a malformed edge key")
            },
            move |dst: &Key| {
                Key::edge(direction, &src, edge_type, dst)
                    .expect("forward target is not a vertex key")
            },
            Order::Ascending,
        );
        neighbours.push(mapped.boxed_forward());
    }
    Ok(Merged::new(neighbours, Order::Ascending).boxed_forward())
}
