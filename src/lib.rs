//! Tessera is the query-execution core of a graph database: an ordered key
//! encoding, an algebra of lazy sorted iterators, and the scheduling
//! machinery that streams their results.
//!
//! The crate is storage-agnostic. Anything implementing
//! [`storage::ReadStore`] (an ordered key-value scan interface) can back
//! it; [`storage::MemoryStore`] is the bundled in-process implementation.
//!
//! # Layers
//!
//! - [`encoding`] lays out graph elements as byte keys whose lexicographic
//!   order matches their semantic order, so every query becomes a range
//!   scan.
//! - [`iterator`] is the execution algebra: fallible lazy iterators
//!   ([`iterator::Lazy`]), sorted forwardable streams
//!   ([`iterator::sorted::Forward`]), k-way merge and leapfrog
//!   intersection.
//! - [`predicate`] evaluates value comparisons, with epsilon-tolerant
//!   doubles and anchored regex matching.
//! - [`procedure`] folds a planned step list into one forwardable key
//!   stream over a store.
//! - [`producer`] and [`pool`] move production onto background executors
//!   and stream results through a bounded queue.
//!
//! # Example
//!
//! ```
//! use tessera::encoding::{Key, TypeId, VertexKind};
//! use tessera::iterator::Lazy;
//! use tessera::procedure::{Procedure, Step};
//! use tessera::storage::MemoryStore;
//!
//! let store = MemoryStore::new();
//! store.put(Key::vertex(VertexKind::Entity, TypeId(1), 42), Vec::new());
//!
//! let procedure = Procedure::new(vec![Step::ScanVertices {
//!     kind: VertexKind::Entity,
//!     type_id: TypeId(1),
//! }]);
//! let vertices = procedure.execute(&store)?.to_list()?;
//! assert_eq!(vertices, vec![Key::vertex(VertexKind::Entity, TypeId(1), 42)]);
//! # Ok::<(), tessera::TesseraError>(())
//! ```

pub mod encoding;
pub mod error;
pub mod iterator;
pub mod pool;
pub mod predicate;
pub mod procedure;
pub mod producer;
pub mod storage;

pub use error::{Result, TesseraError};
