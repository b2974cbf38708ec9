//! Full traversals over a populated in-memory store, streamed through the
//! producer layer the way a query session consumes them.

use std::ops::Bound;
use std::sync::Arc;

use tessera::encoding::{
    DecodedKey, Direction, EdgeTypeId, Key, TypeId, Value, ValueType, VertexKind,
};
use tessera::iterator::Lazy;
use tessera::pool::WorkerPool;
use tessera::predicate::PredicateOp;
use tessera::procedure::{Procedure, Step};
use tessera::producer::{BufferedQueue, Producer};
use tessera::storage::MemoryStore;

const PERSON: TypeId = TypeId(1);
const MOVIE: TypeId = TypeId(2);
const NAME: TypeId = TypeId(10);
const DIRECTED: EdgeTypeId = EdgeTypeId(1);
const ACTED_IN: EdgeTypeId = EdgeTypeId(2);

fn person(i: u64) -> Key {
    Key::vertex(VertexKind::Entity, PERSON, i)
}

fn movie(i: u64) -> Key {
    Key::vertex(VertexKind::Entity, MOVIE, i)
}

fn link(store: &MemoryStore, src: &Key, edge_type: EdgeTypeId, dst: &Key) {
    store.put(Key::edge(Direction::Out, src, edge_type, dst).unwrap(), Vec::new());
    store.put(Key::edge(Direction::In, dst, edge_type, src).unwrap(), Vec::new());
}

/// Four people, three movies. Person 1 directed movies 1 and 2; person 2
/// directed movie 3; people 2, 3 and 4 acted in various movies.
fn film_graph() -> MemoryStore {
    let store = MemoryStore::new();
    for i in 1..=4 {
        store.put(person(i), Vec::new());
    }
    for i in 1..=3 {
        store.put(movie(i), Vec::new());
    }
    link(&store, &person(1), DIRECTED, &movie(1));
    link(&store, &person(1), DIRECTED, &movie(2));
    link(&store, &person(2), DIRECTED, &movie(3));
    link(&store, &person(2), ACTED_IN, &movie(1));
    link(&store, &person(3), ACTED_IN, &movie(1));
    link(&store, &person(3), ACTED_IN, &movie(3));
    link(&store, &person(4), ACTED_IN, &movie(2));
    store
}

#[test]
fn directed_movies_of_all_people() {
    let store = film_graph();
    let procedure = Procedure::new(vec![
        Step::ScanVertices { kind: VertexKind::Entity, type_id: PERSON },
        Step::Expand { direction: Direction::Out, edge_type: DIRECTED },
    ]);
    let movies = procedure.execute(&store).unwrap().to_list().unwrap();
    assert_eq!(movies, vec![movie(1), movie(2), movie(3)]);
}

#[test]
fn movies_both_directed_and_acted_in() {
    let store = film_graph();
    let acted = Procedure::new(vec![
        Step::ScanVertices { kind: VertexKind::Entity, type_id: PERSON },
        Step::Expand { direction: Direction::Out, edge_type: ACTED_IN },
    ]);
    let procedure = Procedure::new(vec![
        Step::ScanVertices { kind: VertexKind::Entity, type_id: PERSON },
        Step::Expand { direction: Direction::Out, edge_type: DIRECTED },
        Step::Intersect(acted),
    ]);
    // Movies 1, 2 and 3 were all acted in and all directed.
    let movies = procedure.execute(&store).unwrap().to_list().unwrap();
    assert_eq!(movies, vec![movie(1), movie(2), movie(3)]);
}

#[test]
fn two_hop_collaborators() {
    let store = film_graph();
    // People who acted in any movie that somebody directed.
    let procedure = Procedure::new(vec![
        Step::ScanVertices { kind: VertexKind::Entity, type_id: PERSON },
        Step::Expand { direction: Direction::Out, edge_type: DIRECTED },
        Step::Expand { direction: Direction::In, edge_type: ACTED_IN },
    ]);
    let actors = procedure.execute(&store).unwrap().to_list().unwrap();
    assert_eq!(actors, vec![person(2), person(3), person(4)]);
}

#[test]
fn attribute_range_with_predicate_filter() {
    let store = MemoryStore::new();
    let names = ["casablanca", "heat", "ran", "vertigo"];
    for name in names {
        store.put(
            Key::attribute_index(&Value::String(name.to_string()), NAME).unwrap(),
            Vec::new(),
        );
    }
    let procedure = Procedure::new(vec![
        Step::ScanAttributes {
            value_type: ValueType::String,
            lower: Bound::Included(Value::String("h".to_string())),
            upper: Bound::Unbounded,
        },
        Step::FilterAttribute {
            op: PredicateOp::Contains,
            rhs: Value::String("A".to_string()),
        },
    ]);
    let keys = procedure.execute(&store).unwrap().to_list().unwrap();
    let values: Vec<String> = keys
        .iter()
        .map(|k| match k.decode().unwrap() {
            DecodedKey::AttributeIndex { value: Value::String(s), .. } => s,
            other => panic!("unexpected key {other:?}"),
        })
        .collect();
    // "casablanca" is below the range; "vertigo" lacks an "a".
    assert_eq!(values, vec!["heat".to_string(), "ran".to_string()]);
}

#[test]
fn traversal_streams_through_a_producer() {
    let store = film_graph();
    let procedure = Procedure::new(vec![
        Step::ScanVertices { kind: VertexKind::Entity, type_id: PERSON },
        Step::Expand { direction: Direction::Out, edge_type: ACTED_IN },
    ]);
    let results = procedure.execute(&store).unwrap();

    let mut pool = WorkerPool::new(2, "traversal");
    let producer = Producer::new(Box::new(results), pool.pin());
    let queue = Arc::new(BufferedQueue::new(2));
    producer.produce(Arc::clone(&queue), 2).unwrap();
    producer.produce(Arc::clone(&queue), 8).unwrap();

    let mut streamed = Vec::new();
    while let Some(key) = queue.take().unwrap() {
        streamed.push(key);
    }
    assert_eq!(streamed, vec![movie(1), movie(2), movie(3)]);
    pool.shutdown();
}

#[test]
fn dangling_frontier_expands_to_nothing() {
    let store = film_graph();
    let procedure = Procedure::new(vec![
        Step::ScanVertices { kind: VertexKind::Entity, type_id: MOVIE },
        Step::Expand { direction: Direction::Out, edge_type: DIRECTED },
    ]);
    let mut result = procedure.execute(&store).unwrap();
    assert!(!result.has_next().unwrap());
}
