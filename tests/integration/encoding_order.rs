//! Order preservation of the key encoding, end to end through `Key`.

use proptest::prelude::*;

use tessera::encoding::value::{
    decode_boolean, decode_double, decode_long, decode_string, encode_boolean, encode_double,
    encode_long, encode_string, STRING_MAX_LENGTH,
};
use tessera::encoding::{DecodedKey, Direction, EdgeTypeId, Key, TypeId, Value, VertexKind};
use tessera::TesseraError;

#[test]
fn long_keys_order_numerically() {
    // 5 before 500, and across the sign boundary.
    let five = Key::attribute_index(&Value::Long(5), TypeId(1)).unwrap();
    let five_hundred = Key::attribute_index(&Value::Long(500), TypeId(1)).unwrap();
    assert!(five.bytes() < five_hundred.bytes());

    let negative = Key::attribute_index(&Value::Long(-3), TypeId(1)).unwrap();
    let zero = Key::attribute_index(&Value::Long(0), TypeId(1)).unwrap();
    assert!(negative.bytes() < zero.bytes());
    assert!(zero.bytes() < five.bytes());
}

#[test]
fn double_keys_order_across_sign_and_magnitude() {
    let values = [-1.0e9, -2.5, -0.0, 0.0, 1.0e-12, 3.25, f64::INFINITY];
    let encoded: Vec<[u8; 8]> = values.iter().map(|v| encode_double(*v).unwrap()).collect();
    for pair in encoded.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
}

#[test]
fn nan_is_rejected_at_encode_time() {
    assert!(matches!(encode_double(f64::NAN), Err(TesseraError::Encoding(_))));
}

#[test]
fn string_encoding_embeds_without_breaking_order() {
    // A string key must never be a byte-prefix problem: "ab" < "b" even
    // though the terminator follows "ab" inside a composite key.
    let ab = Key::attribute_index(&Value::String("ab".into()), TypeId(1)).unwrap();
    let b = Key::attribute_index(&Value::String("b".into()), TypeId(1)).unwrap();
    assert!(ab.bytes() < b.bytes());

    // Interior NULs round-trip and stay ordered.
    let with_nul = "a\0b";
    let encoded = encode_string(with_nul).unwrap();
    let (decoded, _) = decode_string(&encoded).unwrap();
    assert_eq!(decoded, with_nul);
}

#[test]
fn oversized_string_is_rejected() {
    let long = "x".repeat(STRING_MAX_LENGTH + 1);
    assert!(matches!(encode_string(&long), Err(TesseraError::Encoding(_))));
}

#[test]
fn vertex_and_edge_keys_decode_structurally() {
    let src = Key::vertex(VertexKind::Entity, TypeId(3), 17);
    let dst = Key::vertex(VertexKind::Relation, TypeId(8), 4);
    let edge = Key::edge(Direction::Out, &src, EdgeTypeId(2), &dst).unwrap();
    match edge.decode().unwrap() {
        DecodedKey::Edge { direction, src: s, edge_type, dst: d } => {
            assert_eq!(direction, Direction::Out);
            assert_eq!(s, src);
            assert_eq!(edge_type, EdgeTypeId(2));
            assert_eq!(d, dst);
        }
        other => panic!("unexpected decode {other:?}"),
    }
    assert_eq!(edge.edge_destination().unwrap(), dst);
}

#[test]
fn edge_rejects_non_vertex_endpoints() {
    let src = Key::vertex(VertexKind::Entity, TypeId(3), 17);
    let not_a_vertex = Key::attribute_index(&Value::Long(1), TypeId(1)).unwrap();
    assert!(Key::edge(Direction::Out, &src, EdgeTypeId(2), &not_a_vertex).is_err());
}

#[test]
fn categories_never_interleave() {
    // Every vertex key sorts after every attribute-index key, regardless of
    // payload, because the category prefix leads.
    let late_attribute =
        Key::attribute_index(&Value::String("\u{10FFFF}".into()), TypeId(u16::MAX)).unwrap();
    let early_vertex = Key::vertex(VertexKind::Entity, TypeId(0), 0);
    assert!(late_attribute.bytes() < early_vertex.bytes());
}

proptest! {
    #[test]
    fn longs_round_trip_and_preserve_order(a in any::<i64>(), b in any::<i64>()) {
        prop_assert_eq!(decode_long(encode_long(a)), a);
        prop_assert_eq!(encode_long(a) < encode_long(b), a < b);
    }

    #[test]
    fn doubles_round_trip_and_preserve_order(a in any::<f64>(), b in any::<f64>()) {
        prop_assume!(!a.is_nan() && !b.is_nan());
        let ea = encode_double(a).unwrap();
        let eb = encode_double(b).unwrap();
        prop_assert_eq!(decode_double(ea).to_bits(), a.to_bits());
        if a < b {
            prop_assert!(ea < eb);
        }
        // -0.0 and 0.0 encode distinctly but compare numerically equal.
        if ea < eb {
            prop_assert!(a <= b);
        }
    }

    #[test]
    fn booleans_round_trip(v in any::<bool>()) {
        prop_assert_eq!(decode_boolean(encode_boolean(v)[0]).unwrap(), v);
    }

    #[test]
    fn strings_round_trip_and_preserve_order(
        a in "\\PC{0,40}",
        b in "\\PC{0,40}",
    ) {
        prop_assume!(a.len() <= STRING_MAX_LENGTH && b.len() <= STRING_MAX_LENGTH);
        let ea = encode_string(&a).unwrap();
        let eb = encode_string(&b).unwrap();
        let (da, consumed) = decode_string(&ea).unwrap();
        prop_assert_eq!(&da, &a);
        prop_assert_eq!(consumed, ea.len());
        prop_assert_eq!(ea.cmp(&eb), a.as_bytes().cmp(b.as_bytes()));
    }

    #[test]
    fn attribute_keys_of_equal_type_order_by_value(a in any::<i64>(), b in any::<i64>()) {
        let ka = Key::attribute_index(&Value::Long(a), TypeId(7)).unwrap();
        let kb = Key::attribute_index(&Value::Long(b), TypeId(7)).unwrap();
        prop_assert_eq!(ka.bytes() < kb.bytes(), a < b);
    }
}
