//! The ordered key space.
//!
//! Every graph element (type, vertex, edge, index entry) is addressed by a
//! [`Key`]: an immutable byte string whose first byte identifies its category
//! and whose byte-lexicographic order equals the category's logical order.
//! Keys are produced once, on element creation, and never mutated; range
//! scans are bounded by prefix successors without decoding.
//!
//! Decoding exists for diagnostics and predicate evaluation; raw range
//! scans never decode.

use std::fmt;

use smallvec::SmallVec;

use crate::error::{Result, TesseraError};

pub mod value;

/// Width of the reserved category prefix at the front of every key.
pub const PREFIX_LENGTH: usize = 1;

/// Width of an encoded vertex key: prefix + type id + instance id.
pub const VERTEX_LENGTH: usize = PREFIX_LENGTH + 2 + 8;

/// Category prefix byte. Bands are reserved per element family so that a
/// whole family can be range-scanned as `[prefix] .. [prefix + 1]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Prefix {
    /// Type-label index entries.
    TypeIndex = 0x20,
    /// Attribute-value index entries, ordered by value type then value.
    AttributeIndex = 0x21,
    /// Entity type vertices.
    EntityType = 0x30,
    /// Relation type vertices.
    RelationType = 0x31,
    /// Attribute type vertices.
    AttributeType = 0x32,
    /// Role type vertices.
    RoleType = 0x33,
    /// Entity instances.
    Entity = 0x40,
    /// Relation instances.
    Relation = 0x41,
    /// Attribute instances.
    Attribute = 0x42,
    /// Edges stored under their source vertex.
    EdgeOut = 0x50,
    /// Edges stored under their destination vertex.
    EdgeIn = 0x51,
}

impl Prefix {
    /// Decodes a prefix byte.
    pub fn of(byte: u8) -> Result<Prefix> {
        use Prefix::*;
        Ok(match byte {
            0x20 => TypeIndex,
            0x21 => AttributeIndex,
            0x30 => EntityType,
            0x31 => RelationType,
            0x32 => AttributeType,
            0x33 => RoleType,
            0x40 => Entity,
            0x41 => Relation,
            0x42 => Attribute,
            0x50 => EdgeOut,
            0x51 => EdgeIn,
            other => {
                return Err(TesseraError::Encoding(format!(
                    "unknown key prefix {other:#04x}"
                )))
            }
        })
    }

    /// The raw prefix byte.
    pub fn byte(self) -> u8 {
        self as u8
    }
}

/// Kind of instance vertex.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VertexKind {
    /// An entity instance.
    Entity,
    /// A relation instance.
    Relation,
    /// An attribute instance.
    Attribute,
}

impl VertexKind {
    fn prefix(self) -> Prefix {
        match self {
            VertexKind::Entity => Prefix::Entity,
            VertexKind::Relation => Prefix::Relation,
            VertexKind::Attribute => Prefix::Attribute,
        }
    }

    fn of(prefix: Prefix) -> Option<VertexKind> {
        match prefix {
            Prefix::Entity => Some(VertexKind::Entity),
            Prefix::Relation => Some(VertexKind::Relation),
            Prefix::Attribute => Some(VertexKind::Attribute),
            _ => None,
        }
    }
}

/// Direction of an edge key relative to the vertex it is stored under.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Stored under the source vertex.
    Out,
    /// Stored under the destination vertex.
    In,
}

impl Direction {
    fn prefix(self) -> Prefix {
        match self {
            Direction::Out => Prefix::EdgeOut,
            Direction::In => Prefix::EdgeIn,
        }
    }
}

/// Value-type tag inside attribute index keys. Tag order is the cross-type
/// sort order of the index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ValueType {
    /// Single-byte boolean.
    Boolean = 0x01,
    /// Sign-flipped big-endian i64.
    Long = 0x02,
    /// Bit-reordered IEEE-754 f64.
    Double = 0x03,
    /// Escaped, terminated UTF-8.
    String = 0x04,
    /// Epoch-millisecond i64.
    DateTime = 0x05,
}

impl ValueType {
    /// Decodes a value-type tag byte.
    pub fn of(byte: u8) -> Result<ValueType> {
        use ValueType::*;
        Ok(match byte {
            0x01 => Boolean,
            0x02 => Long,
            0x03 => Double,
            0x04 => String,
            0x05 => DateTime,
            other => {
                return Err(TesseraError::Encoding(format!(
                    "unknown value type tag {other:#04x}"
                )))
            }
        })
    }

    /// The raw tag byte.
    pub fn byte(self) -> u8 {
        self as u8
    }
}

/// A scalar attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Boolean value.
    Boolean(bool),
    /// 64-bit integer value.
    Long(i64),
    /// 64-bit float value. NaN is not encodable.
    Double(f64),
    /// String value, capped at [`value::STRING_MAX_LENGTH`] raw bytes in keys.
    String(String),
    /// Datetime as milliseconds since the Unix epoch.
    DateTime(i64),
}

impl Value {
    /// The tag this value carries in an attribute index key.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Long(_) => ValueType::Long,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::DateTime(_) => ValueType::DateTime,
        }
    }

    fn encode_into(&self, out: &mut KeyBytes) -> Result<()> {
        match self {
            Value::Boolean(v) => out.extend_from_slice(&value::encode_boolean(*v)),
            Value::Long(v) => out.extend_from_slice(&value::encode_long(*v)),
            Value::Double(v) => out.extend_from_slice(&value::encode_double(*v)?),
            Value::String(v) => out.extend_from_slice(&value::encode_string(v)?),
            Value::DateTime(v) => out.extend_from_slice(&value::encode_datetime(*v)),
        }
        Ok(())
    }
}

/// Identifier of a type vertex, embedded into vertex and index keys.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u16);

/// Identifier of an edge type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeTypeId(pub u16);

type KeyBytes = SmallVec<[u8; 24]>;

/// An immutable, ordered key addressing one graph element or index entry.
///
/// `Ord` is plain byte order; within a category that equals the category's
/// declared logical order by construction.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(KeyBytes);

impl Key {
    /// Wraps raw bytes previously produced by an encoder.
    pub fn from_bytes(bytes: &[u8]) -> Key {
        Key(SmallVec::from_slice(bytes))
    }

    /// The raw key bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// The category prefix of this key.
    pub fn prefix(&self) -> Result<Prefix> {
        let byte = self.0.first().ok_or_else(|| {
            TesseraError::Encoding("empty key has no prefix".to_string())
        })?;
        Prefix::of(*byte)
    }

    /// Type-label index entry: `[TypeIndex][scope ":"] label`.
    pub fn type_index(label: &str, scope: Option<&str>) -> Key {
        let mut bytes = KeyBytes::new();
        bytes.push(Prefix::TypeIndex.byte());
        if let Some(scope) = scope {
            bytes.extend_from_slice(scope.as_bytes());
            bytes.push(b':');
        }
        bytes.extend_from_slice(label.as_bytes());
        Key(bytes)
    }

    /// Attribute-value index entry:
    /// `[AttributeIndex][value type][encoded value][owner type id]`.
    ///
    /// Ordering first by value type, then encoded value, then owning type is
    /// what makes attribute range scans by value possible.
    pub fn attribute_index(value: &Value, owner: TypeId) -> Result<Key> {
        let mut bytes = KeyBytes::new();
        bytes.push(Prefix::AttributeIndex.byte());
        bytes.push(value.value_type().byte());
        value.encode_into(&mut bytes)?;
        bytes.extend_from_slice(&owner.0.to_be_bytes());
        Ok(Key(bytes))
    }

    /// Instance vertex key: `[kind prefix][type id][instance id]`, fixed
    /// [`VERTEX_LENGTH`] bytes.
    pub fn vertex(kind: VertexKind, type_id: TypeId, instance: u64) -> Key {
        let mut bytes = KeyBytes::new();
        bytes.push(kind.prefix().byte());
        bytes.extend_from_slice(&type_id.0.to_be_bytes());
        bytes.extend_from_slice(&instance.to_be_bytes());
        Key(bytes)
    }

    /// Edge key: `[direction prefix][src vertex][edge type][dst vertex]`.
    ///
    /// Both endpoint keys must be vertex keys; anything else is an encoding
    /// error at construction time, not at comparison time.
    pub fn edge(direction: Direction, src: &Key, edge_type: EdgeTypeId, dst: &Key) -> Result<Key> {
        check_vertex(src)?;
        check_vertex(dst)?;
        let mut bytes = KeyBytes::new();
        bytes.push(direction.prefix().byte());
        bytes.extend_from_slice(src.bytes());
        bytes.extend_from_slice(&edge_type.0.to_be_bytes());
        bytes.extend_from_slice(dst.bytes());
        Ok(Key(bytes))
    }

    /// `[prefix] .. [prefix + 1]` bounds covering one whole category.
    pub fn prefix_range(prefix: Prefix) -> (Key, Key) {
        let lower = Key(SmallVec::from_slice(&[prefix.byte()]));
        let upper = Key(SmallVec::from_slice(&[prefix.byte() + 1]));
        (lower, upper)
    }

    /// Bounds covering every instance vertex of one type.
    pub fn vertex_range(kind: VertexKind, type_id: TypeId) -> (Key, Key) {
        let mut base = KeyBytes::new();
        base.push(kind.prefix().byte());
        base.extend_from_slice(&type_id.0.to_be_bytes());
        let upper = Key(successor(&base));
        (Key(base), upper)
    }

    /// Bounds covering every attribute index entry of one value type.
    pub fn attribute_type_range(value_type: ValueType) -> (Key, Key) {
        let base = [Prefix::AttributeIndex.byte(), value_type.byte()];
        let lower = Key(SmallVec::from_slice(&base));
        let upper = Key(successor(&base));
        (lower, upper)
    }

    /// Bounds covering attribute index entries of one exact value, across
    /// all owning types.
    pub fn attribute_value_range(value: &Value) -> Result<(Key, Key)> {
        let mut base = KeyBytes::new();
        base.push(Prefix::AttributeIndex.byte());
        base.push(value.value_type().byte());
        value.encode_into(&mut base)?;
        let upper = Key(successor(&base));
        Ok((Key(base), upper))
    }

    /// Bounds covering all edges of `direction` under `src`, optionally
    /// narrowed to one edge type.
    pub fn edge_range(
        direction: Direction,
        src: &Key,
        edge_type: Option<EdgeTypeId>,
    ) -> Result<(Key, Key)> {
        check_vertex(src)?;
        let mut base = KeyBytes::new();
        base.push(direction.prefix().byte());
        base.extend_from_slice(src.bytes());
        if let Some(edge_type) = edge_type {
            base.extend_from_slice(&edge_type.0.to_be_bytes());
        }
        let upper = Key(successor(&base));
        Ok((Key(base), upper))
    }

    /// The destination vertex of an edge key.
    pub fn edge_destination(&self) -> Result<Key> {
        match self.prefix()? {
            Prefix::EdgeOut | Prefix::EdgeIn => {}
            other => {
                return Err(TesseraError::Encoding(format!(
                    "{other:?} key is not an edge"
                )))
            }
        }
        let expected = PREFIX_LENGTH + VERTEX_LENGTH + 2 + VERTEX_LENGTH;
        if self.0.len() != expected {
            return Err(TesseraError::Encoding(format!(
                "edge key of {} bytes, expected {expected}",
                self.0.len()
            )));
        }
        Ok(Key::from_bytes(&self.0[self.0.len() - VERTEX_LENGTH..]))
    }

    /// Structural decode, inverse of the category constructors.
    pub fn decode(&self) -> Result<DecodedKey> {
        let prefix = self.prefix()?;
        let body = &self.0[PREFIX_LENGTH..];
        match prefix {
            Prefix::TypeIndex => {
                let scoped = std::str::from_utf8(body).map_err(|e| {
                    TesseraError::Encoding(format!("type index label not UTF-8: {e}"))
                })?;
                let (scope, label) = match scoped.split_once(':') {
                    Some((scope, label)) => (Some(scope.to_string()), label.to_string()),
                    None => (None, scoped.to_string()),
                };
                Ok(DecodedKey::TypeIndex { label, scope })
            }
            Prefix::AttributeIndex => {
                let tag = *body.first().ok_or_else(|| {
                    TesseraError::Encoding("attribute index key missing tag".to_string())
                })?;
                let value_type = ValueType::of(tag)?;
                let rest = &body[1..];
                let (value, consumed) = decode_value(value_type, rest)?;
                let owner = rest
                    .get(consumed..consumed + 2)
                    .ok_or_else(|| {
                        TesseraError::Encoding(
                            "attribute index key missing owner type".to_string(),
                        )
                    })?
                    .try_into()
                    .map(u16::from_be_bytes)
                    .map_err(|_| {
                        TesseraError::Encoding("owner type id truncated".to_string())
                    })?;
                Ok(DecodedKey::AttributeIndex { value, owner: TypeId(owner) })
            }
            Prefix::Entity | Prefix::Relation | Prefix::Attribute => {
                if self.0.len() != VERTEX_LENGTH {
                    return Err(TesseraError::Encoding(format!(
                        "vertex key of {} bytes, expected {VERTEX_LENGTH}",
                        self.0.len()
                    )));
                }
                let kind = VertexKind::of(prefix).unwrap_or(VertexKind::Entity);
                let type_id = u16::from_be_bytes([body[0], body[1]]);
                let instance = u64::from_be_bytes(body[2..10].try_into().map_err(|_| {
                    TesseraError::Encoding("vertex instance id truncated".to_string())
                })?);
                Ok(DecodedKey::Vertex { kind, type_id: TypeId(type_id), instance })
            }
            Prefix::EdgeOut | Prefix::EdgeIn => {
                let direction = if prefix == Prefix::EdgeOut { Direction::Out } else { Direction::In };
                let expected = VERTEX_LENGTH + 2 + VERTEX_LENGTH;
                if body.len() != expected {
                    return Err(TesseraError::Encoding(format!(
                        "edge key body of {} bytes, expected {expected}",
                        body.len()
                    )));
                }
                let src = Key::from_bytes(&body[..VERTEX_LENGTH]);
                let edge_type = u16::from_be_bytes([body[VERTEX_LENGTH], body[VERTEX_LENGTH + 1]]);
                let dst = Key::from_bytes(&body[VERTEX_LENGTH + 2..]);
                Ok(DecodedKey::Edge {
                    direction,
                    src,
                    edge_type: EdgeTypeId(edge_type),
                    dst,
                })
            }
            Prefix::EntityType | Prefix::RelationType | Prefix::AttributeType | Prefix::RoleType => {
                Err(TesseraError::Encoding(
                    "type vertex keys carry no decodable body".to_string(),
                ))
            }
        }
    }
}

/// Decoded view of a key, used by `Display` and error reporting.
#[derive(Clone, Debug, PartialEq)]
pub enum DecodedKey {
    /// A type-label index entry.
    TypeIndex {
        /// The type label.
        label: String,
        /// The enclosing scope, if any.
        scope: Option<String>,
    },
    /// An attribute-value index entry.
    AttributeIndex {
        /// The indexed value.
        value: Value,
        /// The owning attribute type.
        owner: TypeId,
    },
    /// An instance vertex.
    Vertex {
        /// Entity, relation or attribute.
        kind: VertexKind,
        /// The vertex's type.
        type_id: TypeId,
        /// The per-type instance id.
        instance: u64,
    },
    /// An edge between two vertices.
    Edge {
        /// Storage direction.
        direction: Direction,
        /// Source vertex key.
        src: Key,
        /// Edge type.
        edge_type: EdgeTypeId,
        /// Destination vertex key.
        dst: Key,
    },
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key(")?;
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Ok(decoded) => write!(f, "{decoded:?}"),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

fn check_vertex(key: &Key) -> Result<()> {
    let prefix = key.prefix()?;
    if VertexKind::of(prefix).is_none() {
        return Err(TesseraError::Encoding(format!(
            "{prefix:?} key is not an instance vertex"
        )));
    }
    if key.bytes().len() != VERTEX_LENGTH {
        return Err(TesseraError::Encoding(format!(
            "vertex key of {} bytes, expected {VERTEX_LENGTH}",
            key.bytes().len()
        )));
    }
    Ok(())
}

/// Smallest byte string strictly greater than every string with `base` as a
/// prefix. Trailing 0xFF bytes are dropped before the increment.
fn successor(base: &[u8]) -> KeyBytes {
    let mut out = SmallVec::from_slice(base);
    while let Some(&last) = out.last() {
        if last == 0xFF {
            out.pop();
        } else {
            let idx = out.len() - 1;
            out[idx] = last + 1;
            return out;
        }
    }
    // All 0xFF: no finite successor; an empty upper bound never matches
    // because every key starts with a prefix byte below 0xFF.
    out
}

fn decode_value(value_type: ValueType, src: &[u8]) -> Result<(Value, usize)> {
    let fixed = |n: usize| -> Result<[u8; 8]> {
        src.get(..n)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| TesseraError::Encoding("value bytes truncated".to_string()))
    };
    match value_type {
        ValueType::Boolean => {
            let byte = *src.first().ok_or_else(|| {
                TesseraError::Encoding("boolean value truncated".to_string())
            })?;
            Ok((Value::Boolean(value::decode_boolean(byte)?), 1))
        }
        ValueType::Long => Ok((Value::Long(value::decode_long(fixed(8)?)), 8)),
        ValueType::Double => Ok((Value::Double(value::decode_double(fixed(8)?)), 8)),
        ValueType::DateTime => Ok((Value::DateTime(value::decode_datetime(fixed(8)?)), 8)),
        ValueType::String => {
            let (s, used) = value::decode_string(src)?;
            Ok((Value::String(s), used))
        }
    }
}
