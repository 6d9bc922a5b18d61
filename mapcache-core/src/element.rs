//! OpenStreetMap-style map elements and their identifying keys.
//!
//! Negative identifiers mark elements created locally that the remote
//! authority has not accepted yet; non-negative identifiers are permanent.

use std::{collections::HashMap, fmt, str::FromStr};

use geo::Coord;
use thiserror::Error;

/// Free-form key/value tags attached to every element.
pub type Tags = HashMap<String, String>;

/// The three kinds of map element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementType {
    /// A single coordinate.
    Node,
    /// An ordered list of node references.
    Way,
    /// An ordered list of typed members with roles.
    Relation,
}

impl ElementType {
    /// Lower-case name used in keys such as `way/12`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = ElementKeyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "node" => Ok(Self::Node),
            "way" => Ok(Self::Way),
            "relation" => Ok(Self::Relation),
            other => Err(ElementKeyParseError::UnknownType(other.to_owned())),
        }
    }
}

/// Primary key of an element: its type plus its 64-bit identifier.
///
/// # Examples
/// ```
/// use mapcache_core::{ElementKey, ElementType};
///
/// let key: ElementKey = "way/-3".parse().expect("valid key");
/// assert_eq!(key, ElementKey::new(ElementType::Way, -3));
/// assert!(key.is_provisional());
/// assert_eq!(key.to_string(), "way/-3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementKey {
    /// Kind of the referenced element.
    pub element_type: ElementType,
    /// Identifier, negative while the element is provisional.
    pub id: i64,
}

impl ElementKey {
    /// Construct a key from its parts.
    pub const fn new(element_type: ElementType, id: i64) -> Self {
        Self { element_type, id }
    }

    /// Key of the node with the given identifier.
    pub const fn node(id: i64) -> Self {
        Self::new(ElementType::Node, id)
    }

    /// Key of the way with the given identifier.
    pub const fn way(id: i64) -> Self {
        Self::new(ElementType::Way, id)
    }

    /// Key of the relation with the given identifier.
    pub const fn relation(id: i64) -> Self {
        Self::new(ElementType::Relation, id)
    }

    /// Whether the identifier is still a locally assigned placeholder.
    pub const fn is_provisional(self) -> bool {
        self.id < 0
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.element_type, self.id)
    }
}

/// Errors returned when parsing an [`ElementKey`] from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElementKeyParseError {
    /// The input did not contain a `/` separator.
    #[error("element key {0:?} must look like `type/id`")]
    MissingSeparator(String),
    /// The type component was not `node`, `way` or `relation`.
    #[error("unknown element type {0:?}")]
    UnknownType(String),
    /// The identifier was not a valid signed 64-bit integer.
    #[error("invalid element id {0:?}")]
    InvalidId(String),
}

impl FromStr for ElementKey {
    type Err = ElementKeyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (kind, id) = value
            .split_once('/')
            .ok_or_else(|| ElementKeyParseError::MissingSeparator(value.to_owned()))?;
        let element_type = kind.parse()?;
        let id = id
            .parse()
            .map_err(|_| ElementKeyParseError::InvalidId(id.to_owned()))?;
        Ok(Self::new(element_type, id))
    }
}

/// A point on the map.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// Identifier, negative while provisional.
    pub id: i64,
    /// Version counter assigned by the remote authority.
    pub version: i32,
    /// Position with `x = longitude` and `y = latitude`.
    pub position: Coord<f64>,
    /// Element tags.
    pub tags: Tags,
}

impl Node {
    /// Construct a node.
    pub const fn new(id: i64, version: i32, position: Coord<f64>, tags: Tags) -> Self {
        Self {
            id,
            version,
            position,
            tags,
        }
    }
}

/// An ordered polyline or ring of node references.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Way {
    /// Identifier, negative while provisional.
    pub id: i64,
    /// Version counter assigned by the remote authority.
    pub version: i32,
    /// Referenced node identifiers in drawing order.
    pub nodes: Vec<i64>,
    /// Element tags.
    pub tags: Tags,
}

impl Way {
    /// Construct a way.
    pub const fn new(id: i64, version: i32, nodes: Vec<i64>, tags: Tags) -> Self {
        Self {
            id,
            version,
            nodes,
            tags,
        }
    }

    /// Whether the way ends on the node it starts with.
    ///
    /// # Examples
    /// ```
    /// use mapcache_core::{Tags, Way};
    ///
    /// assert!(Way::new(1, 1, vec![1, 2, 3, 1], Tags::new()).is_closed());
    /// assert!(!Way::new(2, 1, vec![1, 2, 3], Tags::new()).is_closed());
    /// ```
    pub fn is_closed(&self) -> bool {
        self.nodes.len() >= 2 && self.nodes.first() == self.nodes.last()
    }
}

/// One member of a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelationMember {
    /// Referenced element.
    pub key: ElementKey,
    /// Role of the member within the relation, possibly empty.
    pub role: String,
}

impl RelationMember {
    /// Construct a relation member.
    pub fn new(key: ElementKey, role: impl Into<String>) -> Self {
        Self {
            key,
            role: role.into(),
        }
    }
}

/// A grouping of other elements.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Relation {
    /// Identifier, negative while provisional.
    pub id: i64,
    /// Version counter assigned by the remote authority.
    pub version: i32,
    /// Members in their significant order.
    pub members: Vec<RelationMember>,
    /// Element tags.
    pub tags: Tags,
}

impl Relation {
    /// Construct a relation.
    pub const fn new(id: i64, version: i32, members: Vec<RelationMember>, tags: Tags) -> Self {
        Self {
            id,
            version,
            members,
            tags,
        }
    }
}

/// Any map element.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Element {
    /// A node.
    Node(Node),
    /// A way.
    Way(Way),
    /// A relation.
    Relation(Relation),
}

impl Element {
    /// Type of the element.
    pub const fn element_type(&self) -> ElementType {
        match self {
            Self::Node(_) => ElementType::Node,
            Self::Way(_) => ElementType::Way,
            Self::Relation(_) => ElementType::Relation,
        }
    }

    /// Identifier of the element.
    pub const fn id(&self) -> i64 {
        match self {
            Self::Node(node) => node.id,
            Self::Way(way) => way.id,
            Self::Relation(relation) => relation.id,
        }
    }

    /// Store key of the element.
    pub const fn key(&self) -> ElementKey {
        ElementKey::new(self.element_type(), self.id())
    }

    /// Version counter of the element.
    pub const fn version(&self) -> i32 {
        match self {
            Self::Node(node) => node.version,
            Self::Way(way) => way.version,
            Self::Relation(relation) => relation.version,
        }
    }

    /// Tags of the element.
    pub const fn tags(&self) -> &Tags {
        match self {
            Self::Node(node) => &node.tags,
            Self::Way(way) => &way.tags,
            Self::Relation(relation) => &relation.tags,
        }
    }

    /// Keys of the elements this element's shape depends on.
    pub fn dependencies(&self) -> Vec<ElementKey> {
        match self {
            Self::Node(_) => Vec::new(),
            Self::Way(way) => way.nodes.iter().copied().map(ElementKey::node).collect(),
            Self::Relation(relation) => relation.members.iter().map(|member| member.key).collect(),
        }
    }
}

impl From<Node> for Element {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Way> for Element {
    fn from(way: Way) -> Self {
        Self::Way(way)
    }
}

impl From<Relation> for Element {
    fn from(relation: Relation) -> Self {
        Self::Relation(relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("node/5", ElementKey::node(5))]
    #[case("way/-12", ElementKey::way(-12))]
    #[case("relation/0", ElementKey::relation(0))]
    fn parses_keys(#[case] text: &str, #[case] expected: ElementKey) {
        assert_eq!(text.parse::<ElementKey>(), Ok(expected));
        assert_eq!(expected.to_string(), text);
    }

    #[rstest]
    #[case("node5", ElementKeyParseError::MissingSeparator("node5".into()))]
    #[case("area/5", ElementKeyParseError::UnknownType("area".into()))]
    #[case("way/x", ElementKeyParseError::InvalidId("x".into()))]
    fn rejects_malformed_keys(#[case] text: &str, #[case] expected: ElementKeyParseError) {
        assert_eq!(text.parse::<ElementKey>(), Err(expected));
    }

    #[rstest]
    fn relation_dependencies_follow_member_order() {
        let relation = Relation::new(
            1,
            1,
            vec![
                RelationMember::new(ElementKey::way(3), "outer"),
                RelationMember::new(ElementKey::node(2), "label"),
            ],
            Tags::new(),
        );
        assert_eq!(
            Element::from(relation).dependencies(),
            vec![ElementKey::way(3), ElementKey::node(2)]
        );
    }

    #[rstest]
    fn single_node_way_is_not_closed() {
        assert!(!Way::new(1, 1, vec![4], Tags::new()).is_closed());
    }
}
