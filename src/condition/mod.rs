//! Conditions
//!
//! `where` filters and flow-control tests. Four atomic families plus a
//! boolean combinator:
//!
//! - position: per-position tests on feature datasets (`inside Genes`, `Conservation > 0.5`)
//! - region: per-region tests (`region's score >= 4`, `region overlaps Repeats`)
//! - basic: scalar tests for `if` lines (`Count > 10`, `Name equals "abc"`)
//! - within: sequence windows (`within[chr1:100-200]`)
//!
//! Compound text is parsed into a flat segment list, restructured into a
//! two-level tree (OR of ANDs) and converted into [`Condition`] values.

pub mod check;
pub mod clause;
pub mod compound;

use std::fmt;

use serde::Serialize;

pub use check::validate_references;
pub use clause::{parse_clause, parse_within};
pub use compound::{
    ConditionTree, Segment, SegmentList, convert_to_condition, parse_compound_condition,
    parse_condition, restructure_condition_tree,
};

/// Which clause grammar applies to the leaves of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionFamily {
    Position,
    Region,
    Basic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn keyword(&self) -> &'static str {
        match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
        }
    }
}

/// Closed comparator vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Equals,
    Matches,
    IsIn,
    InSet,
    GreaterOrEqual,
    LessOrEqual,
    NotEqual,
    Less,
    Equal,
    Greater,
    /// `in <lower> to <upper>`
    InRange,
}

impl Comparator {
    pub fn from_token(token: &str) -> Option<Self> {
        let words: Vec<&str> = token.split_whitespace().collect();
        let comparator = match words.as_slice() {
            ["equals"] => Comparator::Equals,
            ["matches"] => Comparator::Matches,
            ["is", "in"] => Comparator::IsIn,
            ["in", "set"] => Comparator::InSet,
            [">="] => Comparator::GreaterOrEqual,
            ["<="] => Comparator::LessOrEqual,
            ["<>"] => Comparator::NotEqual,
            ["<"] => Comparator::Less,
            ["="] => Comparator::Equal,
            [">"] => Comparator::Greater,
            ["in"] => Comparator::InRange,
            _ => return None,
        };
        Some(comparator)
    }

    pub fn token(&self) -> &'static str {
        match self {
            Comparator::Equals => "equals",
            Comparator::Matches => "matches",
            Comparator::IsIn => "is in",
            Comparator::InSet => "in set",
            Comparator::GreaterOrEqual => ">=",
            Comparator::LessOrEqual => "<=",
            Comparator::NotEqual => "<>",
            Comparator::Less => "<",
            Comparator::Equal => "=",
            Comparator::Greater => ">",
            Comparator::InRange => "in",
        }
    }

    /// Comparators that order numbers
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Comparator::GreaterOrEqual
                | Comparator::LessOrEqual
                | Comparator::NotEqual
                | Comparator::Less
                | Comparator::Equal
                | Comparator::Greater
                | Comparator::InRange
        )
    }

    /// Comparators that test text
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            Comparator::Equals | Comparator::Matches | Comparator::Equal | Comparator::NotEqual
        )
    }

    /// Membership in a collection
    pub fn is_set(&self) -> bool {
        matches!(self, Comparator::IsIn | Comparator::InSet)
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Right or left hand side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Operand {
    Number(f64),
    Text(String),
    Reference(String),
}

impl Operand {
    /// Interpret a single token: quoted text, a number or a data name
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
            return Operand::Text(token[1..token.len() - 1].to_string());
        }
        match token.parse::<f64>() {
            Ok(number) if number.is_finite() => Operand::Number(number),
            _ => Operand::Reference(token.to_string()),
        }
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            Operand::Reference(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Number(n) => write!(f, "{}", n),
            Operand::Text(t) => write!(f, "\"{}\"", t),
            Operand::Reference(name) => f.write_str(name),
        }
    }
}

/// Per-position test on a feature dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum PositionCondition {
    /// `[not] inside <region dataset>`
    Inside { negated: bool, track: String },
    /// `[not] <dataset> <cmp> <value> [to <upper>]`
    Compare {
        negated: bool,
        track: String,
        comparator: Comparator,
        value: Operand,
        upper: Option<Operand>,
    },
}

/// Region property named after `region's`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "property", content = "name", rename_all = "snake_case")]
pub enum RegionProperty {
    Type,
    Score,
    Length,
    Start,
    End,
    Orientation,
    TextProperty(String),
    NumericProperty(String),
    DistanceToClosest {
        type_equal: bool,
        track: Option<String>,
    },
}

impl RegionProperty {
    /// Properties compared as text rather than numbers
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            RegionProperty::Type | RegionProperty::Orientation | RegionProperty::TextProperty(_)
        )
    }
}

impl fmt::Display for RegionProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionProperty::Type => f.write_str("type"),
            RegionProperty::Score => f.write_str("score"),
            RegionProperty::Length => f.write_str("length"),
            RegionProperty::Start => f.write_str("start"),
            RegionProperty::End => f.write_str("end"),
            RegionProperty::Orientation => f.write_str("orientation"),
            RegionProperty::TextProperty(name) => write!(f, "text property \"{}\"", name),
            RegionProperty::NumericProperty(name) => write!(f, "numeric property \"{}\"", name),
            RegionProperty::DistanceToClosest { type_equal, track } => {
                f.write_str("distance to closest ")?;
                if *type_equal {
                    f.write_str("type-equal ")?;
                }
                f.write_str("region")?;
                if let Some(track) = track {
                    write!(f, " in {}", track)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialRelation {
    Overlaps,
    Inside,
    Covers,
    PresentIn,
}

impl SpatialRelation {
    pub fn from_token(token: &str) -> Option<Self> {
        let words: Vec<&str> = token.split_whitespace().collect();
        match words.as_slice() {
            ["overlaps"] => Some(SpatialRelation::Overlaps),
            ["inside"] => Some(SpatialRelation::Inside),
            ["covers"] => Some(SpatialRelation::Covers),
            ["present", "in"] => Some(SpatialRelation::PresentIn),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            SpatialRelation::Overlaps => "overlaps",
            SpatialRelation::Inside => "inside",
            SpatialRelation::Covers => "covers",
            SpatialRelation::PresentIn => "present in",
        }
    }
}

/// Per-region test on a region dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum RegionCondition {
    Property {
        negated: bool,
        property: RegionProperty,
        comparator: Comparator,
        value: Operand,
        upper: Option<Operand>,
        /// Partition cluster restricting a set comparison
        cluster: Option<String>,
    },
    Spatial {
        negated: bool,
        relation: SpatialRelation,
        track: String,
        /// Only count regions of the same type
        same_type: bool,
    },
}

/// Scalar test used by flow control
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicCondition {
    pub negated: bool,
    pub left: Operand,
    pub comparator: Comparator,
    pub right: Operand,
    pub upper: Option<Operand>,
    pub cluster: Option<String>,
}

/// One window of a `within[...]` clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceRange {
    pub sequence: String,
    /// Inclusive bounds; `None` covers the whole sequence
    pub span: Option<(i64, i64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithinCondition {
    pub ranges: Vec<SequenceRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Condition {
    Position(PositionCondition),
    Region(RegionCondition),
    Basic(BasicCondition),
    Within(WithinCondition),
    Boolean { op: BoolOp, children: Vec<Condition> },
}

impl Condition {
    pub fn is_atomic(&self) -> bool {
        !matches!(self, Condition::Boolean { .. })
    }

    /// Flatten same-operator nesting and lift single-child combinators
    ///
    /// Applying this twice gives the same result as applying it once.
    pub fn normalize(self) -> Condition {
        match self {
            Condition::Boolean { op, children } => {
                let children = children.into_iter().map(Condition::normalize).collect();
                combine(op, children)
            }
            atomic => atomic,
        }
    }

    /// Depth of nested combinators; 0 for an atomic condition
    pub fn depth(&self) -> usize {
        match self {
            Condition::Boolean { children, .. } => {
                1 + children.iter().map(Condition::depth).max().unwrap_or(0)
            }
            _ => 0,
        }
    }
}

/// Build a combinator, absorbing children that use the same operator
pub(crate) fn combine(op: BoolOp, children: Vec<Condition>) -> Condition {
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        match child {
            Condition::Boolean {
                op: child_op,
                children: grandchildren,
            } if child_op == op => flat.extend(grandchildren),
            other => flat.push(other),
        }
    }
    if flat.len() == 1 {
        if let Some(only) = flat.pop() {
            return only;
        }
    }
    Condition::Boolean { op, children: flat }
}

fn not_prefix(negated: bool) -> &'static str {
    if negated { "not " } else { "" }
}

fn write_comparison(
    f: &mut fmt::Formatter<'_>,
    comparator: Comparator,
    value: &Operand,
    upper: &Option<Operand>,
    cluster: &Option<String>,
) -> fmt::Result {
    write!(f, " {} {}", comparator, value)?;
    if let Some(upper) = upper {
        write!(f, " to {}", upper)?;
    }
    if let Some(cluster) = cluster {
        write!(f, " cluster \"{}\"", cluster)?;
    }
    Ok(())
}

impl fmt::Display for PositionCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionCondition::Inside { negated, track } => {
                write!(f, "{}inside {}", not_prefix(*negated), track)
            }
            PositionCondition::Compare {
                negated,
                track,
                comparator,
                value,
                upper,
            } => {
                write!(f, "{}{}", not_prefix(*negated), track)?;
                write_comparison(f, *comparator, value, upper, &None)
            }
        }
    }
}

impl fmt::Display for RegionCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionCondition::Property {
                negated,
                property,
                comparator,
                value,
                upper,
                cluster,
            } => {
                write!(f, "{}region's {}", not_prefix(*negated), property)?;
                write_comparison(f, *comparator, value, upper, cluster)
            }
            RegionCondition::Spatial {
                negated,
                relation,
                track,
                same_type,
            } => {
                write!(
                    f,
                    "{}region {} {}",
                    not_prefix(*negated),
                    relation.token(),
                    track
                )?;
                if *same_type {
                    f.write_str(" with same type")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for BasicCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", not_prefix(self.negated), self.left)?;
        write_comparison(f, self.comparator, &self.right, &self.upper, &self.cluster)
    }
}

impl fmt::Display for SequenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some((start, end)) => write!(f, "{}:{}-{}", self.sequence, start, end),
            None => f.write_str(&self.sequence),
        }
    }
}

impl fmt::Display for WithinCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ranges: Vec<String> = self.ranges.iter().map(|r| r.to_string()).collect();
        write!(f, "within[{}]", ranges.join(","))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Position(c) => write!(f, "{}", c),
            Condition::Region(c) => write!(f, "{}", c),
            Condition::Basic(c) => write!(f, "{}", c),
            Condition::Within(c) => write!(f, "{}", c),
            Condition::Boolean { op, children } => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op.keyword())?;
                    }
                    if child.is_atomic() {
                        write!(f, "{}", child)?;
                    } else {
                        write!(f, "({})", child)?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(name: &str) -> Condition {
        Condition::Basic(BasicCondition {
            negated: false,
            left: Operand::Reference(name.to_string()),
            comparator: Comparator::Greater,
            right: Operand::Number(1.0),
            upper: None,
            cluster: None,
        })
    }

    #[test]
    fn test_operand_parse() {
        assert_eq!(Operand::parse("\"ACGT\""), Operand::Text("ACGT".to_string()));
        assert_eq!(Operand::parse("-2.5"), Operand::Number(-2.5));
        assert_eq!(Operand::parse("Count"), Operand::Reference("Count".to_string()));
        assert_eq!(Operand::parse("NaN"), Operand::Reference("NaN".to_string()));
    }

    #[test]
    fn test_normalize_flattens_same_operator() {
        let nested = Condition::Boolean {
            op: BoolOp::And,
            children: vec![
                basic("A"),
                Condition::Boolean {
                    op: BoolOp::And,
                    children: vec![basic("B"), basic("C")],
                },
            ],
        };
        let normalized = nested.normalize();
        assert_eq!(
            normalized,
            Condition::Boolean {
                op: BoolOp::And,
                children: vec![basic("A"), basic("B"), basic("C")],
            }
        );
        assert_eq!(normalized.clone().normalize(), normalized);
    }

    #[test]
    fn test_normalize_lifts_single_child() {
        let single = Condition::Boolean {
            op: BoolOp::Or,
            children: vec![basic("A")],
        };
        assert_eq!(single.normalize(), basic("A"));
    }

    #[test]
    fn test_render_parenthesizes_nested_groups() {
        let tree = Condition::Boolean {
            op: BoolOp::Or,
            children: vec![
                Condition::Boolean {
                    op: BoolOp::And,
                    children: vec![basic("A"), basic("B")],
                },
                basic("C"),
            ],
        };
        assert_eq!(tree.to_string(), "(A > 1 and B > 1) or C > 1");
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn test_region_property_display() {
        let prop = RegionProperty::DistanceToClosest {
            type_equal: true,
            track: Some("TFBS".to_string()),
        };
        assert_eq!(prop.to_string(), "distance to closest type-equal region in TFBS");
    }
}
