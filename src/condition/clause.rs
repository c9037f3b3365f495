//! Single-clause grammars
//!
//! Each family matches one clause against a fixed phrase shape. Regex groups
//! are read by name into a [`ClauseCapture`] so nothing downstream depends
//! on group numbering.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{
    BasicCondition, Comparator, Condition, ConditionFamily, Operand, PositionCondition,
    RegionCondition, RegionProperty, SequenceRange, SpatialRelation, WithinCondition,
};
use crate::error::{ParseError, ParseResult};

const OPERAND: &str = r#""[^"]*"|[^\s"]+"#;

/// `[not] <left> <cmp> <right> [to <upper>] [cluster <name>]`
static COMPARISON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"^(?P<not>not\s+)?(?P<left>.+?)(?:\s+(?P<word>equals|matches|is\s+in|in\s+set|in)\s+|\s*(?P<symbol>>=|<=|<>|<|=|>)\s*)(?P<right>{op})(?:\s+to\s+(?P<upper>{op}))?(?:\s+cluster\s+(?P<cluster>{op}))?$"#,
        op = OPERAND
    ))
    .unwrap()
});

static INSIDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<not>not\s+)?(?P<place>inside|outside)\s+(?P<track>[^\s\x22]+)$").unwrap()
});

static SPATIAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<not>not\s+)?region\s+(?P<relation>overlaps|inside|covers|present\s+in)\s+(?P<track>[^\s\x22]+)(?P<same>\s+with\s+same\s+type)?$",
    )
    .unwrap()
});

static REGION_PROPERTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^region's\s+(?:(?P<simple>type|score|length|start|end|orientation)|text\s+property\s+"(?P<text>[^"]+)"|numeric\s+property\s+"(?P<numeric>[^"]+)"|distance\s+to\s+closest\s+(?P<type_equal>type-equal\s+)?region(?:\s+in\s+(?P<track>\S+))?)$"#,
    )
    .unwrap()
});

static WITHIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^within\s*\[(?P<body>[^\]]*)\]$").unwrap());

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<seq>[^\s:]+)(?::\s*(?P<start>-?\d+)\s*-\s*(?P<end>-?\d+))?$").unwrap()
});

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap());

/// Named fields of a matched comparison clause
#[derive(Debug, Clone, PartialEq)]
pub struct ClauseCapture {
    pub negated: bool,
    pub left: String,
    pub comparator: Comparator,
    pub right: Operand,
    pub upper: Option<Operand>,
    pub cluster: Option<String>,
}

impl ClauseCapture {
    /// Match `text` against the comparison shape
    ///
    /// Checks the `in ... to ...` pairing and that `cluster` only follows a
    /// set comparator.
    pub fn parse(text: &str) -> ParseResult<Option<Self>> {
        let Some(caps) = COMPARISON_RE.captures(text) else {
            return Ok(None);
        };
        let token = group(&caps, "word")
            .or_else(|| group(&caps, "symbol"))
            .unwrap_or_default();
        let comparator = Comparator::from_token(&token)
            .ok_or_else(|| ParseError::syntax(format!("Unknown comparator '{}'", token)))?;

        let capture = ClauseCapture {
            negated: caps.name("not").is_some(),
            left: group(&caps, "left").unwrap_or_default(),
            comparator,
            right: Operand::parse(&group(&caps, "right").unwrap_or_default()),
            upper: group(&caps, "upper").map(|u| Operand::parse(&u)),
            cluster: group(&caps, "cluster").map(|c| unquote(&c)),
        };

        match (capture.comparator, &capture.upper) {
            (Comparator::InRange, None) => {
                return Err(ParseError::syntax(format!(
                    "Missing upper bound in '{}'. Expected '<lower> to <upper>' after 'in'",
                    text
                )));
            }
            (c, Some(_)) if c != Comparator::InRange => {
                return Err(ParseError::syntax(format!(
                    "'to' is only allowed after the 'in' comparator in '{}'",
                    text
                )));
            }
            _ => {}
        }
        if capture.cluster.is_some() && !capture.comparator.is_set() {
            return Err(ParseError::syntax(format!(
                "'cluster' restriction requires 'is in' or 'in set' in '{}'",
                text
            )));
        }
        Ok(Some(capture))
    }
}

fn group(caps: &Captures, name: &str) -> Option<String> {
    caps.name(name).map(|m| m.as_str().trim().to_string())
}

fn unquote(text: &str) -> String {
    text.trim()
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text.trim())
        .to_string()
}

/// Parse one atomic clause with the grammar of the given family
pub fn parse_clause(text: &str, family: ConditionFamily) -> ParseResult<Condition> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::syntax("Empty condition clause"));
    }
    match family {
        ConditionFamily::Position => parse_position(text).map(Condition::Position),
        ConditionFamily::Region => parse_region(text).map(Condition::Region),
        ConditionFamily::Basic => parse_basic(text).map(Condition::Basic),
    }
}

fn parse_position(text: &str) -> ParseResult<PositionCondition> {
    if let Some(caps) = INSIDE_RE.captures(text) {
        let outside = &caps["place"] == "outside";
        return Ok(PositionCondition::Inside {
            negated: caps.name("not").is_some() != outside,
            track: caps["track"].to_string(),
        });
    }

    let capture = ClauseCapture::parse(text)?.ok_or_else(|| unrecognized(text, "position"))?;
    if capture.comparator.is_set() || capture.cluster.is_some() {
        return Err(ParseError::syntax(format!(
            "Comparator '{}' can not be used in a position condition",
            capture.comparator
        )));
    }
    if !NAME_RE.is_match(&capture.left) {
        return Err(ParseError::syntax(format!(
            "Expected a data track name but found '{}'",
            capture.left
        )));
    }
    Ok(PositionCondition::Compare {
        negated: capture.negated,
        track: capture.left,
        comparator: capture.comparator,
        value: capture.right,
        upper: capture.upper,
    })
}

fn parse_region(text: &str) -> ParseResult<RegionCondition> {
    if let Some(caps) = SPATIAL_RE.captures(text) {
        let relation = SpatialRelation::from_token(&caps["relation"])
            .ok_or_else(|| unrecognized(text, "region"))?;
        return Ok(RegionCondition::Spatial {
            negated: caps.name("not").is_some(),
            relation,
            track: caps["track"].to_string(),
            same_type: caps.name("same").is_some(),
        });
    }

    let capture = ClauseCapture::parse(text)?.ok_or_else(|| unrecognized(text, "region"))?;
    let property = parse_region_property(&capture.left)?;

    let allowed = if property.is_textual() {
        capture.comparator.is_textual() || capture.comparator.is_set()
    } else {
        capture.comparator.is_numeric()
    };
    if !allowed {
        return Err(ParseError::syntax(format!(
            "Comparator '{}' can not be used with region's {}",
            capture.comparator, property
        )));
    }

    Ok(RegionCondition::Property {
        negated: capture.negated,
        property,
        comparator: capture.comparator,
        value: capture.right,
        upper: capture.upper,
        cluster: capture.cluster,
    })
}

fn parse_region_property(text: &str) -> ParseResult<RegionProperty> {
    let caps = REGION_PROPERTY_RE.captures(text).ok_or_else(|| {
        ParseError::syntax(format!("Unrecognized region property '{}'", text))
    })?;

    if let Some(simple) = caps.name("simple") {
        return Ok(match simple.as_str() {
            "type" => RegionProperty::Type,
            "score" => RegionProperty::Score,
            "length" => RegionProperty::Length,
            "start" => RegionProperty::Start,
            "end" => RegionProperty::End,
            _ => RegionProperty::Orientation,
        });
    }
    if let Some(name) = caps.name("text") {
        return Ok(RegionProperty::TextProperty(name.as_str().to_string()));
    }
    if let Some(name) = caps.name("numeric") {
        return Ok(RegionProperty::NumericProperty(name.as_str().to_string()));
    }
    Ok(RegionProperty::DistanceToClosest {
        type_equal: caps.name("type_equal").is_some(),
        track: caps.name("track").map(|m| m.as_str().to_string()),
    })
}

fn parse_basic(text: &str) -> ParseResult<BasicCondition> {
    let capture = ClauseCapture::parse(text)?.ok_or_else(|| unrecognized(text, "basic"))?;
    if capture.left.contains(char::is_whitespace) && !capture.left.starts_with('"') {
        return Err(ParseError::syntax(format!(
            "Expected a single operand but found '{}'",
            capture.left
        )));
    }
    Ok(BasicCondition {
        negated: capture.negated,
        left: Operand::parse(&capture.left),
        comparator: capture.comparator,
        right: capture.right,
        upper: capture.upper,
        cluster: capture.cluster,
    })
}

/// Parse `within[seq:start-end, seq2, ...]`
pub fn parse_within(text: &str) -> ParseResult<WithinCondition> {
    let caps = WITHIN_RE
        .captures(text.trim())
        .ok_or_else(|| ParseError::syntax(format!("Malformed within clause '{}'", text.trim())))?;

    let mut ranges = Vec::new();
    for item in caps["body"].split(',') {
        let item = item.trim();
        let range = RANGE_RE
            .captures(item)
            .ok_or_else(|| ParseError::syntax(format!("Malformed sequence range '{}'", item)))?;
        let span = match (range.name("start"), range.name("end")) {
            (Some(start), Some(end)) => {
                let bound = |s: &str| {
                    s.parse::<i64>()
                        .map_err(|_| ParseError::syntax(format!("Invalid position in '{}'", item)))
                };
                let (start, end) = (bound(start.as_str())?, bound(end.as_str())?);
                if start > end {
                    return Err(ParseError::semantic(format!(
                        "Range start {} is after end {} in '{}'",
                        start, end, item
                    )));
                }
                Some((start, end))
            }
            _ => None,
        };
        ranges.push(SequenceRange {
            sequence: range["seq"].to_string(),
            span,
        });
    }
    if ranges.is_empty() {
        return Err(ParseError::syntax("Empty within clause"));
    }
    Ok(WithinCondition { ranges })
}

fn unrecognized(text: &str, family: &str) -> ParseError {
    ParseError::syntax(format!("Unrecognized {} condition '{}'", family, text))
}
