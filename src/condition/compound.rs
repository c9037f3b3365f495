//! Compound conditions
//!
//! Three stages:
//! 1. [`parse_compound_condition`] splits text on top-level `and`/`or` into a
//!    flat list of clauses and operators, recursing into parenthesised groups.
//! 2. [`restructure_condition_tree`] resolves precedence (AND binds tighter
//!    than OR) into a tree where no level mixes operators.
//! 3. [`convert_to_condition`] parses the leaves with a family grammar.

use super::{BoolOp, Condition, ConditionFamily, clause::parse_clause, combine};
use crate::error::{ParseError, ParseResult};

/// One element of a flat segment list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Clause(String),
    Group(SegmentList),
}

/// Clauses interleaved with operators: `items.len() == operators.len() + 1`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentList {
    pub items: Vec<Segment>,
    pub operators: Vec<BoolOp>,
}

/// Normalised tree with unparsed leaves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionTree {
    Leaf(String),
    Node {
        op: BoolOp,
        children: Vec<ConditionTree>,
    },
}

impl ConditionTree {
    fn node(op: BoolOp, children: Vec<ConditionTree>) -> ConditionTree {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                ConditionTree::Node {
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
        ConditionTree::Node { op, children: flat }
    }
}

/// Split condition text into clauses and operators
pub fn parse_compound_condition(text: &str) -> ParseResult<SegmentList> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::syntax("Empty condition"));
    }

    let bytes = text.as_bytes();
    let mut list = SegmentList::default();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut segment_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => in_quote = !in_quote,
            b'(' if !in_quote => depth += 1,
            b')' if !in_quote => {
                if depth == 0 {
                    return Err(ParseError::syntax(format!(
                        "Unmatched ')' in condition '{}'",
                        text
                    )));
                }
                depth -= 1;
            }
            _ if !in_quote && depth == 0 => {
                if let Some((op, len)) = operator_at(bytes, i) {
                    list.items
                        .push(parse_segment(&text[segment_start..i], text)?);
                    list.operators.push(op);
                    i += len;
                    segment_start = i;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    if in_quote {
        return Err(ParseError::syntax(format!(
            "Unmatched quote in condition '{}'",
            text
        )));
    }
    if depth > 0 {
        return Err(ParseError::syntax(format!(
            "Unmatched '(' in condition '{}'",
            text
        )));
    }
    list.items.push(parse_segment(&text[segment_start..], text)?);
    Ok(list)
}

/// Operator token at byte `i`, if it stands on a clause boundary
///
/// The token must be preceded by whitespace or `)` and followed by
/// whitespace, `(` or the end of the text.
fn operator_at(bytes: &[u8], i: usize) -> Option<(BoolOp, usize)> {
    if i == 0 || !(bytes[i - 1].is_ascii_whitespace() || bytes[i - 1] == b')') {
        return None;
    }
    for (op, word) in [(BoolOp::And, b"and".as_slice()), (BoolOp::Or, b"or".as_slice())] {
        let end = i + word.len();
        if end <= bytes.len()
            && bytes[i..end].eq_ignore_ascii_case(word)
            && (end == bytes.len() || bytes[end].is_ascii_whitespace() || bytes[end] == b'(')
        {
            return Some((op, word.len()));
        }
    }
    None
}

fn parse_segment(segment: &str, whole: &str) -> ParseResult<Segment> {
    let segment = segment.trim();
    if segment.is_empty() {
        return Err(ParseError::syntax(format!(
            "Empty clause in condition '{}'",
            whole
        )));
    }
    if let Some(inner) = wrapped_in_parentheses(segment) {
        let mut nested = parse_compound_condition(inner)?;
        if nested.items.len() == 1 {
            if let Some(only) = nested.items.pop() {
                return Ok(only);
            }
        }
        return Ok(Segment::Group(nested));
    }
    Ok(Segment::Clause(segment.to_string()))
}

/// Inner text when the whole segment is one parenthesised group
fn wrapped_in_parentheses(segment: &str) -> Option<&str> {
    if !segment.starts_with('(') || !segment.ends_with(')') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_quote = false;
    for (idx, ch) in segment.char_indices() {
        match ch {
            '"' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                if depth == 0 && idx != segment.len() - 1 {
                    return None;
                }
            }
            _ => {}
        }
    }
    Some(&segment[1..segment.len() - 1])
}

/// Resolve operator precedence into a tree that never mixes AND and OR on one level
pub fn restructure_condition_tree(list: &SegmentList) -> ConditionTree {
    let children: Vec<ConditionTree> = list
        .items
        .iter()
        .map(|item| match item {
            Segment::Clause(text) => ConditionTree::Leaf(text.clone()),
            Segment::Group(group) => restructure_condition_tree(group),
        })
        .collect();

    let Some(first_op) = list.operators.first().copied() else {
        return children
            .into_iter()
            .next()
            .unwrap_or(ConditionTree::Leaf(String::new()));
    };

    if list.operators.iter().all(|op| *op == first_op) {
        return ConditionTree::node(first_op, children);
    }

    // Mixed: every run of AND-connected items becomes one AND group under OR
    let mut groups = Vec::new();
    let mut run = Vec::new();
    let mut children = children.into_iter();
    if let Some(first) = children.next() {
        run.push(first);
    }
    for (op, child) in list.operators.iter().zip(children) {
        if *op == BoolOp::Or {
            groups.push(ConditionTree::node(BoolOp::And, std::mem::take(&mut run)));
        }
        run.push(child);
    }
    groups.push(ConditionTree::node(BoolOp::And, run));
    ConditionTree::node(BoolOp::Or, groups)
}

/// Turn a restructured tree into conditions, parsing leaves with the family grammar
pub fn convert_to_condition(tree: &ConditionTree, family: ConditionFamily) -> ParseResult<Condition> {
    match tree {
        ConditionTree::Leaf(text) => parse_clause(text, family),
        ConditionTree::Node { op, children } => {
            let children = children
                .iter()
                .map(|child| convert_to_condition(child, family))
                .collect::<ParseResult<Vec<_>>>()?;
            Ok(combine(*op, children))
        }
    }
}

/// Parse compound condition text into a normalised condition
pub fn parse_condition(text: &str, family: ConditionFamily) -> ParseResult<Condition> {
    let list = parse_compound_condition(text)?;
    let tree = restructure_condition_tree(&list);
    convert_to_condition(&tree, family)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(text: &str) -> ConditionTree {
        ConditionTree::Leaf(text.to_string())
    }

    fn node(op: BoolOp, children: Vec<ConditionTree>) -> ConditionTree {
        ConditionTree::Node { op, children }
    }

    fn tree(text: &str) -> ConditionTree {
        restructure_condition_tree(&parse_compound_condition(text).unwrap())
    }

    #[test]
    fn test_flat_split() {
        let list = parse_compound_condition("A > 1 and B < 2 or C = 3").unwrap();
        assert_eq!(list.items.len(), 3);
        assert_eq!(list.operators, [BoolOp::And, BoolOp::Or]);
        assert_eq!(list.items[0], Segment::Clause("A > 1".to_string()));
    }

    #[test]
    fn test_operator_inside_quotes_is_text() {
        let list = parse_compound_condition("Name equals \"salt and pepper\"").unwrap();
        assert_eq!(list.items.len(), 1);
        assert!(list.operators.is_empty());
    }

    #[test]
    fn test_operator_needs_boundaries() {
        // "Sandor" and "Corr" contain the operator letters
        let list = parse_compound_condition("Sandor > 1 and Corr < 2").unwrap();
        assert_eq!(list.items.len(), 2);
    }

    #[test]
    fn test_group_after_operator_without_space() {
        let list = parse_compound_condition("A > 1 and(B > 1 or C > 1)").unwrap();
        assert_eq!(list.items.len(), 2);
        assert!(matches!(list.items[1], Segment::Group(_)));
    }

    #[test]
    fn test_single_element_group_is_lifted() {
        let list = parse_compound_condition("(A > 1) or B > 2").unwrap();
        assert_eq!(list.items[0], Segment::Clause("A > 1".to_string()));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        assert_eq!(
            tree("A and B or C"),
            node(BoolOp::Or, vec![node(BoolOp::And, vec![leaf("A"), leaf("B")]), leaf("C")])
        );
        assert_eq!(
            tree("A or B and C"),
            node(BoolOp::Or, vec![leaf("A"), node(BoolOp::And, vec![leaf("B"), leaf("C")])])
        );
    }

    #[test]
    fn test_longer_mixed_sequence() {
        assert_eq!(
            tree("A and B or C and D and E or F"),
            node(
                BoolOp::Or,
                vec![
                    node(BoolOp::And, vec![leaf("A"), leaf("B")]),
                    node(BoolOp::And, vec![leaf("C"), leaf("D"), leaf("E")]),
                    leaf("F"),
                ]
            )
        );
    }

    #[test]
    fn test_uniform_operators_collapse() {
        assert_eq!(
            tree("A or B or C"),
            node(BoolOp::Or, vec![leaf("A"), leaf("B"), leaf("C")])
        );
    }

    #[test]
    fn test_parenthesised_groups_keep_their_operator() {
        assert_eq!(
            tree("(A or B) and C"),
            node(BoolOp::And, vec![node(BoolOp::Or, vec![leaf("A"), leaf("B")]), leaf("C")])
        );
        // Same operator inside and outside: flattened
        assert_eq!(
            tree("(A or B) or C"),
            node(BoolOp::Or, vec![leaf("A"), leaf("B"), leaf("C")])
        );
    }

    #[test]
    fn test_whole_text_in_parentheses() {
        assert_eq!(tree("((A))"), leaf("A"));
    }

    #[test]
    fn test_structural_errors() {
        assert!(parse_compound_condition("").is_err());
        assert!(parse_compound_condition("A and").is_err());
        assert!(parse_compound_condition("A and and B").is_err());
        assert!(parse_compound_condition("(A or B").is_err());
        assert!(parse_compound_condition("A or B)").is_err());
        assert!(parse_compound_condition("Name equals \"abc").is_err());
    }

    #[test]
    fn test_parse_condition_normalises_and_converts() {
        let cond = parse_condition(
            "region's score > 2 and region's type equals \"TATA\" or region overlaps Repeats",
            ConditionFamily::Region,
        )
        .unwrap();
        assert_eq!(
            cond.to_string(),
            "(region's score > 2 and region's type equals \"TATA\") or region overlaps Repeats"
        );
        let reparsed = parse_condition(&cond.to_string(), ConditionFamily::Region).unwrap();
        assert_eq!(reparsed, cond);
        assert_eq!(cond.clone().normalize(), cond);
    }
}
