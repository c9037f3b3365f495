//! Reference checks
//!
//! Clause grammars only look at text. Names used by a parsed condition are
//! checked here against whatever type lookup the caller has.

use super::{
    BasicCondition, Comparator, Condition, Operand, PositionCondition, RegionCondition,
    RegionProperty,
};
use crate::error::{ParseError, ParseResult};
use crate::types::DataType;

type Resolve<'a> = &'a dyn Fn(&str) -> Option<DataType>;

/// Check that every data name in the condition exists and has a fitting type
pub fn validate_references(condition: &Condition, resolve: Resolve<'_>) -> ParseResult<()> {
    match condition {
        Condition::Boolean { children, .. } => children
            .iter()
            .try_for_each(|child| validate_references(child, resolve)),
        Condition::Position(position) => check_position(position, resolve),
        Condition::Region(region) => check_region(region, resolve),
        Condition::Basic(basic) => check_basic(basic, resolve),
        // Sequence names are resolved when the task runs
        Condition::Within(_) => Ok(()),
    }
}

fn lookup(name: &str, resolve: Resolve<'_>) -> ParseResult<DataType> {
    resolve(name)
        .ok_or_else(|| ParseError::semantic(format!("Unknown data object '{}'", name)))
}

fn expect_type(
    name: &str,
    resolve: Resolve<'_>,
    accept: impl Fn(DataType) -> bool,
    wanted: &str,
) -> ParseResult<DataType> {
    let ty = lookup(name, resolve)?;
    if !accept(ty) {
        return Err(ParseError::semantic(format!(
            "'{}' is a {}, expected {}",
            name, ty, wanted
        )));
    }
    Ok(ty)
}

/// A reference operand compared with a comparator must hold a comparable value
fn check_operand(
    operand: &Operand,
    comparator: Comparator,
    resolve: Resolve<'_>,
) -> ParseResult<()> {
    let Some(name) = operand.reference() else {
        return Ok(());
    };
    if comparator.is_set() {
        expect_type(
            name,
            resolve,
            |ty| ty.is_collection() || ty.is_partition(),
            "a collection or partition",
        )?;
    } else if comparator.is_numeric() && !comparator.is_textual() {
        expect_type(
            name,
            resolve,
            |ty| ty.is_numeric() || ty.is_feature_dataset(),
            "numeric data",
        )?;
    } else {
        lookup(name, resolve)?;
    }
    Ok(())
}

fn check_cluster(
    right: &Operand,
    cluster: &Option<String>,
    resolve: Resolve<'_>,
) -> ParseResult<()> {
    if cluster.is_none() {
        return Ok(());
    }
    match right.reference() {
        Some(name) => {
            expect_type(name, resolve, |ty| ty.is_partition(), "a partition")?;
            Ok(())
        }
        None => Err(ParseError::semantic(
            "A cluster restriction needs a partition to select from",
        )),
    }
}

fn check_position(condition: &PositionCondition, resolve: Resolve<'_>) -> ParseResult<()> {
    match condition {
        PositionCondition::Inside { track, .. } => {
            expect_type(
                track,
                resolve,
                |ty| ty == DataType::RegionDataset,
                "a Region Dataset",
            )?;
            Ok(())
        }
        PositionCondition::Compare {
            track,
            comparator,
            value,
            upper,
            ..
        } => {
            expect_type(
                track,
                resolve,
                |ty| ty.is_feature_dataset(),
                "a feature dataset",
            )?;
            check_operand(value, *comparator, resolve)?;
            if let Some(upper) = upper {
                check_operand(upper, *comparator, resolve)?;
            }
            Ok(())
        }
    }
}

fn check_region(condition: &RegionCondition, resolve: Resolve<'_>) -> ParseResult<()> {
    let region_dataset = |ty: DataType| ty == DataType::RegionDataset;
    match condition {
        RegionCondition::Spatial { track, .. } => {
            expect_type(track, resolve, region_dataset, "a Region Dataset")?;
            Ok(())
        }
        RegionCondition::Property {
            property,
            comparator,
            value,
            upper,
            cluster,
            ..
        } => {
            if let RegionProperty::DistanceToClosest {
                track: Some(track), ..
            } = property
            {
                expect_type(track, resolve, region_dataset, "a Region Dataset")?;
            }
            check_operand(value, *comparator, resolve)?;
            if let Some(upper) = upper {
                check_operand(upper, *comparator, resolve)?;
            }
            check_cluster(value, cluster, resolve)
        }
    }
}

fn check_basic(condition: &BasicCondition, resolve: Resolve<'_>) -> ParseResult<()> {
    if let Some(name) = condition.left.reference() {
        lookup(name, resolve)?;
    }
    check_operand(&condition.right, condition.comparator, resolve)?;
    if let Some(upper) = &condition.upper {
        check_operand(upper, condition.comparator, resolve)?;
    }
    check_cluster(&condition.right, &condition.cluster, resolve)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::condition::{ConditionFamily, parse_condition};

    fn types() -> HashMap<&'static str, DataType> {
        HashMap::from([
            ("Genes", DataType::RegionDataset),
            ("Conservation", DataType::NumericDataset),
            ("Count", DataType::NumericVariable),
            ("Label", DataType::TextVariable),
            ("Clusters", DataType::SequencePartition),
            ("Targets", DataType::SequenceCollection),
        ])
    }

    fn check(text: &str, family: ConditionFamily) -> ParseResult<()> {
        let types = types();
        let resolve = |name: &str| types.get(name).copied();
        let condition = parse_condition(text, family).unwrap();
        validate_references(&condition, &resolve)
    }

    #[test]
    fn test_position_references() {
        assert!(check("inside Genes and Conservation > Count", ConditionFamily::Position).is_ok());
        assert!(check("inside Conservation", ConditionFamily::Position).is_err());
        assert!(check("Count > 3", ConditionFamily::Position).is_err());
    }

    #[test]
    fn test_region_references() {
        assert!(check("region overlaps Genes", ConditionFamily::Region).is_ok());
        let err = check("region overlaps Missing", ConditionFamily::Region).unwrap_err();
        assert!(err.message.contains("Missing"));
        assert!(check("region's score > Label", ConditionFamily::Region).is_err());
    }

    #[test]
    fn test_basic_references() {
        assert!(check("Count > 10 or Label equals \"x\"", ConditionFamily::Basic).is_ok());
        assert!(check("Unknown > 10", ConditionFamily::Basic).is_err());
        assert!(check("Label is in Targets", ConditionFamily::Basic).is_ok());
        assert!(check("Label is in Count", ConditionFamily::Basic).is_err());
    }

    #[test]
    fn test_cluster_needs_partition() {
        assert!(check("Label in set Clusters cluster \"C1\"", ConditionFamily::Basic).is_ok());
        assert!(check("Label in set Targets cluster \"C1\"", ConditionFamily::Basic).is_err());
    }
}
