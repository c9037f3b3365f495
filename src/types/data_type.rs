//! Data type tags
//!
//! The closed set of data object types a protocol can declare. Display names
//! are the spelling used in protocol text and registry files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "Sequence")]
    Sequence,
    #[serde(rename = "Sequence Collection")]
    SequenceCollection,
    #[serde(rename = "Sequence Partition")]
    SequencePartition,
    #[serde(rename = "Motif")]
    Motif,
    #[serde(rename = "Motif Collection")]
    MotifCollection,
    #[serde(rename = "Motif Partition")]
    MotifPartition,
    #[serde(rename = "Module")]
    Module,
    #[serde(rename = "Module Collection")]
    ModuleCollection,
    #[serde(rename = "Region Dataset")]
    RegionDataset,
    #[serde(rename = "Numeric Dataset")]
    NumericDataset,
    #[serde(rename = "DNA Sequence Dataset")]
    DnaSequenceDataset,
    #[serde(rename = "Background Model")]
    BackgroundModel,
    #[serde(rename = "Numeric Variable")]
    NumericVariable,
    #[serde(rename = "Text Variable")]
    TextVariable,
    #[serde(rename = "Sequence Numeric Map")]
    SequenceNumericMap,
    #[serde(rename = "Motif Numeric Map")]
    MotifNumericMap,
    #[serde(rename = "Module Numeric Map")]
    ModuleNumericMap,
    #[serde(rename = "Sequence Text Map")]
    SequenceTextMap,
    #[serde(rename = "Motif Text Map")]
    MotifTextMap,
    #[serde(rename = "Expression Profile")]
    ExpressionProfile,
    #[serde(rename = "Output Data")]
    OutputData,
    #[serde(rename = "Analysis")]
    Analysis,
}

impl DataType {
    pub const ALL: [DataType; 22] = [
        DataType::Sequence,
        DataType::SequenceCollection,
        DataType::SequencePartition,
        DataType::Motif,
        DataType::MotifCollection,
        DataType::MotifPartition,
        DataType::Module,
        DataType::ModuleCollection,
        DataType::RegionDataset,
        DataType::NumericDataset,
        DataType::DnaSequenceDataset,
        DataType::BackgroundModel,
        DataType::NumericVariable,
        DataType::TextVariable,
        DataType::SequenceNumericMap,
        DataType::MotifNumericMap,
        DataType::ModuleNumericMap,
        DataType::SequenceTextMap,
        DataType::MotifTextMap,
        DataType::ExpressionProfile,
        DataType::OutputData,
        DataType::Analysis,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Sequence => "Sequence",
            DataType::SequenceCollection => "Sequence Collection",
            DataType::SequencePartition => "Sequence Partition",
            DataType::Motif => "Motif",
            DataType::MotifCollection => "Motif Collection",
            DataType::MotifPartition => "Motif Partition",
            DataType::Module => "Module",
            DataType::ModuleCollection => "Module Collection",
            DataType::RegionDataset => "Region Dataset",
            DataType::NumericDataset => "Numeric Dataset",
            DataType::DnaSequenceDataset => "DNA Sequence Dataset",
            DataType::BackgroundModel => "Background Model",
            DataType::NumericVariable => "Numeric Variable",
            DataType::TextVariable => "Text Variable",
            DataType::SequenceNumericMap => "Sequence Numeric Map",
            DataType::MotifNumericMap => "Motif Numeric Map",
            DataType::ModuleNumericMap => "Module Numeric Map",
            DataType::SequenceTextMap => "Sequence Text Map",
            DataType::MotifTextMap => "Motif Text Map",
            DataType::ExpressionProfile => "Expression Profile",
            DataType::OutputData => "Output Data",
            DataType::Analysis => "Analysis",
        }
    }

    /// Per-position data bound to sequences
    pub fn is_feature_dataset(&self) -> bool {
        matches!(
            self,
            DataType::RegionDataset | DataType::NumericDataset | DataType::DnaSequenceDataset
        )
    }

    /// Types that can stand in for a number
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::NumericVariable
                | DataType::SequenceNumericMap
                | DataType::MotifNumericMap
                | DataType::ModuleNumericMap
        )
    }

    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            DataType::SequenceCollection | DataType::MotifCollection | DataType::ModuleCollection
        )
    }

    pub fn is_partition(&self) -> bool {
        matches!(self, DataType::SequencePartition | DataType::MotifPartition)
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self,
            DataType::TextVariable | DataType::SequenceTextMap | DataType::MotifTextMap
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = String;

    /// Case-insensitive, whitespace-tolerant match on the display name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: Vec<&str> = s.split_whitespace().collect();
        DataType::ALL
            .iter()
            .copied()
            .find(|ty| {
                let words: Vec<&str> = ty.name().split(' ').collect();
                words.len() == wanted.len()
                    && words
                        .iter()
                        .zip(&wanted)
                        .all(|(a, b)| a.eq_ignore_ascii_case(b))
            })
            .ok_or_else(|| format!("Unknown data type '{}'", s.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display_names() {
        assert_eq!("Region Dataset".parse(), Ok(DataType::RegionDataset));
        assert_eq!("dna  sequence dataset".parse(), Ok(DataType::DnaSequenceDataset));
        assert!("Region".parse::<DataType>().is_err());
    }

    #[test]
    fn test_every_name_round_trips() {
        for ty in DataType::ALL {
            assert_eq!(ty.name().parse::<DataType>(), Ok(ty));
        }
    }

    #[test]
    fn test_groups() {
        assert!(DataType::NumericDataset.is_feature_dataset());
        assert!(!DataType::NumericVariable.is_feature_dataset());
        assert!(DataType::MotifNumericMap.is_numeric());
        assert!(DataType::ModuleCollection.is_collection());
    }
}
