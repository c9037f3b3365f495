//! Data types, naming rules and the running Type Table.

pub mod data_type;
pub mod naming;
pub mod table;

pub use data_type::DataType;
pub use naming::NamingRules;
pub use table::{DEFAULT_SEQUENCE_COLLECTION, TypeTable};
