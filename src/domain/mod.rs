//! Table and cell shapes shared by every pipeline stage.

pub mod table;
pub mod value;

pub use table::{Column, Table};
pub use value::{ColumnKind, SemanticType, Value};
