pub mod csv_source;
pub mod memory_source;

pub use csv_source::CsvTableSource;
pub use memory_source::InMemoryTableSource;
