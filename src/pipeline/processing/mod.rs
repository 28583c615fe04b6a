// Pipeline processing: cleaning, key resolution, joining and feature engineering

pub mod country;
pub mod features;
pub mod join;
pub mod schema;
pub mod sentinel;
pub mod sources;
