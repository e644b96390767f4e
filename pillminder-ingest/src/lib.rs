//! pillminder-ingest: medication payload parsing and day-range queries.

pub mod parsers;
pub mod query;
pub mod types;

pub use parsers::medications_json::parse_medications_json;
pub use query::DayRange;
pub use types::MedicationRow;
