pub mod country;

pub use country::{is_aggregate_code, Country, ValidationError};
