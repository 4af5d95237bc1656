//! Query building, date and input helpers

pub mod dates;
pub mod query_builder;
pub mod validation;
