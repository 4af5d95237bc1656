pub mod agenda;
pub mod common;
pub mod health;
pub mod medications;
pub mod patients;
pub mod prep_requests;
pub mod records;
pub mod registry;
pub mod reports;
pub mod staff;
