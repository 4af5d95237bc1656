//! Shared API types

pub mod domain;
pub mod pagination;

pub use domain::{Acquisition, ItemStatus};
pub use pagination::{Window, WindowInfo};
