//! Pieces shared by several handler modules

pub mod crud;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Free-text catalog search
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Substring matched case-insensitively; empty lists everything
    #[validate(length(max = 200))]
    pub query: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IdResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IdsResponse {
    pub ids: Vec<Uuid>,
}

/// Split a comma-separated query value, dropping blanks.
pub fn split_list(raw: Option<&str>) -> Vec<&str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}
