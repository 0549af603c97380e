//! Offset pagination for list endpoints.

use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use validator::Validate;

use crate::config::{DEFAULT_LIMIT, DEFAULT_SKIP, MAX_LIMIT, MIN_LIMIT};

/// `skip`/`limit` query parameters shared by every list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageWindow {
    /// Number of records to skip
    #[serde(default = "default_skip")]
    #[param(minimum = 0, default = 0)]
    pub skip: u64,
    /// Maximum number of records to return
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 500, message = "limit must be between 1 and 500"))]
    #[param(minimum = 1, maximum = 500, default = 100)]
    pub limit: u64,
}

fn default_skip() -> u64 {
    DEFAULT_SKIP
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

impl PageWindow {
    pub fn new(skip: u64, limit: u64) -> Self {
        Self { skip, limit }
    }

    /// True when `limit` is within the accepted bounds.
    pub fn is_within_bounds(&self) -> bool {
        (MIN_LIMIT..=MAX_LIMIT).contains(&self.limit)
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            skip: DEFAULT_SKIP,
            limit: DEFAULT_LIMIT,
        }
    }
}
