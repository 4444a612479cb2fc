//! Opaque bearer-credential supply.
//!
//! How a token is acquired is out of scope here; the adapter only needs
//! something that can hand over the current credential on demand.

use crate::error::Result;

pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Result<String>;
}

/// A fixed token, typically read from configuration or the environment.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}
