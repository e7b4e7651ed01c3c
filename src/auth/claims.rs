use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Staff token claims. Tokens are issued by the SIRAMA login service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (staff user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Staff roles, e.g. `nurse`, `registration`
    #[serde(default)]
    pub roles: Vec<String>,
    /// Additional custom claims
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Claims {
    pub fn user_id(&self) -> &str {
        &self.sub
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// True if any of the token's roles is in `allowed`
    pub fn has_any_role(&self, allowed: &[String]) -> bool {
        allowed.iter().any(|role| self.has_role(role))
    }
}
