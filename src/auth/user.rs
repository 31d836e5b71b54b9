use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated user a request runs on behalf of.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Principal {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Bearer token forwarded to the data store so row-level security
/// attributes reads and writes to the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// What the auth gate attaches to a protected request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub principal: Principal,
    pub credential: Credential,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_hides_token() {
        let credential = Credential::new("eyJhbGciOi.secret");
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("secret"));
        assert_eq!(credential.token(), "eyJhbGciOi.secret");
    }
}
