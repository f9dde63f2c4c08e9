use serde::{Deserialize, Serialize};

/// Account credentials for password session setup and key derivation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct User {
    pub domain: String,
    pub username: String,
    pub password: String,
}

impl User {
    pub fn new(domain: &str, username: &str, password: &str) -> Self {
        Self {
            domain: domain.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}
