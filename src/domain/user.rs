//! User entity and its input rules.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::Error;

/// A customer account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            username: username.into(),
        }
    }
}

/// Parse a user ID, rejecting anything that is not a UUID.
pub fn parse_user_id(id: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(id).map_err(|_| Error::invalid_user_id())
}

/// Usernames are one or more ASCII letters or digits.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty() && username.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorCode;

    #[test]
    fn test_username_rules() {
        for ok in ["bob", "bob123", "B0B", "7"] {
            assert!(is_valid_username(ok), "{ok} should be valid");
        }
        for bad in ["", " ", " bob", ">_<", "bob_1", "bob-1", "björn", "bob\n"] {
            assert!(!is_valid_username(bad), "{bad:?} should be invalid");
        }
    }

    #[test]
    fn test_parse_user_id() {
        assert!(parse_user_id("87553f14-4c0f-4bd8-8be1-1b6ff5bd8eef").is_ok());
        for bad in ["", "123", "87553f14-4c0f-4bd8-8be1", "not-a-uuid-at-all-xxxxxxxxxxxxxxxxxxx"] {
            let err = parse_user_id(bad).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidUserId);
        }
    }
}
