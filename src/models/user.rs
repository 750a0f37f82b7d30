use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role tags granted to a user by an administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UserStatus {
    Admin,
    Investor,
    Learner,
    Relations,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Admin => "Admin",
            UserStatus::Investor => "Investor",
            UserStatus::Learner => "Learner",
            UserStatus::Relations => "Relations",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(UserStatus::Admin),
            "Investor" => Ok(UserStatus::Investor),
            "Learner" => Ok(UserStatus::Learner),
            "Relations" => Ok(UserStatus::Relations),
            other => Err(format!("unknown user status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub statuses: Vec<UserStatus>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_status(&self, status: UserStatus) -> bool {
        self.statuses.contains(&status)
    }

    pub fn is_admin(&self) -> bool {
        self.has_status(UserStatus::Admin)
    }
}

/// Profile fields taken from the identity provider at sign-up.
#[derive(Debug, Clone)]
pub struct UpsertUser {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
}

/// A user row as shown in the staff inbox, with the derived unread flag.
#[derive(Debug, Clone, Serialize)]
pub struct InboxUser {
    #[serde(flatten)]
    pub user: User,
    pub has_unread_messages: bool,
}
