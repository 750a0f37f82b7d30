use crate::models::user::{User, UserStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct SetStatusesPayload {
    pub statuses: Vec<UserStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpResponse {
    pub user: User,
    pub created: bool,
}
