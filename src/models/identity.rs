//! Caller identity as asserted by the gateway

use types::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub email_verified: bool,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: UserId, email_verified: bool, role: Role) -> Self {
        Self {
            user_id,
            email_verified,
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
