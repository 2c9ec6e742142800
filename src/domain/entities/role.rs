use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    SalesAssociate,
    ProjectManager,
    TeamMember,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    /// Parse a stored role, falling back to the least privileged staff role.
    pub fn from_stored(raw: &str) -> Self {
        raw.parse().unwrap_or(Role::TeamMember)
    }

    /// Roles allowed to suspend, reactivate or delete other workspace members.
    pub fn can_administer(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}
