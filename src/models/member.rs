//! Member record as stored in the remote collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::missing_required;

/// A person on the roster.
///
/// `id` and `created_at` are assigned by the store and never touched by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub full_name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub is_team_member: bool,
    /// Only meaningful when `is_team_member` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Member {
    /// Role to show for this member; absent whenever the member is not on the team.
    pub fn effective_role(&self) -> Option<&str> {
        if !self.is_team_member {
            return None;
        }
        self.role.as_deref().filter(|r| !r.trim().is_empty())
    }
}

/// Insert payload sent to the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMember {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub is_team_member: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl NewMember {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        missing_required(&self.full_name, &self.phone, &self.address)
    }

    /// Drop any role carried by a non-team record.
    pub fn normalized(mut self) -> Self {
        if !self.is_team_member {
            self.role = None;
        }
        self
    }
}
