//! Form draft buffer for the add-member form.

use serde::{Deserialize, Serialize};

use super::NewMember;
use crate::errors::AppError;

/// Editable input buffer mirroring a member minus the store-assigned fields.
///
/// `role` holds whatever the role select currently shows, even while the
/// team checkbox is off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDraft {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub is_team_member: bool,
    #[serde(default)]
    pub role: String,
}

/// Names of the required member fields that are blank, in form order.
pub fn missing_required(full_name: &str, phone: &str, address: &str) -> Vec<&'static str> {
    [("full_name", full_name), ("phone", phone), ("address", address)]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
}

/// Field-level edit to the form draft. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftPatch {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub is_team_member: Option<bool>,
    #[serde(default)]
    pub role: Option<String>,
}

impl FormDraft {
    pub fn apply(&mut self, patch: DraftPatch) {
        if let Some(full_name) = patch.full_name {
            self.full_name = full_name;
        }
        if let Some(phone) = patch.phone {
            self.phone = phone;
        }
        if let Some(address) = patch.address {
            self.address = address;
        }
        if let Some(is_team_member) = patch.is_team_member {
            self.is_team_member = is_team_member;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
    }

    /// Names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        missing_required(&self.full_name, &self.phone, &self.address)
    }

    /// Validate and build the insert payload.
    ///
    /// Team membership only sticks when `team_role_fields` is enabled and the
    /// checkbox is on; otherwise the role select's content is discarded.
    pub fn to_new_member(&self, team_role_fields: bool) -> Result<NewMember, AppError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(AppError::Validation { missing });
        }

        let is_team_member = team_role_fields && self.is_team_member;
        let role = Some(self.role.trim())
            .filter(|r| is_team_member && !r.is_empty())
            .map(str::to_string);

        Ok(NewMember {
            full_name: self.full_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            is_team_member,
            role,
        }
        .normalized())
    }
}
