//! User domain types.

use std::collections::BTreeSet;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use food_client_core::{Email, Role, UserId};

/// Profile of the signed-in user.
///
/// This is what gets persisted under the `user` storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    pub email: Option<Email>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub roles: BTreeSet<Role>,
}

impl UserProfile {
    /// Whether the user holds `role`.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Partial profile update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(rename = "name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.email.is_none() && self.phone.is_none()
    }

    /// Merge this update into `profile`.
    pub fn apply_to(&self, profile: &mut UserProfile) {
        if let Some(name) = &self.display_name {
            profile.display_name.clone_from(name);
        }
        if let Some(email) = &self.email {
            profile.email = Some(email.clone());
        }
        if let Some(phone) = &self.phone {
            profile.phone = Some(phone.clone());
        }
    }
}

/// Email and password for login.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: Email,
    pub password: SecretString,
}

/// New-account details for signup.
#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub name: String,
    pub email: Email,
    pub password: SecretString,
    pub phone: Option<String>,
    pub role: Role,
}
