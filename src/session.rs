//! Session/auth gate.
//!
//! Holds the authentication tokens and user identity. Persisted to the
//! local store so an app restart restores the session; cleared in full on
//! logout. The user's role gates the user-management and dashboard views.

use serde::{Deserialize, Serialize};

use crate::local_store::{
    LocalStore, StoreError, KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_USER,
};

/// Role carried on the user object. Anything the backend sends that is not
/// `admin` is treated as regular staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Staff,
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(if raw.eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::Staff
        })
    }
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// The authenticated user as the backend reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
}

/// An authenticated session: tokens plus the user object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: UserAccount,
}

impl Session {
    /// Persist tokens and the serialized user to the local store.
    pub fn persist(&self, store: &mut LocalStore) -> Result<(), StoreError> {
        store.set(KEY_ACCESS_TOKEN, &self.access_token)?;
        if let Some(refresh) = &self.refresh_token {
            store.set(KEY_REFRESH_TOKEN, refresh)?;
        }
        store.set(KEY_USER, &serde_json::to_string(&self.user)?)?;
        Ok(())
    }

    /// Rebuild a session from persisted keys. Returns `None` when either
    /// the token or the user is missing or no longer parses — a damaged
    /// session is treated as logged out, never as an error.
    pub fn hydrate(store: &LocalStore) -> Option<Self> {
        let access_token = store.get(KEY_ACCESS_TOKEN)?.to_string();
        let user: UserAccount = serde_json::from_str(store.get(KEY_USER)?).ok()?;
        Some(Self {
            access_token,
            refresh_token: store.get(KEY_REFRESH_TOKEN).map(String::from),
            user,
        })
    }
}
