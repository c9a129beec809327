use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role name the identity service gives administrators.
pub const ADMIN_ROLE: &str = "ADMIN";

/// Last-known profile snapshot of the signed-in user.
///
/// `email` is the identity checked against the token subject. Fields the
/// application caches beyond the known ones are kept in `extra` so that a
/// round trip through the store never drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct StoredUser {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(flatten)]
    #[cfg_attr(feature = "ts", ts(skip))]
    pub extra: Map<String, Value>,
}

impl StoredUser {
    pub fn new(email: impl Into<String>, role: Option<String>) -> Self {
        Self {
            email: email.into(),
            role,
            nickname: None,
            extra: Map::new(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }

    /// Lower-cased email, the form used for identity comparisons.
    pub fn identity(&self) -> String {
        self.email.to_lowercase()
    }

    /// Shallow merge: every key in `patch` replaces the same key here.
    pub fn merged(&self, patch: &UserPatch) -> Result<StoredUser, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(ref mut fields) = value {
            for (key, field) in &patch.0 {
                fields.insert(key.clone(), field.clone());
            }
        }
        serde_json::from_value(value)
    }
}

/// A partial user record for `update_user`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserPatch(Map<String, Value>);

impl UserPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nickname(self, nickname: impl Into<String>) -> Self {
        self.field("nickname", Value::String(nickname.into()))
    }

    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Body returned by the credential-issuing endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginGrant {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Profile as served by `/api/profile/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Option<i64>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    #[serde(rename = "profileImage")]
    pub profile_image: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    #[serde(rename = "followerCount", default)]
    pub follower_count: i64,
    #[serde(rename = "followingCount", default)]
    pub following_count: i64,
}

/// Fields accepted by `PUT /api/profile`. Unset fields are not sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(rename = "realName", skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(rename = "profileImage", skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

impl ProfileUpdate {
    /// The part of this update that belongs in the cached user record.
    pub fn user_patch(&self) -> UserPatch {
        let mut patch = UserPatch::new();
        if let Some(ref nickname) = self.nickname {
            patch = patch.nickname(nickname.clone());
        }
        patch
    }
}
