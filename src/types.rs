use derive_more::{Display, From, Into};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Wire form of backend identifiers: integer primary keys on the server,
/// strings on the client side.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Number(i64),
}

impl From<IdRepr> for String {
    fn from(repr: IdRepr) -> Self {
        match repr {
            IdRepr::Text(s) => s,
            IdRepr::Number(n) => n.to_string(),
        }
    }
}

/// Backend user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IdRepr::deserialize(deserializer).map(|repr| Self(repr.into()))
    }
}

/// Memory item identifier, substituted into `/api/memory/items/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Display, From, Into)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IdRepr::deserialize(deserializer).map(|repr| Self(repr.into()))
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Review schedule entry identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Display, From, Into)]
#[serde(transparent)]
pub struct ReviewId(pub String);

impl<'de> Deserialize<'de> for ReviewId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        IdRepr::deserialize(deserializer).map(|repr| Self(repr.into()))
    }
}

impl From<&str> for ReviewId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Signed-in user's profile.
///
/// Owned by the session and always replaced wholesale, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    #[serde(default, alias = "full_name")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(rename = "createdAt", alias = "created_at")]
    pub created_at: String,
}

impl UserProfile {
    #[must_use]
    pub fn new(id: impl Into<String>, email: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            id: UserId(id.into()),
            email: email.into(),
            name: None,
            avatar: None,
            created_at: created_at.into(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
}

/// Token payload returned by login, registration and refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

/// Result of a call whose response is meant to start a session.
///
/// A response without a usable token is not an error: the session is cleared
/// and the body handed back as-is (registration, for one, answers with the
/// created user rather than a token).
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AuthOutcome {
    /// The session was stored.
    SignedIn(AuthResponse),
    /// The session store refused the body and is now signed out.
    NotSignedIn(JsonValue),
}

impl AuthOutcome {
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn(_))
    }

    /// The stored session, if one was started.
    #[must_use]
    pub fn session(&self) -> Option<&AuthResponse> {
        match self {
            Self::SignedIn(auth) => Some(auth),
            Self::NotSignedIn(_) => None,
        }
    }
}

/// Email + password login. Sent form-encoded with `username = email`.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Serialize)]
pub struct RegisterCredentials {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterCredentials {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for RegisterCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterCredentials")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Partial profile update. Unset fields are omitted from the request body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// A saved memory item from the user's library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct MemoryItem {
    pub id: ItemId,
    pub content: String,
    #[serde(default)]
    pub memory_aids: Vec<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Fields the backend adds that this client does not model (mastery, tags, ...).
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Body for creating or replacing a memory item.
#[derive(Debug, Clone, Serialize)]
pub struct NewMemoryItem {
    pub content: String,
    pub memory_aids: Vec<String>,
}

impl NewMemoryItem {
    #[must_use]
    pub fn new(content: impl Into<String>, memory_aids: Vec<String>) -> Self {
        Self {
            content: content.into(),
            memory_aids,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ReviewSchedule {
    pub id: ReviewId,
    pub memory_item_id: ItemId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub review_date: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// AI-generated memory aids for a piece of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct GeneratedAids {
    pub mind_map: MindMapNode,
    #[serde(default)]
    pub mnemonics: Vec<Mnemonic>,
    #[serde(default)]
    pub sensory_associations: Vec<SensoryAssociation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct MindMapNode {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MindMapNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Mnemonic {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Visual / auditory / tactile association group. Entry shape varies by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SensoryAssociation {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Vec<JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_accept_numbers_and_strings() {
        let a: ItemId = serde_json::from_value(json!(42)).unwrap();
        let b: ItemId = serde_json::from_value(json!("42")).unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_value(&a).unwrap(), json!("42"));
    }

    #[test]
    fn profile_from_backend_shape() {
        let profile: UserProfile = serde_json::from_value(json!({
            "id": 7,
            "email": "a@b.com",
            "full_name": "Ada",
            "is_active": true,
            "created_at": "2024-05-01T10:00:00"
        }))
        .unwrap();

        assert_eq!(profile.id, UserId("7".into()));
        assert_eq!(profile.name.as_deref(), Some("Ada"));
        assert_eq!(profile.avatar, None);
        assert_eq!(profile.created_at, "2024-05-01T10:00:00");
    }

    #[test]
    fn profile_serializes_client_field_names() {
        let profile = UserProfile::new("u1", "a@b.com", "2024-05-01").with_name("Ada");
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["createdAt"], "2024-05-01");
        assert_eq!(value["name"], "Ada");
        assert!(value.get("avatar").is_none());
    }

    #[test]
    fn auth_response_refresh_token_optional() {
        let auth: AuthResponse = serde_json::from_value(json!({
            "access_token": "tok1",
            "token_type": "bearer"
        }))
        .unwrap();
        assert_eq!(auth.refresh_token, None);
        assert_eq!(auth.user, None);
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = LoginCredentials::new("a@b.com", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("a@b.com"));
        assert!(!debug.contains("hunter2"));

        let creds = RegisterCredentials::new("Ada", "a@b.com", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn memory_item_keeps_unknown_fields() {
        let item: MemoryItem = serde_json::from_value(json!({
            "id": 3,
            "content": "Tang dynasty",
            "memory_aids": ["rhyme"],
            "user_id": 1,
            "created_at": "2024-05-01T10:00:00",
            "mastery": 80,
            "starred": true
        }))
        .unwrap();

        assert_eq!(item.id, ItemId::from("3"));
        assert_eq!(item.extra.get("mastery"), Some(&json!(80)));
        assert_eq!(item.extra.get("starred"), Some(&json!(true)));
    }

    #[test]
    fn generated_aids_parse() {
        let aids: GeneratedAids = serde_json::from_value(json!({
            "mindMap": {
                "id": "root",
                "label": "ML",
                "children": [{"id": "part1", "label": "Supervised"}]
            },
            "mnemonics": [
                {"id": "acronym", "title": "Acronym", "content": "SUSR", "type": "acronym", "explanation": "first letters"}
            ],
            "sensoryAssociations": [
                {"id": "visual", "title": "Visual", "type": "visual", "content": [{"image": "*"}]}
            ]
        }))
        .unwrap();

        assert_eq!(aids.mind_map.children.len(), 1);
        assert!(aids.mind_map.children[0].children.is_empty());
        assert_eq!(aids.mnemonics[0].kind, "acronym");
        assert_eq!(aids.sensory_associations[0].content.len(), 1);
    }

    #[test]
    fn profile_update_omits_unset_fields() {
        let update = ProfileUpdate {
            name: Some("Ada".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"name": "Ada"}));
    }
}
