use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// -- Session token --

/// Claims carried by the session token. The subject is the only field the
/// server trusts; the username is informational and may be stale after a
/// rename until the token is re-issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Users --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    /// `YYYY-MM-DD`
    pub birthday: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub date_joined: String,
    pub birthday: String,
    pub underage: bool,
    pub upvoted_freets: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub message: String,
    pub user: UserResponse,
    /// Present when the response also starts a session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub message: String,
    pub user: Option<UserResponse>,
}

// -- Freets --

/// Body of `POST /freets`. Every field besides `content` is a self-flag.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateFreetRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub flags: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreetResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub author: String,
    pub date_created: String,
    pub date_modified: String,
    pub content: String,
    pub self_flagged: bool,
    pub flags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FreetEnvelope {
    pub message: String,
    pub freet: FreetResponse,
}

// -- Upvotes --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpvoteResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub author: String,
    pub freet: String,
    pub date_created: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpvoteEnvelope {
    pub message: String,
    pub upvote: UpvoteResponse,
}

// -- Shared --

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
