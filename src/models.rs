use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Canonical identity record from the `users` table. This struct is internal:
/// it carries the password digest and therefore never derives Serialize —
/// API responses go through [`UserProfile`] instead.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    // The user's primary identifier. Unique at the storage layer.
    pub email: String,
    // Argon2id digest in PHC string format.
    pub hashed_password: String,
    pub full_name: Option<String>,
    // Inactive users can authenticate but are rejected by the active-user gate.
    pub is_active: bool,
    // Superusers bypass ownership checks and may administer users and tags.
    pub is_superuser: bool,
}

/// Post
///
/// A blog post row from the `posts` table. Tag and comment associations are
/// resolved separately through the repository.
#[derive(Debug, Clone, FromRow, Default)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    // FK to users.id (owner).
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    // Null until the first mutation.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Tag
///
/// A tag row from the `tags` table. Small enough to double as its own API
/// representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Tag {
    pub id: i64,
    // Unique at the storage layer.
    pub name: String,
}

/// Comment
///
/// A comment row from the `comments` table.
#[derive(Debug, Clone, FromRow, Default)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    // FK to users.id (owner).
    pub author_id: i64,
    // FK to posts.id.
    pub post_id: i64,
    pub created_at: DateTime<Utc>,
}

// --- Response Schemas (Output) ---

/// UserProfile
///
/// Public projection of a [`User`], without the password digest.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            is_active: user.is_active,
            is_superuser: user.is_superuser,
        }
    }
}

/// PostResponse
///
/// A post enriched with its author profile and resolved tag set. Comments of
/// a post are served separately via the comments listing filter.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: UserProfile,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub updated_at: Option<DateTime<Utc>>,
    pub tags: Vec<Tag>,
}

/// CommentResponse
///
/// A comment enriched with its author profile.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CommentResponse {
    pub id: i64,
    pub content: String,
    pub post_id: i64,
    pub author: UserProfile,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// TokenResponse
///
/// Output of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always "bearer".
    pub token_type: String,
}

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// OAuth2-style password login form. `username` carries the email address.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

fn default_true() -> bool {
    true
}

/// CreateUserRequest
///
/// Input payload for the superuser-only user creation endpoint. The password
/// is hashed by the repository before it ever reaches storage.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

/// UpdateUserRequest
///
/// Partial update payload for a user. Absent fields are left untouched; a
/// present password is re-hashed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_superuser: Option<bool>,
}

/// CreatePostRequest
///
/// Input payload for submitting a new post. Tag ids that do not resolve are
/// dropped silently; the association ends up with exactly the ids that exist.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<i64>>,
}

/// Distinguishes "key absent" (outer None) from "key present, possibly null"
/// (outer Some). Serde collapses both to None with a plain Option, which
/// would make it impossible to clear a post's tag set.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// UpdatePostRequest
///
/// Partial update payload for a post. `tag_ids` is tri-state:
/// - key absent: the existing tag association is left untouched;
/// - key null or `[]`: the association is cleared;
/// - key with ids: the association is replaced by the ids that resolve.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(type = "Array<number> | null")]
    pub tag_ids: Option<Option<Vec<i64>>>,
}

/// CreateTagRequest
///
/// Input payload for creating a tag.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateTagRequest {
    pub name: String,
}

/// UpdateTagRequest
///
/// Partial update payload for a tag.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateTagRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// CreateCommentRequest
///
/// Input payload for posting a comment on a post.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub content: String,
    pub post_id: i64,
}

/// UpdateCommentRequest
///
/// Partial update payload for a comment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCommentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}
