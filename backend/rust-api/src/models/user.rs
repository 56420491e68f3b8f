use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Starting coin balance for every new account.
pub const STARTING_COINS: i64 = 100;

/// User document stored in the MongoDB "users" collection.
///
/// `rating` is deliberately absent: it is derived from progress records at
/// read time instead of being persisted on profile fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default = "default_english_level")]
    pub english_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default = "default_coins")]
    pub coins: i64,
    #[serde(default)]
    pub friends: Vec<ObjectId>,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub is_teacher: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(with = "super::bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

fn default_english_level() -> String {
    "beginner".to_string()
}

fn default_coins() -> i64 {
    STARTING_COINS
}

fn default_true() -> bool {
    true
}

impl User {
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        User {
            id: None,
            username,
            email,
            password_hash,
            first_name: None,
            last_name: None,
            avatar: None,
            english_level: default_english_level(),
            age: None,
            bio: None,
            coins: STARTING_COINS,
            friends: Vec::new(),
            is_premium: false,
            is_teacher: false,
            is_admin: false,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// Profile returned to clients (no password hash, rating computed on read).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub english_level: String,
    pub age: Option<u32>,
    pub bio: Option<String>,
    pub coins: i64,
    pub rating: i64,
    pub is_premium: bool,
    pub is_teacher: bool,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn from_user(user: User, rating: i64) -> Self {
        UserProfile {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            avatar: user.avatar,
            english_level: user.english_level,
            age: user.age,
            bio: user.bio,
            coins: user.coins,
            rating,
            is_premium: user.is_premium,
            is_teacher: user.is_teacher,
            is_admin: user.is_admin,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// Compact representation used by search results, friend lists and rosters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub english_level: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        UserSummary {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            first_name: user.first_name,
            last_name: user.last_name,
            avatar: user.avatar,
            english_level: user.english_level,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(
        min = 3,
        max = 30,
        message = "Username must be between 3 and 30 characters"
    ))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    #[serde(rename = "englishLevel")]
    pub english_level: Option<String>,
    pub age: Option<u32>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Response after successful login or registration (refresh token travels in
/// an HTTP-only cookie).
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: UserProfile,
}

/// Profile fields a user may edit about themselves. The avatar arrives as a
/// multipart file, not part of this payload.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub english_level: Option<String>,
    #[validate(range(min = 5, max = 120, message = "Age out of range"))]
    pub age: Option<u32>,
    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: Option<String>,
}

/// Admin-side edits: direct field overwrites including role flags and coins.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub english_level: Option<String>,
    pub age: Option<u32>,
    pub bio: Option<String>,
    #[validate(range(min = 0, message = "Coins cannot be negative"))]
    pub coins: Option<i64>,
    pub is_premium: Option<bool>,
    pub is_teacher: Option<bool>,
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AddFriendRequest {
    #[serde(rename = "friendId")]
    pub friend_id: String,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub rating: i64,
    pub rank: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_starts_with_default_balance_and_flags() {
        let user = User::new(
            "alice".to_string(),
            "alice@example.com".to_string(),
            "$2b$12$hash".to_string(),
        );
        assert_eq!(user.coins, STARTING_COINS);
        assert!(user.is_active);
        assert!(!user.is_premium);
        assert!(!user.is_teacher);
        assert!(!user.is_admin);
        assert_eq!(user.english_level, "beginner");
    }

    #[test]
    fn user_document_defaults_apply_on_deserialize() {
        // Minimal document, as an externally seeded record might look
        let doc = mongodb::bson::doc! {
            "username": "bob",
            "email": "bob@example.com",
            "passwordHash": "$2b$12$hash",
            "createdAt": mongodb::bson::DateTime::now(),
        };
        let user: User = mongodb::bson::from_document(doc).unwrap();
        assert_eq!(user.coins, STARTING_COINS);
        assert!(user.is_active);
        assert!(user.friends.is_empty());
    }

    #[test]
    fn profile_omits_password_hash() {
        let user = User::new(
            "carol".to_string(),
            "carol@example.com".to_string(),
            "$2b$12$hash".to_string(),
        );
        let profile = UserProfile::from_user(user, 42);
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["rating"], 42);
    }
}
