use crate::error::ApiError;
use crate::middlewares::auth::{JwtClaims, JwtService};
use crate::models::refresh_token::RefreshToken;
use crate::models::user::{LoginRequest, RegisterRequest, User, UserProfile};
use anyhow::Context;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Tokens and profile issued by a successful register/login. The refresh
/// token travels back to the client as an HTTP-only cookie, not JSON.
pub struct AuthSession {
    pub token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

pub struct AuthService {
    mongo: Database,
    jwt_service: JwtService,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
}

impl AuthService {
    pub fn new(mongo: Database, jwt_service: JwtService) -> Self {
        // Read TTL from env or use defaults
        let access_token_ttl_seconds = std::env::var("JWT_ACCESS_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(86400); // Default: 24 hours

        let refresh_token_ttl_seconds = std::env::var("JWT_REFRESH_TOKEN_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(2592000); // Default: 30 days

        Self {
            mongo,
            jwt_service,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
        }
    }

    pub fn hash_password(&self, password: &str) -> Result<String, ApiError> {
        Ok(hash(password, DEFAULT_COST).context("Failed to hash password")?)
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, ApiError> {
        Ok(verify(password, hash).context("Failed to verify password")?)
    }

    /// Register a new user. Username and email must both be unused.
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthSession, ApiError> {
        let users = self.mongo.collection::<User>("users");

        let existing = users
            .find_one(doc! { "$or": [ { "email": &req.email }, { "username": &req.username } ] })
            .await?;

        if existing.is_some() {
            return Err(ApiError::conflict("Email or username already taken"));
        }

        let password_hash = self.hash_password(&req.password)?;

        let mut user = User::new(req.username, req.email, password_hash);
        user.first_name = req.first_name;
        user.last_name = req.last_name;
        if let Some(level) = req.english_level {
            user.english_level = level;
        }
        user.age = req.age;
        user.bio = req.bio;

        let insert_result = users.insert_one(&user).await?;
        let user_id = insert_result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("Missing inserted user id")))?;

        let token = self.generate_access_token(&user_id)?;
        let refresh_token = self.create_refresh_token(&user_id).await?;

        user.id = Some(user_id);
        // A fresh account has no progress, so the derived rating is zero.
        let profile = UserProfile::from_user(user, 0);

        Ok(AuthSession {
            token,
            refresh_token,
            user: profile,
        })
    }

    /// Login with email and password. The error message never reveals whether
    /// the email or the password was wrong.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthSession, ApiError> {
        let users = self.mongo.collection::<User>("users");

        let user = users
            .find_one(doc! { "email": &req.email })
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

        if !self.verify_password(&req.password, &user.password_hash)? {
            tracing::warn!(email = %req.email, "Failed login attempt: invalid password");
            return Err(ApiError::unauthorized("Invalid email or password"));
        }

        if !user.is_active {
            return Err(ApiError::forbidden("Account is deactivated"));
        }

        let user_id = user
            .id
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("User record without id")))?;

        let token = self.generate_access_token(&user_id)?;
        let refresh_token = self.create_refresh_token(&user_id).await?;
        let rating = crate::services::user_service::derived_rating(&self.mongo, &user_id).await?;

        tracing::info!(user_id = %user_id.to_hex(), "Successful login");

        Ok(AuthSession {
            token,
            refresh_token,
            user: UserProfile::from_user(user, rating),
        })
    }

    fn generate_access_token(&self, user_id: &ObjectId) -> Result<String, ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_token_ttl_seconds);

        let claims = JwtClaims {
            sub: user_id.to_hex(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        self.jwt_service
            .generate_token(claims)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to generate token: {}", e)))
    }

    /// Create an opaque refresh token; only its SHA-256 hash is persisted.
    async fn create_refresh_token(&self, user_id: &ObjectId) -> Result<String, ApiError> {
        let token = Uuid::new_v4().to_string();
        let token_hash = hash_token(&token);

        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.refresh_token_ttl_seconds);

        let refresh_token = RefreshToken {
            id: None,
            user_id: *user_id,
            token_hash,
            created_at: now,
            expires_at,
            revoked: false,
        };

        let collection = self.mongo.collection::<RefreshToken>("refresh_tokens");
        collection.insert_one(&refresh_token).await?;

        Ok(token)
    }

    /// Mint a fresh access token from a valid refresh token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<String, ApiError> {
        let token_hash = hash_token(refresh_token);
        let collection = self.mongo.collection::<RefreshToken>("refresh_tokens");

        let token_doc = collection
            .find_one(doc! { "tokenHash": &token_hash, "revoked": false })
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired refresh token"))?;

        if token_doc.expires_at < Utc::now() {
            return Err(ApiError::unauthorized("Refresh token has expired"));
        }

        let users = self.mongo.collection::<User>("users");
        let user = users
            .find_one(doc! { "_id": token_doc.user_id })
            .await?
            .ok_or_else(|| ApiError::unauthorized("User not found"))?;

        if !user.is_active {
            return Err(ApiError::forbidden("Account is deactivated"));
        }

        self.generate_access_token(&token_doc.user_id)
    }

    /// Revoke the refresh token (logout).
    pub async fn logout(&self, refresh_token: &str) -> Result<(), ApiError> {
        let token_hash = hash_token(refresh_token);
        let collection = self.mongo.collection::<RefreshToken>("refresh_tokens");

        let result = collection
            .update_one(
                doc! { "tokenHash": &token_hash, "revoked": false },
                doc! { "$set": { "revoked": true } },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(ApiError::unauthorized(
                "Invalid or already revoked refresh token",
            ));
        }

        Ok(())
    }

    pub async fn get_user_by_id(&self, user_id: &ObjectId) -> Result<User, ApiError> {
        let users = self.mongo.collection::<User>("users");
        users
            .find_one(doc! { "_id": user_id })
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
