use crate::config::Config;
use anyhow::{Context, Result};
use bcrypt::{hash, DEFAULT_COST};
use mongodb::{
    bson::{doc, Document},
    Database,
};

/// Idempotent bootstrap of the default admin account. Runs at startup; the
/// `$setOnInsert` upsert makes restarts and concurrent instances safe.
pub async fn bootstrap(config: &Config, mongo: &Database) -> Result<()> {
    let email = config.admin_email.as_str();

    let password_hash =
        hash(&config.admin_password, DEFAULT_COST).context("Failed to hash admin password")?;

    let admin_doc = doc! {
        "username": "admin",
        "passwordHash": password_hash,
        "firstName": "System",
        "lastName": "Administrator",
        "englishLevel": "advanced",
        "coins": 10000_i64,
        "friends": [],
        "isPremium": true,
        "isTeacher": true,
        "isAdmin": true,
        "isActive": true,
        "createdAt": mongodb::bson::DateTime::now(),
    };

    let collection = mongo.collection::<Document>("users");

    let update = collection
        .update_one(doc! { "email": email }, doc! { "$setOnInsert": admin_doc })
        .upsert(true)
        .await
        .context("Failed to bootstrap admin account")?;

    if update.upserted_id.is_some() {
        tracing::info!("Bootstrap admin account created for {}", email);
    } else {
        tracing::debug!("Bootstrap admin account already exists");
    }

    Ok(())
}
