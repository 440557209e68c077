use anyhow::{Context, Result};
use bcrypt::{hash, DEFAULT_COST};
use chrono::Utc;
use mongodb::{bson::doc, Database};

use crate::config::SeedConfig;
use crate::models::new_id;
use crate::models::user::{Role, User};

/// Creates the configured admin account once; existing usernames are left alone
pub async fn bootstrap(seed: &SeedConfig, mongo: &Database) -> Result<()> {
    let (username, password) = match (&seed.admin_username, &seed.admin_password) {
        (Some(username), Some(password)) => (username, password),
        (Some(_), None) | (None, Some(_)) => {
            tracing::warn!("Admin seed needs both username and password, skipping bootstrap");
            return Ok(());
        }
        (None, None) => {
            tracing::debug!("No admin seed configured, skipping bootstrap");
            return Ok(());
        }
    };

    let users = mongo.collection::<User>("users");
    if users
        .find_one(doc! { "username": username })
        .await
        .context("Failed to look up seed admin")?
        .is_some()
    {
        tracing::info!(username = %username, "Admin already exists, seed skipped");
        return Ok(());
    }

    let now = Utc::now();
    let admin = User {
        id: new_id(),
        username: username.clone(),
        password_hash: hash(password, DEFAULT_COST).context("Failed to hash admin password")?,
        first_name: "Kambaz".to_string(),
        last_name: "Admin".to_string(),
        email: None,
        dob: None,
        role: Role::Admin,
        section: None,
        last_activity: None,
        total_activity: None,
        created_at: now,
        updated_at: now,
        last_login_at: None,
    };

    users
        .insert_one(&admin)
        .await
        .context("Failed to insert seed admin")?;

    tracing::info!(username = %username, "Seed admin created");
    Ok(())
}
