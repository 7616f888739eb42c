use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::constants::limits::API_KEY_BYTES;
use crate::domain::{Identity, IdentityMetadata};
use crate::entities::{accounts, auth_sessions, prelude::*};
use crate::models::timestamp_now;

/// Account data returned from the repository (without the password hash)
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email_confirmed: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Account {
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            email: self.email.clone(),
            metadata: IdentityMetadata {
                full_name: self.full_name.clone(),
                avatar_url: self.avatar_url.clone(),
            },
        }
    }
}

impl From<accounts::Model> for Account {
    fn from(model: accounts::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            full_name: model.full_name,
            avatar_url: model.avatar_url,
            email_confirmed: model.email_confirmed,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// A stored bearer token together with its owner.
#[derive(Debug, Clone)]
pub struct AuthSessionRow {
    pub token: String,
    pub account: Account,
    pub expires_at: DateTime<Utc>,
}

pub struct NewAccount<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub full_name: Option<&'a str>,
    pub email_confirmed: bool,
}

pub struct AccountRepository {
    conn: DatabaseConnection,
}

impl AccountRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        let account = Accounts::find()
            .filter(accounts::Column::Email.eq(normalize_email(email)))
            .one(&self.conn)
            .await
            .context("Failed to query account by email")?;

        Ok(account.map(Account::from))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Account>> {
        let account = Accounts::find_by_id(id.to_string())
            .one(&self.conn)
            .await
            .context("Failed to query account by ID")?;

        Ok(account.map(Account::from))
    }

    /// Hashing runs on the blocking pool; Argon2 would stall the runtime.
    pub async fn create(&self, new: NewAccount<'_>, config: &SecurityConfig) -> Result<Account> {
        let password = new.password.to_string();
        let config = config.clone();
        let password_hash = task::spawn_blocking(move || hash_password(&password, Some(&config)))
            .await
            .context("Password hashing task panicked")??;

        let now = timestamp_now();
        let model = accounts::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            email: Set(normalize_email(new.email)),
            password_hash: Set(password_hash),
            full_name: Set(new.full_name.map(str::to_string)),
            avatar_url: Set(None),
            email_confirmed: Set(new.email_confirmed),
            recovery_sent_at: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        let inserted = model
            .insert(&self.conn)
            .await
            .context("Failed to insert account")?;

        Ok(Account::from(inserted))
    }

    /// Returns the account when the password matches, `None` otherwise.
    pub async fn verify_password(&self, email: &str, password: &str) -> Result<Option<Account>> {
        let account = Accounts::find()
            .filter(accounts::Column::Email.eq(normalize_email(email)))
            .one(&self.conn)
            .await
            .context("Failed to query account for password verification")?;

        let Some(account) = account else {
            return Ok(None);
        };

        let password_hash = account.password_hash.clone();
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            Ok::<bool, anyhow::Error>(
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        Ok(is_valid.then(|| Account::from(account)))
    }

    pub async fn confirm_email(&self, email: &str) -> Result<bool> {
        let Some(account) = Accounts::find()
            .filter(accounts::Column::Email.eq(normalize_email(email)))
            .one(&self.conn)
            .await
            .context("Failed to query account for confirmation")?
        else {
            return Ok(false);
        };

        let mut active: accounts::ActiveModel = account.into();
        active.email_confirmed = Set(true);
        active.updated_at = Set(timestamp_now());
        active.update(&self.conn).await?;

        Ok(true)
    }

    pub async fn mark_recovery_sent(&self, email: &str) -> Result<bool> {
        let Some(account) = Accounts::find()
            .filter(accounts::Column::Email.eq(normalize_email(email)))
            .one(&self.conn)
            .await
            .context("Failed to query account for recovery")?
        else {
            return Ok(false);
        };

        let now = timestamp_now();
        let mut active: accounts::ActiveModel = account.into();
        active.recovery_sent_at = Set(Some(now.clone()));
        active.updated_at = Set(now);
        active.update(&self.conn).await?;

        Ok(true)
    }

    pub async fn create_session(&self, account_id: &str, ttl: Duration) -> Result<(String, DateTime<Utc>)> {
        let token = generate_token();
        let expires_at = Utc::now() + ttl;

        let model = auth_sessions::ActiveModel {
            token: Set(token.clone()),
            account_id: Set(account_id.to_string()),
            expires_at: Set(expires_at.to_rfc3339()),
            created_at: Set(timestamp_now()),
        };

        AuthSessions::insert(model)
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to insert auth session")?;

        Ok((token, expires_at))
    }

    pub async fn get_session(&self, token: &str) -> Result<Option<AuthSessionRow>> {
        let row = AuthSessions::find_by_id(token.to_string())
            .find_also_related(Accounts)
            .one(&self.conn)
            .await
            .context("Failed to query auth session")?;

        let Some((session, Some(account))) = row else {
            return Ok(None);
        };

        let expires_at = DateTime::parse_from_rfc3339(&session.expires_at)
            .with_context(|| format!("Invalid session expiry: {}", session.expires_at))?
            .with_timezone(&Utc);

        Ok(Some(AuthSessionRow {
            token: session.token,
            account: Account::from(account),
            expires_at,
        }))
    }

    pub async fn delete_session(&self, token: &str) -> Result<bool> {
        let res = AuthSessions::delete_by_id(token.to_string())
            .exec(&self.conn)
            .await
            .context("Failed to delete auth session")?;

        Ok(res.rows_affected > 0)
    }
}

#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hash a password using Argon2id with optional custom params.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Generate a random session token (64 character hex string)
#[must_use]
pub fn generate_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; API_KEY_BYTES] = rng.random();

    bytes.iter().fold(String::with_capacity(API_KEY_BYTES * 2), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_hex_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn hashed_password_verifies() {
        let config = SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        };
        let hash = hash_password("hunter22", Some(&config)).unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"hunter22", &parsed)
                .is_ok()
        );
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  A@X.com "), "a@x.com");
    }
}
