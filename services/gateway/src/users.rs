//! In-memory user directory with Argon2id password hashes.
//!
//! Backs registration and login. Refresh tokens are stored per user so
//! logout can revoke them; outstanding access tokens stay valid until
//! natural expiry (there is no server-side access-token denylist).

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use errors::{EntregaError, EntregaResult};

use crate::auth::Role;

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub city: Option<String>,
    pub created_at: DateTime<Utc>,
    password_hash: String,
}

/// The user shape exposed over the API (no hash).
#[derive(Debug, Clone, Serialize)]
pub struct UserPublic {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl From<&UserRecord> for UserPublic {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email.clone(),
            role: record.role,
            city: record.city.clone(),
        }
    }
}

#[derive(Default)]
pub struct UserDirectory {
    by_email: DashMap<String, Uuid>,
    by_id: DashMap<Uuid, UserRecord>,
    refresh_tokens: DashMap<Uuid, String>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        email: &str,
        password: &str,
        role: Role,
        city: Option<String>,
    ) -> EntregaResult<UserRecord> {
        let email = normalize_email(email)?;
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(EntregaError::InvalidParameter {
                param: "password".to_string(),
                reason: format!("must be at least {} characters", MIN_PASSWORD_LENGTH),
            });
        }

        let record = UserRecord {
            id: Uuid::new_v4(),
            email: email.clone(),
            role,
            city,
            created_at: Utc::now(),
            password_hash: hash_password(password)?,
        };

        // The email entry is the uniqueness gate; the id entry follows.
        match self.by_email.entry(email) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(EntregaError::AlreadyExists {
                resource: "account".to_string(),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record.id);
                self.by_id.insert(record.id, record.clone());
                Ok(record)
            },
        }
    }

    /// Verify credentials. Unknown email and wrong password fail with
    /// the same generic error.
    pub fn verify_login(&self, email: &str, password: &str) -> EntregaResult<UserRecord> {
        let invalid = || EntregaError::Unauthorized("invalid credentials".to_string());

        let email = normalize_email(email).map_err(|_| invalid())?;
        let id = self.by_email.get(&email).map(|e| *e.value()).ok_or_else(invalid)?;
        let record = self
            .by_id
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or_else(invalid)?;

        if verify_password(password, &record.password_hash)? {
            Ok(record)
        } else {
            Err(invalid())
        }
    }

    pub fn get(&self, id: Uuid) -> Option<UserRecord> {
        self.by_id.get(&id).map(|entry| entry.value().clone())
    }

    pub fn store_refresh(&self, user_id: Uuid, token: String) {
        self.refresh_tokens.insert(user_id, token);
    }

    pub fn refresh_matches(&self, user_id: Uuid, token: &str) -> bool {
        self.refresh_tokens
            .get(&user_id)
            .map(|stored| stored.as_str() == token)
            .unwrap_or(false)
    }

    pub fn revoke_refresh(&self, user_id: Uuid) {
        self.refresh_tokens.remove(&user_id);
    }
}

fn normalize_email(email: &str) -> EntregaResult<String> {
    let email = email.trim().to_ascii_lowercase();
    if email.len() < 3 || !email.contains('@') {
        return Err(EntregaError::InvalidParameter {
            param: "email".to_string(),
            reason: "not a valid email address".to_string(),
        });
    }
    Ok(email)
}

fn hash_password(password: &str) -> EntregaResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| EntregaError::Internal(format!("password hash: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> EntregaResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| EntregaError::Internal(format!("stored hash malformed: {}", e)))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(EntregaError::Internal(format!("password verify: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_login_roundtrip() {
        let directory = UserDirectory::new();
        let record = directory
            .register("Ana@Example.com", "correcthorse", Role::Client, None)
            .unwrap();
        assert_eq!(record.email, "ana@example.com");

        let logged_in = directory
            .verify_login("ana@example.com", "correcthorse")
            .unwrap();
        assert_eq!(logged_in.id, record.id);
    }

    #[test]
    fn wrong_password_and_unknown_email_fail_identically() {
        let directory = UserDirectory::new();
        directory
            .register("ana@example.com", "correcthorse", Role::Client, None)
            .unwrap();

        let wrong_pw = directory
            .verify_login("ana@example.com", "batterystaple")
            .unwrap_err();
        let unknown = directory
            .verify_login("nadie@example.com", "correcthorse")
            .unwrap_err();
        assert_eq!(wrong_pw.to_string(), unknown.to_string());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let directory = UserDirectory::new();
        directory
            .register("ana@example.com", "correcthorse", Role::Client, None)
            .unwrap();
        assert!(matches!(
            directory.register("ANA@example.com", "otherpassword", Role::Merchant, None),
            Err(EntregaError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn short_passwords_are_rejected() {
        let directory = UserDirectory::new();
        assert!(matches!(
            directory.register("ana@example.com", "corto", Role::Client, None),
            Err(EntregaError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn refresh_token_lifecycle() {
        let directory = UserDirectory::new();
        let user_id = Uuid::new_v4();

        assert!(!directory.refresh_matches(user_id, "tok"));
        directory.store_refresh(user_id, "tok".into());
        assert!(directory.refresh_matches(user_id, "tok"));
        assert!(!directory.refresh_matches(user_id, "other"));

        directory.revoke_refresh(user_id);
        assert!(!directory.refresh_matches(user_id, "tok"));
    }
}
