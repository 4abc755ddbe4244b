//! Authentication module.

use crate::db::{Database, User, now_timestamp};
use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Generate a random signing secret. Used when the config leaves the
/// secret empty, which invalidates all tokens on restart.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Signed token claims.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token was issued to.
    pub sub: String,
    /// Issued-at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

/// Authentication service.
pub struct AuthService {
    db: Database,
    secret: String,
    token_ttl_minutes: i64,
}

impl AuthService {
    /// Create a new auth service.
    pub fn new(db: Database, secret: String, token_ttl_minutes: i64) -> Self {
        Self {
            db,
            secret,
            token_ttl_minutes,
        }
    }

    /// Create a new user.
    pub fn create_user(&self, username: &str, password: &str) -> Result<User> {
        // Validate username
        if username.is_empty() || username.len() > 64 {
            return Err(AppError::Invalid(
                "Username must be 1-64 characters".to_string(),
            ));
        }

        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AppError::Invalid(
                "Username can only contain letters, numbers, _ and -".to_string(),
            ));
        }

        // Validate password
        if password.len() < 4 {
            return Err(AppError::Invalid(
                "Password must be at least 4 characters".to_string(),
            ));
        }

        let password_hash = hash_password(password)?;
        self.db.create_user(username, &password_hash)?;

        self.db
            .get_user_by_username(username)?
            .ok_or_else(|| AppError::Internal("Failed to load created user".to_string()))
    }

    /// Login and issue a signed token.
    pub fn login(&self, username: &str, password: &str) -> Result<String> {
        let user = self
            .db
            .get_user_by_username(username)?
            .ok_or_else(|| AppError::Unauthorized("Invalid username or password".to_string()))?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        }

        self.issue_token(&user.username)
    }

    /// Issue a signed token for a username.
    pub fn issue_token(&self, username: &str) -> Result<String> {
        let now = now_timestamp();
        let claims = Claims {
            sub: username.to_string(),
            iat: now,
            exp: now + self.token_ttl_minutes * 60,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Verify a token and return the username it was issued to.
    /// Returns None for bad signatures and expired tokens.
    pub fn verify_token(&self, token: &str) -> Option<String> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims.sub)
        .ok()
    }

    /// Resolve a token to the user it was issued to. Tokens issued to
    /// a user deleted since then are rejected.
    pub fn current_user(&self, token: &str) -> Result<Option<User>> {
        let Some(username) = self.verify_token(token) else {
            return Ok(None);
        };
        self.db.get_user_by_username(&username)
    }

    /// Change user password.
    pub fn change_password(&self, username: &str, new_password: &str) -> Result<bool> {
        if new_password.len() < 4 {
            return Err(AppError::Invalid(
                "Password must be at least 4 characters".to_string(),
            ));
        }

        let password_hash = hash_password(new_password)?;
        self.db.update_user_password(username, &password_hash)
    }

    /// Delete a user.
    pub fn delete_user(&self, username: &str) -> Result<bool> {
        self.db.delete_user(username)
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str, ttl_minutes: i64) -> AuthService {
        let db = Database::open_memory().unwrap();
        AuthService::new(db, secret.to_string(), ttl_minutes)
    }

    #[test]
    fn test_password_hash_and_verify() {
        let password = "test_password_123";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_token_roundtrip() {
        let auth = service("roundtrip-secret", 60);
        let token = auth.issue_token("alice").unwrap();

        assert_eq!(auth.verify_token(&token), Some("alice".to_string()));
    }

    #[test]
    fn test_token_rejected_with_wrong_secret() {
        let issuer = service("secret-one", 60);
        let other = service("secret-two", 60);

        let token = issuer.issue_token("alice").unwrap();
        assert_eq!(other.verify_token(&token), None);
    }

    #[test]
    fn test_expired_token_rejected() {
        let auth = service("expiry-secret", -5);
        let token = auth.issue_token("alice").unwrap();

        assert_eq!(auth.verify_token(&token), None);
    }
}
