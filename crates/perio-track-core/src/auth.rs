//! Staff authentication.
//!
//! Passwords are stored as salted argon2id PHC strings and never leave this
//! module in clear text.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use thiserror::Error;

use crate::db::{DbError, UserStore};
use crate::models::User;

/// Authentication errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Name and password are required")]
    MissingFields,

    #[error("Name is already registered: {0}")]
    NameTaken(String),

    #[error("Name or password is incorrect")]
    InvalidCredentials,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Check a password against a stored PHC string.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Create an account. Names are unique.
pub fn sign_up<S: UserStore + ?Sized>(store: &S, name: &str, password: &str) -> AuthResult<User> {
    let name = name.trim();
    if name.is_empty() || password.is_empty() {
        return Err(AuthError::MissingFields);
    }
    if store.find_user(name)?.is_some() {
        return Err(AuthError::NameTaken(name.to_string()));
    }

    let user = User {
        name: name.to_string(),
        password_hash: hash_password(password)?,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    match store.insert_user(&user) {
        Ok(()) => Ok(user),
        Err(DbError::Constraint(_)) => Err(AuthError::NameTaken(user.name)),
        Err(e) => Err(e.into()),
    }
}

/// Verify credentials. Unknown names and wrong passwords look the same.
pub fn log_in<S: UserStore + ?Sized>(store: &S, name: &str, password: &str) -> AuthResult<User> {
    let name = name.trim();
    if name.is_empty() || password.is_empty() {
        return Err(AuthError::MissingFields);
    }

    match store.find_user(name)? {
        Some(user) if verify_password(password, &user.password_hash) => Ok(user),
        _ => Err(AuthError::InvalidCredentials),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_hash_is_salted() {
        let a = hash_password("secret").unwrap();
        let b = hash_password("secret").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));
        assert!(!a.contains("secret"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("secret").unwrap();
        assert!(verify_password("secret", &hash));
        assert!(!verify_password("Secret", &hash));
        assert!(!verify_password("secret", "not-a-phc-string"));
    }

    #[test]
    fn test_sign_up_then_log_in() {
        let db = Database::open_in_memory().unwrap();
        let user = sign_up(&db, "Sato", "pw-1234").unwrap();
        assert_eq!(user.name, "Sato");

        let logged_in = log_in(&db, "Sato", "pw-1234").unwrap();
        assert_eq!(logged_in.name, "Sato");
    }

    #[test]
    fn test_duplicate_sign_up_rejected() {
        let db = Database::open_in_memory().unwrap();
        sign_up(&db, "Sato", "pw-1234").unwrap();

        let err = sign_up(&db, "Sato", "other").unwrap_err();
        assert!(matches!(err, AuthError::NameTaken(_)));
    }

    #[test]
    fn test_wrong_password_and_unknown_user_look_alike() {
        let db = Database::open_in_memory().unwrap();
        sign_up(&db, "Sato", "pw-1234").unwrap();

        let wrong = log_in(&db, "Sato", "nope").unwrap_err();
        let unknown = log_in(&db, "Suzuki", "pw-1234").unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[test]
    fn test_missing_fields() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(sign_up(&db, " ", "pw").unwrap_err(), AuthError::MissingFields));
        assert!(matches!(log_in(&db, "Sato", "").unwrap_err(), AuthError::MissingFields));
    }
}
