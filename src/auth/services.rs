use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::dto::{RegisterRequest, UpdateUserRequest};
use super::repo::User;
use super::tokens;
use crate::articles;
use crate::error::{ApiError, FieldError};
use crate::state::AppState;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

pub const PASSWORD_SPECIAL_CHARS: &[char] = &['#', '@', '.', '/', '+', '-'];

fn email_message(email: &str) -> Option<String> {
    if email.is_empty() {
        return Some("This email is required.".into());
    }
    if !is_valid_email(email) {
        return Some("This email is not a valid email.".into());
    }
    None
}

fn password_message(password: &str) -> Option<String> {
    if password.is_empty() {
        return Some("This password is required.".into());
    }
    let length = password.chars().count();
    if length < 12 {
        return Some("The password must be at least 12 characters long.".into());
    }
    if length > 255 {
        return Some("The password cannot be longer than 255 characters.".into());
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(&c));
    if !(has_lower && has_upper && has_digit && has_special) {
        return Some(
            "The password must contain at least one lowercase letter, one uppercase letter, \
             one digit and one special character (#@./+-)."
                .into(),
        );
    }
    None
}

fn name_message(value: &str, label: &str) -> Option<String> {
    if value.trim().is_empty() {
        return Some(format!("This {label} is required."));
    }
    if value.chars().count() > 255 {
        return Some(format!("The {label} cannot be longer than 255 characters."));
    }
    None
}

pub fn validate_registration(req: &RegisterRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if let Some(m) = email_message(&req.email) {
        errors.push(FieldError::new("email", m));
    }
    if let Some(m) = password_message(&req.password) {
        errors.push(FieldError::new("password", m));
    }
    if let Some(m) = name_message(&req.firstname, "firstname") {
        errors.push(FieldError::new("firstname", m));
    }
    if let Some(m) = name_message(&req.lastname, "lastname") {
        errors.push(FieldError::new("lastname", m));
    }
    errors
}

pub fn activation_email(base_url: &str, firstname: &str, raw_token: &str) -> (String, String) {
    let link = format!("{base_url}/api/auth/confirm-email/{firstname}_{raw_token}");
    let html = format!(
        "<p>Hello {firstname},</p>\
         <p>Thanks for signing up at the boutique!</p>\
         <p>Please click the link below to verify your email address:</p>\
         <p><a href='{link}'>Activate my account</a></p>\
         <p>See you soon at the boutique!</p>"
    );
    ("Verify your email address".to_string(), html)
}

pub fn confirmation_email(firstname: &str) -> (String, String) {
    let html = format!(
        "<p>Hello {firstname},</p>\
         <p>Your account is now active!</p>\
         <p>See you soon at the boutique!</p>"
    );
    ("Your account has been activated!".to_string(), html)
}

/// Register a new inactive account. The user row and its activation token
/// commit together; the activation email goes out after the commit.
pub async fn register(state: &AppState, mut req: RegisterRequest) -> Result<(), ApiError> {
    req.email = req.email.trim().to_lowercase();

    let errors = validate_registration(&req);
    if !errors.is_empty() {
        warn!(email = %req.email, "registration validation failed");
        return Err(ApiError::Validation(errors));
    }

    if User::find_by_email(&state.db, &req.email).await?.is_some() {
        warn!(email = %req.email, "email already registered");
        return Err(ApiError::conflict("Account already exists."));
    }

    let password_hash = hash_password(&req.password)?;
    let raw_token = tokens::generate_token();
    let token_hash = tokens::hash_token(&raw_token);
    let now = OffsetDateTime::now_utc();

    let mut tx = state.db.begin().await.context("begin tx")?;
    let user = User::insert_tx(
        &mut tx,
        &req.email,
        &password_hash,
        &req.firstname,
        &req.lastname,
    )
    .await?;
    tokens::insert_tx(&mut tx, user.id, &token_hash, tokens::expiry_from(now)).await?;
    tx.commit().await.context("commit tx")?;

    info!(user_id = %user.id, email = %user.email, "user registered");

    let (subject, html) = activation_email(&state.config.base_url, &user.firstname, &raw_token);
    if let Err(e) = state.mailer.send(&user.email, &subject, &html).await {
        // the account stays pending; a failed notification is not a rollback
        warn!(error = %e, user_id = %user.id, "activation email failed");
    }
    Ok(())
}

/// Consume an activation token and flip the account to active. The token
/// hash is the sole lookup key; the firstname from the link is checked
/// against the user it references. Single-use: the row is deleted in the
/// same transaction, so repeating the call yields NotFound.
pub async fn confirm(state: &AppState, confirmation_id: &str) -> Result<(), ApiError> {
    let not_found = || ApiError::not_found("No matching account or token.");

    let (firstname, raw_token) =
        tokens::split_confirmation_id(confirmation_id).ok_or_else(not_found)?;
    let token_hash = tokens::hash_token(&raw_token);
    let now = OffsetDateTime::now_utc();

    let mut tx = state.db.begin().await.context("begin tx")?;
    let Some(user_id) = tokens::consume_tx(&mut tx, &token_hash, now).await? else {
        return Err(not_found());
    };
    let Some(user) = User::activate_tx(&mut tx, user_id, firstname).await? else {
        // firstname mismatch; dropping the tx keeps the token row intact
        return Err(not_found());
    };
    tx.commit().await.context("commit tx")?;

    info!(user_id = %user.id, "account activated");

    let (subject, html) = confirmation_email(&user.firstname);
    if let Err(e) = state.mailer.send(&user.email, &subject, &html).await {
        warn!(error = %e, user_id = %user.id, "confirmation email failed");
    }
    Ok(())
}

/// Self-service partial update. Provided fields are validated with the same
/// rules as registration; a new password is re-hashed.
pub async fn update_account(
    state: &AppState,
    user_id: Uuid,
    mut req: UpdateUserRequest,
) -> Result<(), ApiError> {
    let mut errors = Vec::new();

    if let Some(email) = req.email.as_mut() {
        *email = email.trim().to_lowercase();
        if let Some(m) = email_message(email) {
            errors.push(FieldError::new("email", m));
        }
    }
    if let Some(password) = req.password.as_deref() {
        if let Some(m) = password_message(password) {
            errors.push(FieldError::new("password", m));
        }
    }
    if let Some(firstname) = req.firstname.as_deref() {
        if let Some(m) = name_message(firstname, "firstname") {
            errors.push(FieldError::new("firstname", m));
        }
    }
    if let Some(lastname) = req.lastname.as_deref() {
        if let Some(m) = name_message(lastname, "lastname") {
            errors.push(FieldError::new("lastname", m));
        }
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    if let Some(email) = req.email.as_deref() {
        if let Some(existing) = User::find_by_email(&state.db, email).await? {
            if existing.id != user_id {
                return Err(ApiError::conflict("Account already exists."));
            }
        }
    }

    let password_hash = match req.password.as_deref() {
        Some(p) => Some(hash_password(p)?),
        None => None,
    };

    User::update_partial(
        &state.db,
        user_id,
        req.email.as_deref(),
        req.firstname.as_deref(),
        req.lastname.as_deref(),
        password_hash.as_deref(),
    )
    .await?;

    info!(user_id = %user_id, "account updated");
    Ok(())
}

/// Remove the account. Owned rows cascade in the database; stored article
/// thumbnails do not, so they are cleaned up first (best effort).
pub async fn delete_account(state: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    let thumbnails = articles::repo::list_thumbnails_by_user(&state.db, user_id).await?;
    for key in thumbnails {
        if let Err(e) = state.storage.delete_object(&key).await {
            warn!(error = %e, key = %key, "thumbnail cleanup failed");
        }
    }

    User::delete(&state.db, user_id).await?;
    info!(user_id = %user_id, "account deleted");
    Ok(())
}

#[cfg(test)]
mod password_tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    fn valid_request() -> RegisterRequest {
        RegisterRequest {
            email: "a@b.com".into(),
            password: "Abcdef123456#".into(),
            firstname: "Jo".into(),
            lastname: "Do".into(),
        }
    }

    #[test]
    fn accepts_valid_registration() {
        assert!(validate_registration(&valid_request()).is_empty());
    }

    #[test]
    fn rejects_password_without_digit() {
        let mut req = valid_request();
        req.password = "Abcdefghijkl#".into();
        let errors = validate_registration(&req);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "password");
    }

    #[test]
    fn rejects_password_without_uppercase() {
        let mut req = valid_request();
        req.password = "abcdef123456#".into();
        assert_eq!(validate_registration(&req)[0].field, "password");
    }

    #[test]
    fn rejects_password_without_special_char() {
        let mut req = valid_request();
        req.password = "Abcdef1234567".into();
        assert_eq!(validate_registration(&req)[0].field, "password");
    }

    #[test]
    fn rejects_password_shorter_than_twelve_chars() {
        let mut req = valid_request();
        req.password = "Abc123#".into();
        let errors = validate_registration(&req);
        assert!(errors[0].message.contains("at least 12 characters"));
    }

    #[test]
    fn rejects_invalid_email() {
        let mut req = valid_request();
        req.email = "not-an-email".into();
        assert_eq!(validate_registration(&req)[0].field, "email");
    }

    #[test]
    fn empty_request_reports_every_field() {
        let req = RegisterRequest {
            email: String::new(),
            password: String::new(),
            firstname: String::new(),
            lastname: String::new(),
        };
        let errors = validate_registration(&req);
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["email", "password", "firstname", "lastname"]);
    }

    #[test]
    fn rejects_overlong_firstname() {
        let mut req = valid_request();
        req.firstname = "x".repeat(256);
        let errors = validate_registration(&req);
        assert_eq!(errors[0].field, "firstname");
        assert!(errors[0].message.contains("longer than 255"));
    }
}
