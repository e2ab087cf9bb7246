//! Email access-code auth service.
//!
//! Creates and verifies short-lived six-character codes linked to an email.
//! Codes are stored as SHA-256 hashes and expire after
//! [`CODE_TTL_MINUTES`]; [`MAX_FAILED_ATTEMPTS`] misses burn a code.

use rand::Rng;
use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

use crate::store::{Account, AccountStore, StoreError};

const CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const MAX_FAILED_ATTEMPTS: u32 = 5;
pub const CODE_TTL_MINUTES: i64 = 15;
const LOGIN_CODE_TEMPLATE: &str = include_str!("../../templates/login_code.html");

#[derive(Debug, thiserror::Error)]
pub enum EmailAuthError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("invalid code")]
    InvalidCode,
    #[error("expired or incorrect code")]
    VerificationFailed,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("email delivery failed: {0}")]
    EmailDelivery(String),
}

/// Lowercased, trimmed address with exactly one `@` and no inner spaces.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let candidate = email.trim().to_ascii_lowercase();
    let (local, domain) = candidate.split_once('@')?;
    let well_formed = !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !candidate.contains(char::is_whitespace);
    well_formed.then_some(candidate)
}

/// Uppercased code, accepted only when every character is from the alphabet.
#[must_use]
pub fn normalize_code(code: &str) -> Option<String> {
    let candidate = code.trim().to_ascii_uppercase();
    let valid = candidate.len() == CODE_LEN && candidate.bytes().all(|c| CODE_ALPHABET.contains(&c));
    valid.then_some(candidate)
}

#[must_use]
pub fn generate_access_code() -> String {
    let mut rng = rand::rng();
    std::iter::repeat_with(|| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .take(CODE_LEN)
        .collect()
}

/// Codes are never stored in the clear.
#[must_use]
pub fn hash_access_code(code: &str) -> String {
    super::session::hex_encode(&Sha256::digest(code.as_bytes()))
}

/// Display name derived from the e-mail local part.
#[must_use]
pub fn name_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("user")
        .to_owned()
}

/// Ensure the account exists and issue a fresh code, invalidating any
/// earlier unconsumed one. Returns the plain code for delivery.
pub async fn request_access_code(store: &dyn AccountStore, email: &str) -> Result<String, EmailAuthError> {
    let normalized = normalize_email(email).ok_or(EmailAuthError::InvalidEmail)?;
    store
        .upsert_account(&normalized, &name_from_email(&normalized))
        .await?;

    let code = generate_access_code();
    let expires_at = OffsetDateTime::now_utc() + Duration::minutes(CODE_TTL_MINUTES);
    store
        .replace_login_code(&normalized, &hash_access_code(&code), expires_at)
        .await?;
    Ok(code)
}

pub async fn verify_access_code(store: &dyn AccountStore, email: &str, code: &str) -> Result<Account, EmailAuthError> {
    let normalized_email = normalize_email(email).ok_or(EmailAuthError::InvalidEmail)?;
    let normalized_code = normalize_code(code).ok_or(EmailAuthError::InvalidCode)?;

    let accepted = store
        .check_login_code(
            &normalized_email,
            &hash_access_code(&normalized_code),
            OffsetDateTime::now_utc(),
            MAX_FAILED_ATTEMPTS,
        )
        .await?;
    if !accepted {
        return Err(EmailAuthError::VerificationFailed);
    }

    store
        .account_by_email(&normalized_email)
        .await?
        .ok_or(EmailAuthError::VerificationFailed)
}

/// Deliver `code` to `to_email` through Resend.
pub async fn send_access_code_email(
    resend_api_key: &str,
    resend_from: &str,
    to_email: &str,
    code: &str,
) -> Result<(), EmailAuthError> {
    let html = render_login_code_template(to_email, code);
    let message = CreateEmailBaseOptions::new(resend_from, [to_email], "Your Lisan sign-in code").with_html(&html);
    Resend::new(resend_api_key)
        .emails
        .send(message)
        .await
        .map(|_| ())
        .map_err(|e| EmailAuthError::EmailDelivery(e.to_string()))
}

#[must_use]
pub fn render_login_code_template(email: &str, code: &str) -> String {
    LOGIN_CODE_TEMPLATE
        .replace("{{EMAIL}}", email)
        .replace("{{CODE}}", code)
}

#[cfg(test)]
#[path = "email_auth_test.rs"]
mod tests;
