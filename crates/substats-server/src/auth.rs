//! Anti-forgery nonces and the admin capability check
//!
//! A nonce is a keyed BLAKE3 hash over the session id and a 12-hour tick.
//! Nonces from the current and the previous tick verify, so a token stays
//! valid for 12 to 24 hours.

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use substats_common::{AnalyticsError, Result};

/// Length of one nonce tick in seconds
pub const NONCE_TICK_SECS: i64 = 12 * 60 * 60;

/// Header carrying the anti-forgery nonce
pub const NONCE_HEADER: &str = "x-nonce";

/// Header carrying the caller's session id
pub const SESSION_HEADER: &str = "x-session-id";

const KEY_CONTEXT: &str = "substats 2024-03 dashboard nonce";

/// Issues and verifies per-session nonces
pub struct NonceVerifier {
    key: [u8; 32],
}

impl NonceVerifier {
    /// Derive the signing key from `secret`, or pick a random one
    pub fn new(secret: Option<&str>) -> Self {
        let key = match secret {
            Some(secret) => blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
            None => rand::random(),
        };
        Self { key }
    }

    fn tick(at: DateTime<Utc>) -> i64 {
        at.timestamp().div_euclid(NONCE_TICK_SECS)
    }

    fn hash(&self, session: &str, tick: i64) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(session.as_bytes());
        hasher.update(b"|");
        hasher.update(&tick.to_le_bytes());
        hasher.finalize()
    }

    /// Nonce for `session` valid from `now`
    pub fn issue(&self, session: &str, now: DateTime<Utc>) -> String {
        self.hash(session, Self::tick(now)).to_hex().to_string()
    }

    /// Whether `nonce` was issued for `session` in this or the previous tick
    pub fn verify(&self, session: &str, nonce: &str, now: DateTime<Utc>) -> bool {
        let Ok(presented) = blake3::Hash::from_hex(nonce) else {
            return false;
        };
        let tick = Self::tick(now);
        // blake3::Hash equality is constant-time
        presented == self.hash(session, tick) || presented == self.hash(session, tick - 1)
    }

    /// Check the nonce and session headers of a request
    pub fn check(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Result<String> {
        let session = header_str(headers, SESSION_HEADER)
            .ok_or_else(|| AnalyticsError::Unauthorized("Security check failed".into()))?;
        let nonce = header_str(headers, NONCE_HEADER)
            .ok_or_else(|| AnalyticsError::Unauthorized("Security check failed".into()))?;

        if self.verify(session, nonce, now) {
            Ok(session.to_string())
        } else {
            Err(AnalyticsError::Unauthorized("Security check failed".into()))
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Require `Authorization: Bearer <token>` matching the admin token.
///
/// With no admin token configured every privileged action is refused.
pub fn check_admin(headers: &HeaderMap, admin_token: Option<&str>) -> Result<()> {
    let expected = admin_token.ok_or_else(|| AnalyticsError::Unauthorized("Unauthorized".into()))?;
    let presented = header_str(headers, header::AUTHORIZATION.as_str())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AnalyticsError::Unauthorized("Unauthorized".into()))?;

    // constant-time via digest equality
    if blake3::hash(presented.as_bytes()) == blake3::hash(expected.as_bytes()) {
        Ok(())
    } else {
        Err(AnalyticsError::Unauthorized("Unauthorized".into()))
    }
}
