//! Signed bearer tokens.
//!
//! Tokens are compact JWS strings (`header.payload.signature`, each part
//! base64url without padding) signed with HMAC-SHA256 over a server secret.
//! The payload carries the username, an optional role and the issue and
//! expiry times in seconds since the epoch.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Role granted to operator accounts.
pub const ADMIN_ROLE: &str = "admin";

const ALGORITHM: &str = "HS256";

/// Token verification or signing failures.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(&'static str),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid signature")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("invalid signing key")]
    Key,

    #[error("failed to encode token: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Verified token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Whether the token grants `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }
}

/// Issues and verifies tokens with a shared secret.
#[derive(Debug, Clone)]
pub struct TokenSigner {
    secret: SecretString,
    ttl: TimeDelta,
}

impl TokenSigner {
    #[must_use]
    pub const fn new(secret: SecretString, ttl: TimeDelta) -> Self {
        Self { secret, ttl }
    }

    /// How long issued tokens stay valid.
    #[must_use]
    pub const fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Issue a token for `username`, valid from now for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encode` or `TokenError::Key`.
    pub fn sign(&self, username: &str, role: Option<&str>) -> Result<String, TokenError> {
        self.sign_at(username, role, Utc::now())
    }

    /// Issue a token as if the current time were `issued_at`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encode` or `TokenError::Key`.
    pub fn sign_at(
        &self,
        username: &str,
        role: Option<&str>,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            username: username.to_owned(),
            role: role.map(str::to_owned),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };
        self.encode(&claims)
    }

    /// Serialize and sign arbitrary claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encode` or `TokenError::Key`.
    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        let header = Header {
            alg: ALGORITHM.to_owned(),
            typ: "JWT".to_owned(),
        };
        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let signing_input = format!("{header}.{payload}");

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Verify signature and expiry, returning the claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Malformed`, `TokenError::UnsupportedAlgorithm`,
    /// `TokenError::BadSignature` or `TokenError::Expired`.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// See [`Self::verify`].
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed("expected three segments"));
        };

        let decoded: Header = decode_segment(header, "header")?;
        if decoded.alg != ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm(decoded.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed("signature is not base64url"))?;

        let mut mac = self.mac()?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims: Claims = decode_segment(payload, "payload")?;
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::Key)
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(
    segment: &str,
    what: &'static str,
) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed(what))?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed(what))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn signer(secret: &str) -> TokenSigner {
        TokenSigner::new(SecretString::from(secret), TimeDelta::hours(1))
    }

    #[test]
    fn test_sign_then_verify() {
        let signer = signer("k3y-for-tests-9f8a7b6c5d4e3f2a1b0c");
        let token = signer.sign("alice", None).unwrap();

        assert_eq!(token.split('.').count(), 3);
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, None);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_role_claim() {
        let signer = signer("k3y-for-tests-9f8a7b6c5d4e3f2a1b0c");
        let token = signer.sign("root", Some(ADMIN_ROLE)).unwrap();
        let claims = signer.verify(&token).unwrap();
        assert!(claims.has_role(ADMIN_ROLE));
        assert!(!claims.has_role("auditor"));
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = signer("first-secret-value-Aa1!").sign("alice", None).unwrap();
        let result = signer("second-secret-value-Bb2?").verify(&token);
        assert!(matches!(result, Err(TokenError::BadSignature)));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = signer("k3y-for-tests-9f8a7b6c5d4e3f2a1b0c");
        let token = signer.sign("alice", None).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged = Claims {
            username: "mallory".to_string(),
            role: Some(ADMIN_ROLE.to_string()),
            iat: 0,
            exp: i64::MAX,
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let forged_token = format!("{}.{forged_payload}.{}", parts[0], parts[2]);

        assert!(matches!(
            signer.verify(&forged_token),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let signer = signer("k3y-for-tests-9f8a7b6c5d4e3f2a1b0c");
        let issued = Utc::now() - TimeDelta::hours(2);
        let token = signer.sign_at("alice", None, issued).unwrap();

        assert!(matches!(signer.verify(&token), Err(TokenError::Expired)));
        assert!(
            signer
                .verify_at(&token, issued + TimeDelta::minutes(59))
                .is_ok()
        );
    }

    #[test]
    fn test_malformed_tokens() {
        let signer = signer("k3y-for-tests-9f8a7b6c5d4e3f2a1b0c");
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert!(
                matches!(signer.verify(token), Err(TokenError::Malformed(_))),
                "{token:?}"
            );
        }
    }

    #[test]
    fn test_unsigned_algorithm_rejected() {
        let signer = signer("k3y-for-tests-9f8a7b6c5d4e3f2a1b0c");
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"username":"alice","iat":0,"exp":99999999999}"#);
        let token = format!("{header}.{payload}.");

        assert!(matches!(
            signer.verify(&token),
            Err(TokenError::UnsupportedAlgorithm(_))
        ));
    }
}
