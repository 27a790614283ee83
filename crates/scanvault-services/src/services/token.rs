//! Signed download tokens
//!
//! A token is `base64url(purpose || expiry || file_id || mac)` where the MAC is
//! HMAC-SHA256 over everything before it. Tokens are stateless: anything that
//! verifies names exactly one file and is valid until its expiry second.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use scanvault_core::AppError;
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const PURPOSE_DOWNLOAD: u8 = 0x01;
const PAYLOAD_LEN: usize = 1 + 8 + 16;
const MAC_LEN: usize = 32;
const TOKEN_LEN: usize = PAYLOAD_LEN + MAC_LEN;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Malformed download token")]
    Malformed,

    #[error("Download token signature mismatch")]
    BadSignature,

    #[error("Download token expired")]
    Expired,

    #[error("Token was not issued for downloads")]
    WrongPurpose,

    #[error("Invalid signing secret: {0}")]
    InvalidSecret(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidSecret(msg) => AppError::Internal(msg),
            other => AppError::TokenInvalid(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct DownloadTokenService {
    mac: HmacSha256,
}

impl std::fmt::Debug for DownloadTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadTokenService").finish_non_exhaustive()
    }
}

impl DownloadTokenService {
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::InvalidSecret("secret is empty".to_string()));
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| TokenError::InvalidSecret(e.to_string()))?;
        Ok(Self { mac })
    }

    /// Issue a token for `file_id` valid for `ttl` from now.
    pub fn issue(&self, file_id: Uuid, ttl: Duration) -> Result<IssuedToken, TokenError> {
        let now = Utc::now().timestamp().max(0) as u64;
        self.issue_at(file_id, now.saturating_add(ttl.as_secs()))
    }

    /// Issue a token expiring at `expires_at` (unix seconds).
    pub fn issue_at(&self, file_id: Uuid, expires_at: u64) -> Result<IssuedToken, TokenError> {
        let mut bytes = Vec::with_capacity(TOKEN_LEN);
        bytes.push(PURPOSE_DOWNLOAD);
        bytes.extend_from_slice(&expires_at.to_be_bytes());
        bytes.extend_from_slice(file_id.as_bytes());

        let mut mac = self.mac.clone();
        mac.update(&bytes);
        bytes.extend_from_slice(&mac.finalize().into_bytes());

        let expires_at = i64::try_from(expires_at)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .ok_or(TokenError::Malformed)?;

        Ok(IssuedToken {
            token: URL_SAFE_NO_PAD.encode(bytes),
            expires_at,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        self.verify_at(token, Utc::now().timestamp().max(0) as u64)
    }

    /// Verify `token` as of `now` (unix seconds) and return the file it names.
    ///
    /// The signature is checked before any field is trusted.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<Uuid, TokenError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| TokenError::Malformed)?;
        if bytes.len() != TOKEN_LEN {
            return Err(TokenError::Malformed);
        }

        let (payload, tag) = bytes.split_at(PAYLOAD_LEN);
        let mut mac = self.mac.clone();
        mac.update(payload);
        mac.verify_slice(tag).map_err(|_| TokenError::BadSignature)?;

        if payload[0] != PURPOSE_DOWNLOAD {
            return Err(TokenError::WrongPurpose);
        }

        let mut expiry = [0u8; 8];
        expiry.copy_from_slice(&payload[1..9]);
        if now > u64::from_be_bytes(expiry) {
            return Err(TokenError::Expired);
        }

        Uuid::from_slice(&payload[9..]).map_err(|_| TokenError::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn service() -> DownloadTokenService {
        DownloadTokenService::new(SECRET).unwrap()
    }

    #[test]
    fn test_issue_then_verify() {
        let service = service();
        let file_id = Uuid::new_v4();
        let issued = service.issue(file_id, Duration::from_secs(3600)).unwrap();

        assert_eq!(service.verify(&issued.token).unwrap(), file_id);
        assert!(issued.expires_at > Utc::now());
        assert!(!issued.token.contains('='));
    }

    #[test]
    fn test_expiry_boundary() {
        let service = service();
        let file_id = Uuid::new_v4();
        let issued = service.issue_at(file_id, 1_000).unwrap();

        assert_eq!(service.verify_at(&issued.token, 1_000).unwrap(), file_id);
        assert_eq!(
            service.verify_at(&issued.token, 1_001),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_other_secret_rejects() {
        let issued = service().issue(Uuid::new_v4(), Duration::from_secs(60)).unwrap();
        let other = DownloadTokenService::new("another-secret-another-secret-xx").unwrap();
        assert_eq!(other.verify(&issued.token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_tampered_token_rejects() {
        let service = service();
        let issued = service.issue(Uuid::new_v4(), Duration::from_secs(60)).unwrap();

        let mut bytes = URL_SAFE_NO_PAD.decode(&issued.token).unwrap();
        // Push the expiry far into the future.
        bytes[1] ^= 0x7f;
        let forged = URL_SAFE_NO_PAD.encode(&bytes);

        assert_eq!(service.verify(&forged), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let service = service();
        assert_eq!(service.verify(""), Err(TokenError::Malformed));
        assert_eq!(service.verify("not base64 !!"), Err(TokenError::Malformed));
        assert_eq!(
            service.verify(&URL_SAFE_NO_PAD.encode([1u8; 10])),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            DownloadTokenService::new(""),
            Err(TokenError::InvalidSecret(_))
        ));
    }

    #[test]
    fn test_errors_map_to_unauthorized() {
        let err: AppError = TokenError::Expired.into();
        assert!(matches!(err, AppError::TokenInvalid(_)));
    }
}
