//! HS256 JWT verification implementing the broker's [`IdentityVerifier`]
//! contract.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use hydrolink_core::{AuthError, IdentityVerifier, SubjectId};

/// Claims carried by dashboard bearer tokens.
///
/// The account backend signs `{ uuid, exp }`; `uuid` identifies the user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated user's uuid.
    pub uuid: String,
    /// Expiry, seconds since the epoch.
    pub exp: u64,
}

/// Verifies dashboard bearer tokens against a shared HS256 secret.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Create a verifier for the given shared secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let validation = Validation::new(Algorithm::HS256);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    fn verify_sync(&self, token: &str) -> Result<SubjectId, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => {
                debug!(subject = %data.claims.uuid, "bearer token verified");
                Ok(SubjectId::from_verified(data.claims.uuid))
            }
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => Err(AuthError::Expired),
                ErrorKind::InvalidToken
                | ErrorKind::InvalidSignature
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => Err(AuthError::InvalidToken),
                _ => Err(AuthError::Verification(e.to_string())),
            },
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<SubjectId, AuthError> {
        self.verify_sync(token)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-secret";

    fn token_for(uuid: &str, exp_offset_secs: i64, secret: &str) -> String {
        let exp = chrono_now_secs().saturating_add_signed(exp_offset_secs);
        let claims = Claims {
            uuid: uuid.to_owned(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn chrono_now_secs() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[tokio::test]
    async fn valid_token_yields_subject() {
        let verifier = JwtVerifier::new(SECRET);
        let token = token_for("owner-1", 3600, SECRET);
        let subject = verifier.verify(&token).await.unwrap();
        assert_eq!(subject.as_str(), "owner-1");
    }

    #[tokio::test]
    async fn expired_token_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        let token = token_for("owner-1", -3600, SECRET);
        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }

    #[tokio::test]
    async fn wrong_secret_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        let token = token_for("owner-1", 3600, "other-secret");
        let err = verifier.verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn garbage_token_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        let err = verifier.verify("definitely.not.a.jwt").await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::InvalidToken | AuthError::Verification(_)
        ));
    }

    #[tokio::test]
    async fn empty_token_is_missing() {
        let verifier = JwtVerifier::new(SECRET);
        let err = verifier.verify("").await.unwrap_err();
        assert!(matches!(err, AuthError::MissingToken));
    }
}
