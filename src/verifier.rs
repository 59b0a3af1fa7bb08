use crate::{
    grants::ClaimGrants,
    keypair::{Keypair, KeyDerivationError},
    token::{JwtAlgorithm, SignedToken, TokenParseError},
};
use chrono::{DateTime, Utc};

/// Verifies access tokens issued with the same API key and secret.
pub struct TokenVerifier {
    api_key: String,
    api_secret: String,
    time_provider: Box<dyn TimeProvider>,
}

impl TokenVerifier {
    /// Construct a new verifier.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            time_provider: Box::new(SystemClockTimeProvider),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_time_provider(mut self, time_provider: impl TimeProvider) -> Self {
        self.time_provider = Box::new(time_provider);
        self
    }

    /// Verify a compact token and recover the grants it carries.
    ///
    /// This checks the signature against the public key derived from the
    /// secret, the issuer against the API key, and the validity window. The
    /// grants themselves are returned as signed, without re-validation.
    pub fn verify(&self, token: &str) -> Result<ClaimGrants, VerifyTokenError> {
        let decoded = SignedToken::decode(token)?;
        if decoded.header().algorithm != JwtAlgorithm::Es256k {
            return Err(VerifyTokenError::InvalidSignature);
        }

        let keypair = Keypair::from_secret(&self.api_secret)?;
        decoded
            .validate_signature(keypair.verifying_key())
            .map_err(|_| VerifyTokenError::InvalidSignature)?;

        let claims = decoded.into_claims();
        if claims.issuer != self.api_key {
            return Err(VerifyTokenError::IssuerMismatch);
        }
        let now = self.time_provider.current_time();
        if now >= claims.expires_at {
            return Err(VerifyTokenError::Expired);
        }
        if now < claims.not_before {
            return Err(VerifyTokenError::NotYetValid);
        }

        let mut grants = claims.grants;
        grants.identity = claims.subject;
        Ok(grants)
    }
}

/// An error when verifying a token.
#[derive(Debug, thiserror::Error)]
pub enum VerifyTokenError {
    #[error("malformed token: {0}")]
    Malformed(#[from] TokenParseError),

    #[error(transparent)]
    KeyDerivation(#[from] KeyDerivationError),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("token issuer mismatch")]
    IssuerMismatch,

    #[error("token is expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,
}

pub(crate) trait TimeProvider: Send + Sync + 'static {
    fn current_time(&self) -> DateTime<Utc>;
}

struct SystemClockTimeProvider;

impl TimeProvider for SystemClockTimeProvider {
    fn current_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        grants::{ClaimGrants, VideoGrant},
        issuer::{TokenIssuer, TokenOptions},
        token::{from_base64, to_base64, to_base64_json},
    };
    use chrono::Duration;

    const SECRET: &str = "1111111111111111111111111111111111111111111111111111111111111111";
    const OTHER_SECRET: &str = "2222222222222222222222222222222222222222222222222222222222222222";

    struct FixedTimeProvider(DateTime<Utc>);

    impl TimeProvider for FixedTimeProvider {
        fn current_time(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn signed_token(api_key: &str, secret: &str) -> String {
        let options = TokenOptions {
            identity: Some("alice".into()),
            name: Some("Alice".into()),
            ..Default::default()
        };
        TokenIssuer::new(Some(api_key), Some(secret), options)
            .expect("construction failed")
            .grant(VideoGrant::room_join("orders"))
            .sign()
            .expect("signing failed")
    }

    #[test]
    fn round_trip() {
        let token = signed_token("key-1", SECRET);
        let grants = TokenVerifier::new("key-1", SECRET).verify(&token).expect("verification failed");

        let expected = ClaimGrants {
            identity: Some("alice".into()),
            name: Some("Alice".into()),
            video: Some(VideoGrant::room_join("orders")),
            ..Default::default()
        };
        assert_eq!(grants, expected);
    }

    #[test]
    fn wrong_secret_fails() {
        let token = signed_token("key-1", SECRET);
        let err = TokenVerifier::new("key-1", OTHER_SECRET)
            .verify(&token)
            .expect_err("verification succeeded");
        assert!(matches!(err, VerifyTokenError::InvalidSignature));
    }

    #[test]
    fn wrong_issuer_fails() {
        let token = signed_token("key-1", SECRET);
        let err = TokenVerifier::new("key-2", SECRET)
            .verify(&token)
            .expect_err("verification succeeded");
        assert!(matches!(err, VerifyTokenError::IssuerMismatch));
    }

    #[test]
    fn tampered_signature_fails() {
        let token = signed_token("key-1", SECRET);
        let (base, signature) = token.rsplit_once('.').expect("no signature");
        let verifier = TokenVerifier::new("key-1", SECRET);

        // Change every byte in the signature and make sure verification
        // fails every time.
        let signature = from_base64(signature).expect("invalid base64");
        for index in 0..signature.len() {
            let mut signature = signature.clone();
            signature[index] = signature[index].wrapping_add(1);
            let token = format!("{base}.{}", to_base64(&signature));
            let err = verifier.verify(&token).expect_err("verification succeeded");
            assert!(matches!(err, VerifyTokenError::InvalidSignature));
        }
    }

    #[test]
    fn expired_token_fails() {
        let token = signed_token("key-1", SECRET);
        let verifier = TokenVerifier::new("key-1", SECRET)
            .with_time_provider(FixedTimeProvider(Utc::now() + Duration::hours(7)));
        let err = verifier.verify(&token).expect_err("verification succeeded");
        assert!(matches!(err, VerifyTokenError::Expired));
    }

    #[test]
    fn token_from_the_future_fails() {
        let token = signed_token("key-1", SECRET);
        let verifier = TokenVerifier::new("key-1", SECRET)
            .with_time_provider(FixedTimeProvider(Utc::now() - Duration::hours(1)));
        let err = verifier.verify(&token).expect_err("verification succeeded");
        assert!(matches!(err, VerifyTokenError::NotYetValid));
    }

    #[test]
    fn foreign_algorithm_fails() {
        let token = signed_token("key-1", SECRET);
        let mut parts = token.split('.');
        let _header = parts.next().expect("no header");
        let payload = parts.next().expect("no payload");
        let signature = parts.next().expect("no signature");

        let header = to_base64_json(&serde_json::json!({"alg": "ES256", "typ": "JWT"}))
            .expect("encoding failed");
        let token = format!("{header}.{payload}.{signature}");
        let err = TokenVerifier::new("key-1", SECRET)
            .verify(&token)
            .expect_err("verification succeeded");
        assert!(matches!(err, VerifyTokenError::InvalidSignature));
    }

    #[test]
    fn malformed_secret_fails() {
        let token = signed_token("key-1", SECRET);
        let err = TokenVerifier::new("key-1", "not-a-secret")
            .verify(&token)
            .expect_err("verification succeeded");
        assert!(matches!(err, VerifyTokenError::KeyDerivation(_)));
    }
}
