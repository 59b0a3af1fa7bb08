use crate::{
    grants::{ClaimGrants, VideoGrant},
    keypair::{Keypair, KeyDerivationError},
    token::{AccessClaims, JwtHeader, to_base64, to_base64_json},
};
use chrono::Utc;
use k256::ecdsa::Signature;
use signature::Signer as _;
use std::time::Duration;

/// Tokens expire 6 hours after issuance unless a ttl is set.
pub const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

const API_KEY_ENV_VAR: &str = "API_KEY";
const API_SECRET_ENV_VAR: &str = "API_SECRET";

/// Options recognized when constructing a [`TokenIssuer`].
#[derive(Clone, Debug, Default)]
pub struct TokenOptions {
    /// Identity of the participant; required for room join grants.
    pub identity: Option<String>,

    /// Amount of time before expiration.
    pub ttl: Option<Duration>,

    /// Display name for the participant.
    pub name: Option<String>,

    /// Opaque metadata passed through to other participants.
    pub metadata: Option<String>,
}

/// Issues signed access tokens.
///
/// Grants accumulate into one owned claim set and are finalized once, at
/// [`sign`](TokenIssuer::sign) time; nothing partially built ever escapes.
#[derive(Clone, Debug)]
pub struct TokenIssuer {
    api_key: String,
    api_secret: String,
    identity: Option<String>,
    ttl: Duration,
    grants: ClaimGrants,
}

impl TokenIssuer {
    /// Construct a new issuer.
    ///
    /// `api_key` and `api_secret` fall back to the `API_KEY` and `API_SECRET`
    /// environment variables when not given explicitly; both must end up
    /// non-empty.
    pub fn new(
        api_key: Option<&str>,
        api_secret: Option<&str>,
        options: TokenOptions,
    ) -> Result<Self, ConfigError> {
        let api_key = resolve_credential(api_key, API_KEY_ENV_VAR);
        let api_secret = resolve_credential(api_secret, API_SECRET_ENV_VAR);
        if api_key.is_empty() || api_secret.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        warn_if_client_side();

        let TokenOptions { identity, ttl, name, metadata } = options;
        let grants = ClaimGrants { name, metadata, ..Default::default() };
        Ok(Self { api_key, api_secret, identity, ttl: ttl.unwrap_or(DEFAULT_TTL), grants })
    }

    /// Set the identity for this token.
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Set the time before expiration for this token.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Replace the video grant for this token.
    pub fn grant(mut self, grant: VideoGrant) -> Self {
        self.grants.video = Some(grant);
        self
    }

    /// Set the display name for this token.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.grants.name = Some(name.into());
        self
    }

    /// Set the metadata for this token.
    pub fn metadata(mut self, metadata: impl Into<String>) -> Self {
        self.grants.metadata = Some(metadata.into());
        self
    }

    /// Set the content hash for this token.
    pub fn sha256(mut self, sha256: impl Into<String>) -> Self {
        self.grants.sha256 = Some(sha256.into());
        self
    }

    /// Set the webhook URL for this token.
    pub fn webhook_url(mut self, url: impl Into<String>) -> Self {
        self.grants.webhook_url = Some(url.into());
        self
    }

    /// Sign the accumulated grants into a compact token.
    pub fn sign(&self) -> Result<String, SignTokenError> {
        let keypair = Keypair::from_secret(&self.api_secret)?;

        let now = Utc::now();
        let mut claims = AccessClaims {
            issuer: self.api_key.clone(),
            subject: None,
            token_id: None,
            not_before: now,
            expires_at: now + self.ttl,
            grants: self.grants.clone(),
        };
        match &self.identity {
            Some(identity) => {
                claims.subject = Some(identity.clone());
                claims.token_id = Some(identity.clone());
            }
            None if self.grants.requests_room_join() => {
                return Err(SignTokenError::MissingIdentity);
            }
            None => (),
        }

        let header_b64 = to_base64_json(&JwtHeader::es256k())
            .map_err(|e| SignTokenError::Encoding(e.to_string()))?;
        let payload_b64 =
            to_base64_json(&claims).map_err(|e| SignTokenError::Encoding(e.to_string()))?;

        let message = format!("{header_b64}.{payload_b64}");
        let signature: Signature = keypair
            .signing_key()
            .try_sign(message.as_bytes())
            .map_err(|e| SignTokenError::Signing(e.to_string()))?;

        Ok(format!("{message}.{}", to_base64(signature.to_bytes())))
    }
}

fn resolve_credential(explicit: Option<&str>, env_var: &str) -> String {
    match explicit {
        Some(value) => value.to_string(),
        None => std::env::var(env_var).unwrap_or_default(),
    }
}

// Secrets belong on a backend service; a browser bundle that signs tokens
// leaks them to every client. Warn once when built for the web.
#[cfg(target_arch = "wasm32")]
fn warn_if_client_side() {
    use std::sync::Once;
    static WARNED: Once = Once::new();
    WARNED.call_once(|| {
        tracing::warn!(
            "do not embed your API secret in client-side code; \
             request tokens from your backend service instead"
        );
    });
}

#[cfg(not(target_arch = "wasm32"))]
fn warn_if_client_side() {}

/// An error when constructing an issuer.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("api-key and api-secret must be set")]
    MissingCredentials,
}

/// An error when signing a token.
#[derive(Debug, thiserror::Error)]
pub enum SignTokenError {
    #[error("identity is required for a join grant but not set")]
    MissingIdentity,

    #[error(transparent)]
    KeyDerivation(#[from] KeyDerivationError),

    #[error("encoding claims: {0}")]
    Encoding(String),

    #[error("signing failed: {0}")]
    Signing(String),
}
