use crate::grants::ClaimGrants;
use base64::{Engine, display::Base64Display, prelude::BASE64_URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use k256::ecdsa::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use signature::Verifier;

const MAX_RAW_TOKEN_SIZE: usize = 1024 * 10;

/// The signed payload of an access token.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AccessClaims {
    /// The token issuer, equal to the API key that signed it.
    #[serde(rename = "iss")]
    pub issuer: String,

    /// The participant identity, when one was set at issuance.
    #[serde(rename = "sub", default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Unique token identifier, always equal to the subject.
    #[serde(rename = "jti", default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,

    /// The first timestamp at which this token is valid.
    #[serde(rename = "nbf", with = "chrono::serde::ts_seconds")]
    pub not_before: DateTime<Utc>,

    /// The timestamp at which this token becomes invalid.
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,

    /// The grants carried by this token, flattened into the claim set.
    #[serde(flatten)]
    pub grants: ClaimGrants,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct JwtHeader {
    #[serde(rename = "alg")]
    pub(crate) algorithm: JwtAlgorithm,

    #[serde(rename = "typ", default, skip_serializing_if = "Option::is_none")]
    pub(crate) token_type: Option<String>,
}

impl JwtHeader {
    pub(crate) fn es256k() -> Self {
        Self { algorithm: JwtAlgorithm::Es256k, token_type: Some("JWT".to_string()) }
    }
}

/// The signing algorithm named in a token header.
///
/// Keys are derived on secp256k1, so `ES256K` is the only algorithm ever
/// produced or accepted. Anything else decodes as `Unknown` and is rejected
/// at verification time rather than at parse time.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum JwtAlgorithm {
    Es256k,
    #[serde(other)]
    Unknown,
}

/// The raw pieces of a compact token.
///
/// Kept alongside the decoded claims so the token can be re-serialized
/// byte-identically and its signature checked over the original input.
#[derive(Clone, Debug)]
pub(crate) struct RawToken {
    pub(crate) header: Vec<u8>,
    pub(crate) payload: Vec<u8>,
    pub(crate) signature: Vec<u8>,
}

impl RawToken {
    fn from_compact(s: &str) -> Result<Self, TokenParseError> {
        let mut chunks = s.splitn(3, '.');
        let header = Self::parse_base64_next(&mut chunks, "header")?;
        let payload = Self::parse_base64_next(&mut chunks, "payload")?;
        let signature = chunks.next().ok_or(TokenParseError::MissingComponent("signature"))?;
        let signature = from_base64(signature).map_err(|e| TokenParseError::Base64("signature", e))?;
        Ok(Self { header, payload, signature })
    }

    fn to_compact(&self) -> String {
        let header = Base64Display::new(&self.header, &BASE64_URL_SAFE_NO_PAD);
        let payload = Base64Display::new(&self.payload, &BASE64_URL_SAFE_NO_PAD);
        let signature = Base64Display::new(&self.signature, &BASE64_URL_SAFE_NO_PAD);
        format!("{header}.{payload}.{signature}")
    }

    fn parse_base64_next<'a, I>(iter: &mut I, component: &'static str) -> Result<Vec<u8>, TokenParseError>
    where
        I: Iterator<Item = &'a str>,
    {
        let next = iter.next().ok_or(TokenParseError::MissingComponent(component))?;
        from_base64(next).map_err(|e| TokenParseError::Base64(component, e))
    }
}

/// A decoded access token.
///
/// Decoding performs no integrity checks; it only ensures the token is well
/// formed. Signature validation is a separate step against a verifying key.
#[derive(Clone, Debug)]
pub struct SignedToken {
    raw: RawToken,
    header: JwtHeader,
    claims: AccessClaims,
}

impl SignedToken {
    /// Decode a compact `header.payload.signature` token.
    pub fn decode(s: &str) -> Result<Self, TokenParseError> {
        if s.len() > MAX_RAW_TOKEN_SIZE {
            return Err(TokenParseError::TooLarge(MAX_RAW_TOKEN_SIZE));
        }
        let raw = RawToken::from_compact(s)?;
        let header =
            serde_json::from_slice(&raw.header).map_err(|e| TokenParseError::Json("header", e))?;
        let claims =
            serde_json::from_slice(&raw.payload).map_err(|e| TokenParseError::Json("payload", e))?;
        Ok(Self { raw, header, claims })
    }

    /// Encode this token back into its compact form, unaltered.
    pub fn encode(&self) -> String {
        self.raw.to_compact()
    }

    /// Validate the signature in this token against the given key.
    pub(crate) fn validate_signature(&self, key: &VerifyingKey) -> Result<(), InvalidSignature> {
        let header = Base64Display::new(&self.raw.header, &BASE64_URL_SAFE_NO_PAD);
        let payload = Base64Display::new(&self.raw.payload, &BASE64_URL_SAFE_NO_PAD);
        let input = format!("{header}.{payload}");

        let signature =
            Signature::try_from(self.raw.signature.as_slice()).map_err(|_| InvalidSignature)?;
        key.verify(input.as_bytes(), &signature).map_err(|_| InvalidSignature)?;
        Ok(())
    }

    pub(crate) fn header(&self) -> &JwtHeader {
        &self.header
    }

    pub fn claims(&self) -> &AccessClaims {
        &self.claims
    }

    pub fn into_claims(self) -> AccessClaims {
        self.claims
    }
}

/// An error when parsing a compact token.
#[derive(Debug, thiserror::Error)]
pub enum TokenParseError {
    #[error("token is larger than max allowed: {0} bytes")]
    TooLarge(usize),

    #[error("no {0} component in token")]
    MissingComponent(&'static str),

    #[error("invalid base64 found on {0}: {1}")]
    Base64(&'static str, base64::DecodeError),

    #[error("invalid JSON on {0}: {1}")]
    Json(&'static str, serde_json::Error),
}

/// An error during the verification of a token signature.
#[derive(Debug, thiserror::Error)]
#[error("invalid signature")]
pub(crate) struct InvalidSignature;

pub(crate) fn to_base64<T: AsRef<[u8]>>(input: T) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(input)
}

pub(crate) fn to_base64_json<T: Serialize>(input: &T) -> Result<String, serde_json::Error> {
    let input = serde_json::to_vec(input)?;
    Ok(to_base64(&input))
}

pub(crate) fn from_base64(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_URL_SAFE_NO_PAD.decode(input)
}
