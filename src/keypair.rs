use k256::{
    SecretKey,
    ecdsa::{SigningKey, VerifyingKey},
};

/// A secp256k1 key pair derived from a shared API secret.
///
/// Derivation is a pure function of the secret: the issuer and the verifier
/// each re-derive their half on every call and never persist key material.
#[derive(Clone, Debug)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Derives a key pair from the hex encoding of a 32-byte secp256k1 scalar.
    pub fn from_secret(secret: &str) -> Result<Self, KeyDerivationError> {
        let bytes = hex::decode(secret).map_err(KeyDerivationError::InvalidHex)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyDerivationError::InvalidScalar)?;
        Ok(Self { signing_key: secret_key.into() })
    }

    /// Generates a new, random `Keypair`.
    pub fn generate() -> Self {
        let secret_key = SecretKey::random(&mut rand::thread_rng());
        Self { signing_key: secret_key.into() }
    }

    /// The hex form of the secret, usable as an API secret.
    pub fn to_secret_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }
}

/// An error when deriving a key pair from a secret.
#[derive(Debug, thiserror::Error)]
pub enum KeyDerivationError {
    #[error("secret is not valid hex: {0}")]
    InvalidHex(hex::FromHexError),

    #[error("secret is not a valid secp256k1 scalar")]
    InvalidScalar,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SECRET: &str = "1111111111111111111111111111111111111111111111111111111111111111";
    const OTHER_SECRET: &str = "2222222222222222222222222222222222222222222222222222222222222222";

    #[test]
    fn derivation_is_deterministic() {
        let first = Keypair::from_secret(SECRET).expect("derivation failed");
        let second = Keypair::from_secret(SECRET).expect("derivation failed");
        assert_eq!(first.verifying_key(), second.verifying_key());
    }

    #[test]
    fn distinct_secrets_yield_distinct_keys() {
        let first = Keypair::from_secret(SECRET).expect("derivation failed");
        let second = Keypair::from_secret(OTHER_SECRET).expect("derivation failed");
        assert_ne!(first.verifying_key(), second.verifying_key());
    }

    #[test]
    fn generated_secret_round_trips() {
        let keypair = Keypair::generate();
        let derived = Keypair::from_secret(&keypair.to_secret_hex()).expect("derivation failed");
        assert_eq!(keypair.verifying_key(), derived.verifying_key());
    }

    #[rstest]
    #[case::not_hex("not-hex-at-all")]
    #[case::odd_length("abc")]
    #[case::too_short("abcd")]
    #[case::too_long("1111111111111111111111111111111111111111111111111111111111111111ff")]
    #[case::zero_scalar("0000000000000000000000000000000000000000000000000000000000000000")]
    fn invalid_secrets(#[case] secret: &str) {
        Keypair::from_secret(secret).expect_err("derivation succeeded");
    }
}
