//! RSA signing key material
//!
//! Persisted form: PKCS#8 DER for the private key, SPKI DER for the public
//! key. In memory the pair also carries the PKCS#1 encodings handed to
//! `jsonwebtoken`.

use std::fmt;

use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::{
    pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey},
    RsaPrivateKey, RsaPublicKey,
};

use super::key_store::KeyStoreError;

/// RSA modulus size for RS256 signing keys
pub const RSA_KEY_BITS: usize = 2048;

/// Store record id of the private key
pub const PRIVATE_KEY_ID: &str = "privateKey";

/// Store record id of the public key
pub const PUBLIC_KEY_ID: &str = "publicKey";

/// One record of the persisted key pair
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret {
    pub id: &'static str,
    pub value: Vec<u8>,
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSecret")
            .field("id", &self.id)
            .field("len", &self.value.len())
            .finish()
    }
}

/// Why a stored pair could not be used
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyDecodeError {
    #[error("record {0} is missing")]
    Missing(&'static str),

    #[error("record {0} is not valid key material")]
    Invalid(&'static str),

    #[error("public key does not belong to private key")]
    Mismatch,
}

#[derive(Clone)]
pub struct KeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl KeyPair {
    /// Generates a fresh pair. CPU bound; call from a blocking thread.
    pub fn generate() -> Result<Self, KeyStoreError> {
        let mut rng = rand::rngs::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
            .map_err(|e| KeyStoreError::KeyGeneration(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);

        Self::from_keys(private_key, public_key)
    }

    /// Decodes the two persisted records.
    pub fn decode(private_der: &[u8], public_der: &[u8]) -> Result<Self, KeyDecodeError> {
        let private_key = RsaPrivateKey::from_pkcs8_der(private_der)
            .map_err(|_| KeyDecodeError::Invalid(PRIVATE_KEY_ID))?;
        let public_key = RsaPublicKey::from_public_key_der(public_der)
            .map_err(|_| KeyDecodeError::Invalid(PUBLIC_KEY_ID))?;

        if RsaPublicKey::from(&private_key) != public_key {
            return Err(KeyDecodeError::Mismatch);
        }

        Self::from_keys(private_key, public_key).map_err(|_| KeyDecodeError::Invalid(PRIVATE_KEY_ID))
    }

    fn from_keys(private_key: RsaPrivateKey, public_key: RsaPublicKey) -> Result<Self, KeyStoreError> {
        let private_pkcs1 = private_key
            .to_pkcs1_der()
            .map_err(|e| KeyStoreError::KeyEncoding(e.to_string()))?;
        let public_pkcs1 = public_key
            .to_pkcs1_der()
            .map_err(|e| KeyStoreError::KeyEncoding(e.to_string()))?;

        Ok(Self {
            encoding_key: EncodingKey::from_rsa_der(private_pkcs1.as_bytes()),
            decoding_key: DecodingKey::from_rsa_der(public_pkcs1.as_bytes()),
            private_key,
            public_key,
        })
    }

    /// Encodes the pair into its two store records, private key first.
    pub fn to_secrets(&self) -> Result<[SigningSecret; 2], KeyStoreError> {
        let private_der = self
            .private_key
            .to_pkcs8_der()
            .map_err(|e| KeyStoreError::KeyEncoding(e.to_string()))?;

        Ok([
            SigningSecret {
                id: PRIVATE_KEY_ID,
                value: private_der.as_bytes().to_vec(),
            },
            SigningSecret {
                id: PUBLIC_KEY_ID,
                value: self.public_key_der()?,
            },
        ])
    }

    /// SPKI DER of the public key
    pub fn public_key_der(&self) -> Result<Vec<u8>, KeyStoreError> {
        let der = self
            .public_key
            .to_public_key_der()
            .map_err(|e| KeyStoreError::KeyEncoding(e.to_string()))?;
        Ok(der.as_bytes().to_vec())
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}
