//! Authentication module
//!
//! [`KeyStore`] owns the persisted RSA signing key pair, [`TokenService`]
//! issues and verifies RS256 tokens with it, and [`authentication_gate`]
//! turns the bearer credential of each request into a [`Principal`].

pub mod jwt;
pub mod key_store;
pub mod keys;
pub mod middleware;
pub mod principal;

pub use jwt::{Claims, TokenError, TokenService, ISSUER};
pub use key_store::{CachedKeyPair, KeyStore, KeyStoreError};
pub use keys::{KeyPair, SigningSecret};
pub use middleware::{authentication_gate, extract_token};
pub use principal::Principal;
