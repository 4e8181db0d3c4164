//! RS256 signing over a service-account private key.

use crate::utils::error::{Result, SaverError};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;

/// Signs JWT claim sets with a service account's RSA private key.
pub struct JwtSigner {
    key: EncodingKey,
    header: Header,
}

impl JwtSigner {
    /// Create a signer from a PEM-encoded RSA private key (PKCS#1 or PKCS#8).
    pub fn new(private_key_pem: &str) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| SaverError::auth(format!("failed to parse private key: {e}")))?;

        Ok(Self {
            key,
            header: Header::new(Algorithm::RS256),
        })
    }

    /// Create and sign a JWT with the provided claims.
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String> {
        jsonwebtoken::encode(&self.header, claims, &self.key)
            .map_err(|e| SaverError::auth(format!("failed to sign token: {e}")))
    }
}

impl std::fmt::Debug for JwtSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSigner")
            .field("alg", &self.header.alg)
            .finish_non_exhaustive()
    }
}
