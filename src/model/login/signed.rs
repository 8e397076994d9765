use std::fmt::{Display, Formatter};

use data_encoding::BASE64URL_NOPAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{Error, Result};

use super::secret::TokenSecret;

pub type HmacSha256 = Hmac<Sha256>;

/// Separates the secret from its signature. Never produced by base64url.
const SEPARATOR: char = ':';

/// A token secret wrapped with a tamper-evident signature, ready to be embedded in a URL.
///
/// The format is `<secret>:<base64url(HMAC-SHA256(key, secret))>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedToken(String);

impl SignedToken {
    /// Sign the given secret with the server-held key.
    pub fn sign(secret: &TokenSecret, key: &[u8]) -> Self {
        let signature = BASE64URL_NOPAD.encode(&mac(key, secret.as_str()).finalize().into_bytes());
        Self(format!("{secret}{SEPARATOR}{signature}"))
    }

    /// Check the signature and recover the secret.
    pub fn unsign(&self, key: &[u8]) -> Result<TokenSecret> {
        let (secret, signature) = self
            .0
            .rsplit_once(SEPARATOR)
            .ok_or(Error::TamperedOrInvalidSignature)?;
        if secret.is_empty() {
            return Err(Error::TamperedOrInvalidSignature);
        }
        let signature = BASE64URL_NOPAD
            .decode(signature.as_bytes())
            .map_err(|_| Error::TamperedOrInvalidSignature)?;
        mac(key, secret)
            .verify_slice(&signature)
            .map_err(|_| Error::TamperedOrInvalidSignature)?;
        Ok(TokenSecret::from_verified(secret.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SignedToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for SignedToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn mac(key: &[u8], message: &str) -> HmacSha256 {
    let mut hmac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    hmac.update(message.as_bytes());
    hmac
}
