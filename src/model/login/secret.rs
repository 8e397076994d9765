use std::fmt::{Display, Formatter};

use data_encoding::BASE64URL_NOPAD;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

/// Bytes of entropy in every login token.
pub const SECRET_BYTES: usize = 48;

/// The opaque, high-entropy secret identifying a login token.
/// Always URL-safe: unpadded base64url.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);

impl TokenSecret {
    /// Draw a fresh secret from the operating system's CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0_u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(BASE64URL_NOPAD.encode(&bytes))
    }

    /// Wrap a secret recovered from a verified signature.
    pub(super) fn from_verified(secret: String) -> Self {
        Self(secret)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TokenSecret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn secrets_are_url_safe_and_full_entropy() {
        let secret = TokenSecret::generate();
        let decoded = BASE64URL_NOPAD.decode(secret.as_str().as_bytes()).unwrap();
        assert_eq!(SECRET_BYTES, decoded.len());
        assert!(secret
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn secrets_do_not_repeat() {
        let secrets: HashSet<_> = (0..1000).map(|_| TokenSecret::generate()).collect();
        assert_eq!(1000, secrets.len());
    }
}
