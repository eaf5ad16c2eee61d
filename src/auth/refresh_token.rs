/// Refresh Token Storage Form
///
/// Refresh tokens are signed JWTs handed to the client; the credential store
/// keeps only their SHA-256 digest. Comparing digests is equivalent to
/// comparing the tokens byte for byte, and a leaked row cannot be replayed.

use sha2::{Digest, Sha256};

/// Hex SHA-256 digest of a refresh token, as persisted per account
pub fn fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
