/// Authentication module
///
/// Token codec (claims, signing, verification), password hashing,
/// and the stored form of refresh tokens.

mod claims;
mod jwt;
mod password;
mod refresh_token;

pub use claims::{Claims, Identity, TokenKind};
pub use jwt::{decode_token, encode_claims, issue_token, issue_token_pair, TokenError, TokenPair};
pub use password::{
    hash_password_with_cost, prepare_dummy_hash, verify_against_dummy, verify_password,
};
pub use refresh_token::fingerprint;
