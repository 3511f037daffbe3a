// chat-crypto: PBKDF2-HMAC-SHA256 password hashing with per-user salt.
//
// Storage form is `base64(salt) $ base64(hash)`, matching the layout the
// original Python implementation persisted (see SPEC_FULL.md §4.6). Never
// compare hashes with `==` — verification goes through `subtle`'s
// constant-time equality.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const ITERATIONS: u32 = 100_000;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("malformed password blob: expected \"salt$hash\"")]
    MalformedBlob,
    #[error("invalid base64 in password blob: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Hash a new password under a fresh random salt, returning the
/// `"salt$hash"` blob to persist.
pub fn hash_new_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let hash = derive(password, &salt);
    format!("{}${}", STANDARD.encode(salt), STANDARD.encode(hash))
}

/// Verify a candidate password against a previously stored `"salt$hash"`
/// blob, using a constant-time comparison of the derived hash.
pub fn verify_password(blob: &str, candidate: &str) -> Result<bool, CryptoError> {
    let (salt_b64, hash_b64) = blob.split_once('$').ok_or(CryptoError::MalformedBlob)?;
    let salt = STANDARD.decode(salt_b64)?;
    let expected = STANDARD.decode(hash_b64)?;
    let actual = derive(candidate, &salt);
    Ok(actual.ct_eq(&expected).into())
}

fn derive(password: &str, salt: &[u8]) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, ITERATIONS, &mut out);
    out
}
