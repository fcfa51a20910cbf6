use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Lower-case hex HMAC-SHA256 of `message` under `secret`.
pub fn sign_hex(secret: &str, message: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Config(format!("Invalid signing secret: {}", e)))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Case-insensitive comparison that does not short-circuit on the first
/// differing byte.
pub fn constant_time_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.to_ascii_uppercase();
    let expected = expected.to_ascii_uppercase();
    ConstantTimeEq::ct_eq(provided.as_bytes(), expected.as_bytes()).into()
}
