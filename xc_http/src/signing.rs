use std::convert::Infallible;

use base64::Engine;
use hmac::Hmac;
use hmac::Mac;
use hmac::digest::Key;
use sha2::Digest;
use sha2::Sha256;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::request::RequestParts;

type HmacSha256 = Hmac<Sha256>;

/// Adds authentication to a request
///
/// Called on every attempt so that each retry carries a fresh timestamp.
pub trait Signer: Send + Sync {
    fn sign_at(&self, parts: &mut RequestParts, now: OffsetDateTime);

    fn sign(&self, parts: &mut RequestParts) {
        self.sign_at(parts, OffsetDateTime::now_utc());
    }
}

/// Public-only clients carry no credentials
impl Signer for Infallible {
    fn sign_at(&self, _parts: &mut RequestParts, _now: OffsetDateTime) {
        match *self {}
    }
}

/// HMAC-SHA256 of `payload` under a key of any length
///
/// The key is brought to the SHA-256 block size the way RFC 2104 does it
/// (hashed when longer, zero padded), so construction cannot fail.
pub fn hmac_sha256(secret: &[u8], payload: &str) -> Vec<u8> {
    let mut key = Key::<HmacSha256>::default();

    if secret.len() > key.len() {
        let digest = Sha256::digest(secret);
        key[..digest.len()].copy_from_slice(&digest);
    } else {
        key[..secret.len()].copy_from_slice(secret);
    }

    let mut mac = <HmacSha256 as Mac>::new(&key);
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

pub fn hmac_sha256_hex(secret: &str, payload: &str) -> String {
    hex::encode(hmac_sha256(secret.as_bytes(), payload))
}

pub fn hmac_sha256_base64(secret: &str, payload: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(hmac_sha256(secret.as_bytes(), payload))
}

pub fn timestamp_ms(now: OffsetDateTime) -> i64 {
    (now.unix_timestamp_nanos() / 1_000_000) as i64
}

/// `2024-01-02T03:04:05.678Z`
pub fn iso_millis(now: OffsetDateTime) -> String {
    now.format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z")).unwrap_or_default()
}

/// `2024-01-02T03:04:05`, UTC without offset
pub fn iso_seconds(now: OffsetDateTime) -> String {
    now.format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]")).unwrap_or_default()
}
