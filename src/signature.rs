use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

const VERSION: &str = "v0";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("request timestamp is not a unix timestamp")]
    InvalidTimestamp,
    #[error("request timestamp is {age_secs}s away from now")]
    Expired { age_secs: u64 },
    #[error("signature header is not a v0 hex digest")]
    InvalidSignature,
    #[error("signature does not match request body")]
    Mismatch,
    #[error("signing secret cannot key HMAC-SHA256")]
    InvalidKey,
}

/// Proof that a request body passed [`SignatureVerifier::verify`].
///
/// Only this module can create one, so anything that takes a `Verified`
/// cannot be built from an unauthenticated payload.
#[derive(Debug, Clone, Copy)]
pub struct Verified {
    _private: (),
}

#[cfg(test)]
impl Verified {
    pub fn for_tests() -> Self {
        Self { _private: () }
    }
}

/// Holds the MAC keyed with the signing secret; each request works on a clone.
#[derive(Clone)]
pub struct SignatureVerifier {
    keyed: HmacSha256,
    max_skew: Duration,
}

impl SignatureVerifier {
    pub fn new(signing_secret: impl AsRef<[u8]>, max_skew: Duration) -> Result<Self, SignatureError> {
        let keyed = HmacSha256::new_from_slice(signing_secret.as_ref())
            .map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self { keyed, max_skew })
    }

    /// Checks the `v0` HMAC-SHA256 signature over the raw, unparsed body.
    pub fn verify(&self, headers: &HeaderMap, raw_body: &[u8]) -> Result<Verified, SignatureError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.verify_at(headers, raw_body, now)
    }

    pub fn verify_at(
        &self,
        headers: &HeaderMap,
        raw_body: &[u8],
        now: u64,
    ) -> Result<Verified, SignatureError> {
        let timestamp = header_str(headers, TIMESTAMP_HEADER)?;
        let signature = header_str(headers, SIGNATURE_HEADER)?;

        let ts: u64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;

        let age_secs = now.abs_diff(ts);
        if age_secs > self.max_skew.as_secs() {
            return Err(SignatureError::Expired { age_secs });
        }

        let expected = signature
            .strip_prefix("v0=")
            .and_then(|digest| hex::decode(digest).ok())
            .ok_or(SignatureError::InvalidSignature)?;

        // verify_slice compares in constant time
        self.mac_for(ts, raw_body)
            .verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)?;

        Ok(Verified { _private: () })
    }

    /// Produces the header value the platform would send for `raw_body` at `timestamp`.
    pub fn sign(&self, timestamp: u64, raw_body: &[u8]) -> String {
        let digest = self.mac_for(timestamp, raw_body).finalize().into_bytes();
        format!("{}={}", VERSION, hex::encode(digest))
    }

    fn mac_for(&self, timestamp: u64, raw_body: &[u8]) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(format!("{}:{}:", VERSION, timestamp).as_bytes());
        mac.update(raw_body);
        mac
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(SignatureError::MissingHeader(name))
}
