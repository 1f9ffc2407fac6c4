//! HMAC-SHA256 webhook signing, adapted from the teacher's `sign_webhook`
//! (`fc-router/src/mediator.rs`): signs `timestamp + body` and hex-encodes
//! the MAC. Header names are generalized since this system's payloads are
//! not FlowCatalyst-specific.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "X-Alert-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Alert-Timestamp";

type HmacSha256 = Hmac<Sha256>;

/// Returns `(signature_hex, timestamp)`.
pub fn sign(payload: &str, signing_secret: &str) -> (String, String) {
    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
    let signature_payload = format!("{timestamp}{payload}");

    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .expect("HMAC accepts a key of any length");
    mac.update(signature_payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    (signature, timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_for_fixed_timestamp_inputs() {
        let (sig_a, _) = sign("{}", "secret");
        assert_eq!(sig_a.len(), 64);
        assert!(sig_a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_secrets_produce_different_signatures() {
        let payload = "{\"a\":1}";
        let (sig_a, ts) = sign(payload, "secret-one");
        let mut mac = HmacSha256::new_from_slice(b"secret-two").unwrap();
        mac.update(format!("{ts}{payload}").as_bytes());
        let sig_b = hex::encode(mac.finalize().into_bytes());
        assert_ne!(sig_a, sig_b);
    }
}
