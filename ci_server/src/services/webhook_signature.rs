//! HMAC validation for inbound webhooks.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header SonarQube uses for the payload signature (hex, no prefix).
pub const SONARQUBE_SIGNATURE_HEADER: &str = "x-sonar-webhook-hmac-sha256";

/// Validate a hex HMAC-SHA256 signature of `payload`.
///
/// An empty secret disables validation. A `sha256=` prefix is accepted.
pub fn validate_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        return true;
    }

    let sig = signature.trim();
    let sig = sig.strip_prefix("sha256=").unwrap_or(sig);
    let Ok(sig_bytes) = hex::decode(sig) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&sig_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_matching_signature() {
        let body = br#"{"taskId":"t"}"#;
        let sig = sign("s3cret", body);
        assert!(validate_signature("s3cret", body, &sig));
        assert!(validate_signature("s3cret", body, &format!("sha256={sig}")));
    }

    #[test]
    fn rejects_tampered_or_garbled_signature() {
        let sig = sign("s3cret", b"original");
        assert!(!validate_signature("s3cret", b"tampered", &sig));
        assert!(!validate_signature("s3cret", b"original", "not-hex"));
        assert!(!validate_signature("s3cret", b"original", ""));
    }

    #[test]
    fn empty_secret_disables_validation() {
        assert!(validate_signature("", b"anything", ""));
    }
}
