use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 over the exact raw request body.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a caller-supplied signature against the raw body in constant
/// time. The header value must be the hex digest produced by [`sign_body`].
pub fn verify_body_signature(secret: &str, body: &[u8], provided: &str) -> bool {
    let expected = sign_body(secret, body);
    let Ok(provided_raw) = hex::decode(provided.trim()) else {
        return false;
    };
    let expected_raw = hex::decode(expected).expect("sign_body emits valid hex");
    ConstantTimeEq::ct_eq(provided_raw.as_slice(), expected_raw.as_slice()).into()
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    ConstantTimeEq::ct_eq(a, b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_round_trips() {
        let body = br#"{"data":{"submissionId":"abc"}}"#;
        let sig = sign_body("whsec_test", body);
        assert!(verify_body_signature("whsec_test", body, &sig));
    }

    #[test]
    fn signature_is_bound_to_body_and_secret() {
        let body = b"payload";
        let sig = sign_body("whsec_test", body);
        assert!(!verify_body_signature("whsec_test", b"payload2", &sig));
        assert!(!verify_body_signature("other_secret", body, &sig));
        assert!(!verify_body_signature("whsec_test", body, "not-hex"));
    }
}
