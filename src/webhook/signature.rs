//! HMAC-SHA256 verification of webhook payloads.
//!
//! The sender signs the raw body with a shared secret and sends the result
//! in `X-Hub-Signature-256` as `sha256=<hex>`. Verification runs before the
//! body is parsed.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Shared webhook secret. Its `Debug` output never reveals the value.
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookSecret(String);

impl WebhookSecret {
    /// Wraps a configured secret. Blank secrets count as unconfigured.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let value = secret.into();
        (!value.trim().is_empty()).then_some(Self(value))
    }

    /// Returns the secret bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookSecret(<redacted>)")
    }
}

/// Parses a `sha256=<hex>` header into raw signature bytes.
///
/// Returns `None` for a missing prefix, another algorithm, or invalid hex.
///
/// # Examples
///
/// ```
/// use reposync::webhook::parse_signature_header;
///
/// assert_eq!(parse_signature_header("sha256=abcd"), Some(vec![0xab, 0xcd]));
/// assert!(parse_signature_header("sha1=abcd").is_none());
/// assert!(parse_signature_header("sha256=xyz").is_none());
/// ```
#[must_use]
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_signature = header.trim().strip_prefix("sha256=")?;
    hex::decode(hex_signature).ok()
}

/// Signs `payload` and formats the result as a header value.
///
/// Returns `None` only if the MAC rejects the key, which HMAC never does.
#[must_use]
pub fn sign_payload(payload: &[u8], secret: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Verifies a signature header against the payload in constant time.
#[must_use]
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(expected) = parse_signature_header(signature_header) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn header_for(payload: &[u8], secret: &[u8]) -> String {
        sign_payload(payload, secret).expect("hmac accepts any key")
    }

    #[rstest]
    #[case("sha256=1234abcd", Some(vec![0x12, 0x34, 0xab, 0xcd]))]
    #[case("sha256=ABCD1234", Some(vec![0xab, 0xcd, 0x12, 0x34]))]
    #[case("1234abcd", None)]
    #[case("sha1=1234abcd", None)]
    #[case("sha256=abc", None)]
    #[case("", None)]
    fn parses_signature_headers(#[case] header: &str, #[case] expected: Option<Vec<u8>>) {
        assert_eq!(parse_signature_header(header), expected);
    }

    #[rstest]
    fn signed_header_is_sha256_hex() {
        let header = header_for(b"Hello, World!", b"It's a Secret to Everybody");
        assert_eq!(
            header,
            "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
        );
    }

    #[rstest]
    #[case("")]
    #[case("sha256=")]
    #[case("sha256=zzzz")]
    #[case("sha1=abc123")]
    fn malformed_headers_never_verify(#[case] header: &str) {
        assert!(!verify_signature(b"payload", header, b"secret"));
    }

    #[rstest]
    fn blank_secret_counts_as_unconfigured() {
        assert!(WebhookSecret::new("   ").is_none());
        let secret = WebhookSecret::new("s3cret").expect("configured");
        assert_eq!(format!("{secret:?}"), "WebhookSecret(<redacted>)");
    }

    proptest! {
        #[test]
        fn signing_then_verifying_succeeds(payload: Vec<u8>, secret: Vec<u8>) {
            let header = header_for(&payload, &secret);
            prop_assert!(verify_signature(&payload, &header, &secret));
        }

        // HMAC zero-pads short keys, so keys differing only in trailing
        // zero bytes are equivalent.
        #[test]
        fn wrong_secret_fails(
            payload: Vec<u8>,
            secret in prop::collection::vec(1u8.., 1..64),
            other in prop::collection::vec(1u8.., 1..64),
        ) {
            prop_assume!(secret != other);
            let header = header_for(&payload, &secret);
            prop_assert!(!verify_signature(&payload, &header, &other));
        }

        #[test]
        fn modified_payload_fails(original: Vec<u8>, modified: Vec<u8>, secret: Vec<u8>) {
            prop_assume!(original != modified);
            let header = header_for(&original, &secret);
            prop_assert!(!verify_signature(&modified, &header, &secret));
        }

        #[test]
        fn arbitrary_headers_never_panic(header: String, payload: Vec<u8>, secret: Vec<u8>) {
            let _verified = verify_signature(&payload, &header, &secret);
        }
    }
}
