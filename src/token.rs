//! C4 — Auth Primitive.
//!
//! Deterministic HMAC-SHA256 signer/verifier over `socket_id:channel_name`,
//! constant-time compared on verify so a captured token can't be timed
//! against a different connection's channel. Grounded on sockudo's
//! `channel/manager.rs` (`signature_is_valid`/`get_expected_signature`),
//! collapsed to this spec's single shared-secret, single-tenant shape.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct Token {
    secret: String,
}

impl Token {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// HMAC-SHA256(`socket_id:channel_name`, secret) as lowercase hex.
    pub fn sign(&self, socket_id: &str, channel_name: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts a key of any length");
        mac.update(socket_id.as_bytes());
        mac.update(b":");
        mac.update(channel_name.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// `"<socket_id>:<hex-hmac>"`.
    pub fn token(&self, socket_id: &str, channel_name: &str) -> String {
        format!("{socket_id}:{}", self.sign(socket_id, channel_name))
    }

    /// Splits `token` on the first `:`, requires the left side to equal
    /// `expected_socket_id`, recomputes the signature, and compares in
    /// constant time. Never panics; any parse error, length mismatch, or
    /// signature mismatch simply yields `false`.
    pub fn verify(&self, token: &str, expected_socket_id: &str, channel_name: &str) -> bool {
        let Some((socket_id, signature)) = token.split_once(':') else {
            return false;
        };
        if socket_id != expected_socket_id {
            return false;
        }
        let expected = self.sign(socket_id, channel_name);
        if expected.len() != signature.len() {
            return false;
        }
        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }
}
