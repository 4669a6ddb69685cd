//! # Callback Signatures
//!
//! Gateways sign success callbacks with HMAC-SHA256 over
//! `"{order_ref}|{payment_ref}"` using the merchant secret, hex-encoded.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::error::{BookingError, BookingResult};

type HmacSha256 = Hmac<Sha256>;

/// Verifies callback signatures with a shared secret.
#[derive(Clone)]
pub struct HmacSignatureVerifier {
    keyed: HmacSha256,
}

impl std::fmt::Debug for HmacSignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSignatureVerifier")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl HmacSignatureVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> BookingResult<Self> {
        let keyed = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|e| BookingError::InvalidConfig(format!("payment.signing_secret: {e}")))?;
        Ok(HmacSignatureVerifier { keyed })
    }

    fn mac(&self, order_ref: &str, payment_ref: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(order_ref.as_bytes());
        mac.update(b"|");
        mac.update(payment_ref.as_bytes());
        mac
    }

    /// Hex signature for an order/payment pair.
    pub fn sign(&self, order_ref: &str, payment_ref: &str) -> String {
        hex::encode(self.mac(order_ref, payment_ref).finalize().into_bytes())
    }

    /// Constant-time comparison against a hex signature. Malformed hex is a
    /// mismatch.
    pub fn verify(&self, order_ref: &str, payment_ref: &str, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            warn!(order_ref = %order_ref, "Callback signature is not valid hex");
            return false;
        };
        self.mac(order_ref, payment_ref).verify_slice(&expected).is_ok()
    }
}
