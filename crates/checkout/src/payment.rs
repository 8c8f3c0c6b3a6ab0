//! Gateway payment signature checks.
//!
//! The gateway signs `gateway_order_id|payment_id` with the shared key secret
//! using HMAC-SHA256 and sends the hex digest alongside the payment id.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct PaymentSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for PaymentSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentSigner").finish_non_exhaustive()
    }
}

impl PaymentSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, gateway_order_id: &str, payment_id: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(gateway_order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        Some(mac)
    }

    /// Hex-encoded signature the gateway would send for this payment.
    pub fn sign(&self, gateway_order_id: &str, payment_id: &str) -> Option<String> {
        let mac = self.mac(gateway_order_id, payment_id)?;
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// Checks a hex signature in constant time. Malformed hex is rejected.
    pub fn verify(&self, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool {
        let Ok(signature) = hex::decode(signature.trim()) else {
            return false;
        };
        self.mac(gateway_order_id, payment_id)
            .is_some_and(|mac| mac.verify_slice(&signature).is_ok())
    }
}
