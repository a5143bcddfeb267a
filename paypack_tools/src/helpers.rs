use duka_common::Money;
use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha256;

use crate::PaypackApiError;

type HmacSha256 = Hmac<Sha256>;

/// The header Paypack uses to sign webhook calls.
pub const SIGNATURE_HEADER: &str = "X-Paypack-Signature";

/// Base64-encoded HMAC-SHA256 of `body`, keyed with the webhook secret.
pub fn calculate_signature(secret: &str, body: &[u8]) -> String {
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(body);
            base64::encode(mac.finalize().into_bytes())
        },
        // Hmac accepts keys of any length
        Err(_) => String::default(),
    }
}

/// Checks the signature header against the body in constant time.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = base64::decode(signature.trim()) else {
        debug!("🔐️ Webhook signature is not valid base64");
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Paypack transacts in whole francs.
pub fn paypack_amount(amount: Money) -> Result<i64, PaypackApiError> {
    if !amount.is_positive() {
        return Err(PaypackApiError::InvalidAmount(format!("{amount} is not a positive amount")));
    }
    Ok(amount.value())
}
