//! Payment gateway integration: callback signature checks and the remote
//! order client.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{MarketplaceError, Result};

pub mod gateway;

pub use gateway::{GatewayError, GatewayOrder, PaymentGateway, RazorpayGateway};

type HmacSha256 = Hmac<Sha256>;

/// A callback whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub gateway_order_id: String,
    pub payment_id: String,
}

fn mac(gateway_order_id: &str, payment_id: &str, secret: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
        tracing::error!(operation = "payments.mac", error = %e, "unusable payment secret");
        MarketplaceError::Internal("payments.mac".into())
    })?;
    mac.update(gateway_order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Ok(mac)
}

/// Hex HMAC-SHA256 of `gateway_order_id|payment_id`, as the gateway computes it.
pub fn sign(gateway_order_id: &str, payment_id: &str, secret: &str) -> Result<String> {
    Ok(hex::encode(mac(gateway_order_id, payment_id, secret)?.finalize().into_bytes()))
}

/// Hex length of an HMAC-SHA256 digest.
const SIGNATURE_LEN: usize = 64;

/// The gateway only ever sends lowercase hex; any other spelling of the same
/// bytes is a different signature.
fn is_canonical_hex(signature: &str) -> bool {
    signature.len() == SIGNATURE_LEN && signature.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Checks a gateway callback signature in constant time.
pub fn verify_payment(gateway_order_id: &str, payment_id: &str, signature: &str, secret: &str) -> Result<Verified> {
    if !is_canonical_hex(signature) { return Err(MarketplaceError::SignatureMismatch); }
    let supplied = hex::decode(signature).map_err(|_| MarketplaceError::SignatureMismatch)?;
    mac(gateway_order_id, payment_id, secret)?
        .verify_slice(&supplied)
        .map_err(|_| MarketplaceError::SignatureMismatch)?;
    Ok(Verified { gateway_order_id: gateway_order_id.to_string(), payment_id: payment_id.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "rzp_test_secret";

    #[test]
    fn test_valid_signature_verifies() {
        let sig = sign("order_ABC", "pay_XYZ", SECRET).unwrap();
        let v = verify_payment("order_ABC", "pay_XYZ", &sig, SECRET).unwrap();
        assert_eq!(v.payment_id, "pay_XYZ");
    }

    #[test]
    fn test_signature_shape() {
        let sig = sign("order_1", "pay_1", "secret").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(sig, sign("order_1", "pay_1", "secret2").unwrap());
    }

    #[test]
    fn test_any_single_byte_mutation_fails() {
        let sig = sign("order_ABC", "pay_XYZ", SECRET).unwrap();
        for i in 0..sig.len() {
            let mut bytes = sig.clone().into_bytes();
            bytes[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
            let mutated = String::from_utf8(bytes).unwrap();
            assert_eq!(
                verify_payment("order_ABC", "pay_XYZ", &mutated, SECRET),
                Err(MarketplaceError::SignatureMismatch),
                "mutation at byte {i} verified"
            );
        }
    }

    #[test]
    fn test_case_changed_signature_fails() {
        let sig = sign("order_ABC", "pay_XYZ", SECRET).unwrap();
        for (i, c) in sig.char_indices().filter(|(_, c)| c.is_ascii_alphabetic()) {
            let mut upper = sig.clone();
            upper.replace_range(i..=i, &c.to_ascii_uppercase().to_string());
            assert_eq!(verify_payment("order_ABC", "pay_XYZ", &upper, SECRET), Err(MarketplaceError::SignatureMismatch), "uppercased byte {i} verified");
        }
        assert!(verify_payment("order_ABC", "pay_XYZ", &sig.to_uppercase(), SECRET).is_err());
    }

    #[test]
    fn test_padded_signature_fails() {
        let sig = sign("order_ABC", "pay_XYZ", SECRET).unwrap();
        assert!(verify_payment("order_ABC", "pay_XYZ", &sig, SECRET).is_ok());
        assert!(verify_payment("order_ABC", "pay_XYZ", &format!(" {sig}"), SECRET).is_err());
        assert!(verify_payment("order_ABC", "pay_XYZ", &format!("{sig}\n"), SECRET).is_err());
    }

    #[test]
    fn test_wrong_secret_or_fields_fail() {
        let sig = sign("order_ABC", "pay_XYZ", SECRET).unwrap();
        assert!(verify_payment("order_ABC", "pay_XYZ", &sig, "other").is_err());
        assert!(verify_payment("order_ABD", "pay_XYZ", &sig, SECRET).is_err());
        assert!(verify_payment("order_ABC", "pay_XYZ", "not-hex", SECRET).is_err());
        assert!(verify_payment("order_ABC", "pay_XYZ", "", SECRET).is_err());
    }
}
