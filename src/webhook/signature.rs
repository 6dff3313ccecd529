//! Webhook signature verification.
//!
//! The gateway signs each webhook body with RSA PKCS#1 v1.5 over SHA-256
//! and announces the signature in a header of the form
//! `v1 <key_id> <algorithm> <base64 signature>`. Verification never
//! panics and never errors: every delivery maps onto a [`Verification`]
//! outcome, and the caller decides what each outcome means under the
//! configured [`SignatureMode`](crate::config::SignatureMode).

use std::sync::Arc;

use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::sha2::Sha256;
use rsa::signature::Verifier;

use crate::webhook::key_store::{KeyStore, decode_base64_loose};

/// Outcome of verifying one webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The signature matches the body under the announced key.
    Valid {
        /// Key id the signature verified against.
        key_id: String,
    },
    /// The key was available but the signature does not match.
    Invalid {
        /// Key id the signature was checked against.
        key_id: String,
    },
    /// The check could not be performed at all.
    Unverifiable {
        /// Why the check could not run.
        reason: String,
    },
}

#[derive(Debug)]
struct SignatureHeader {
    key_id: String,
    algorithm: String,
    signature: String,
}

/// Verifies webhook signatures against keys from a [`KeyStore`].
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    keys: Arc<KeyStore>,
}

impl SignatureVerifier {
    /// Creates a verifier backed by the given key store.
    #[must_use]
    pub fn new(keys: Arc<KeyStore>) -> Self {
        Self { keys }
    }

    /// Verifies `body` against the signature header of one delivery.
    ///
    /// `header` is the raw signature header value, if the request
    /// carried one. Tokens beyond the fourth are ignored.
    pub async fn verify(&self, header: Option<&str>, body: &[u8]) -> Verification {
        let Some(header) = header else {
            return Verification::Unverifiable {
                reason: "signature header missing".to_string(),
            };
        };
        let Some(parsed) = parse_signature_header(header) else {
            return Verification::Unverifiable {
                reason: "malformed signature header".to_string(),
            };
        };

        let key = match self.keys.get(&parsed.key_id).await {
            Ok(key) => key,
            Err(error) => {
                return Verification::Unverifiable {
                    reason: format!("key {} unavailable: {error}", parsed.key_id),
                };
            }
        };

        let Some(signature_bytes) = decode_base64_loose(parsed.signature.as_bytes()) else {
            tracing::debug!(
                key_id = %parsed.key_id,
                algorithm = %parsed.algorithm,
                "signature is not valid base64"
            );
            return Verification::Unverifiable {
                reason: "signature is not valid base64".to_string(),
            };
        };
        let Ok(signature) = Signature::try_from(signature_bytes.as_slice()) else {
            return Verification::Unverifiable {
                reason: "signature bytes are not a valid RSA signature".to_string(),
            };
        };

        let verifying_key = VerifyingKey::<Sha256>::new(key);
        match verifying_key.verify(body, &signature) {
            Ok(()) => Verification::Valid {
                key_id: parsed.key_id,
            },
            Err(_) => Verification::Invalid {
                key_id: parsed.key_id,
            },
        }
    }
}

/// Splits a `v1 <key_id> <algorithm> <base64 signature>` header on
/// whitespace. Fewer than four tokens, or a version other than `v1`,
/// is malformed.
fn parse_signature_header(header: &str) -> Option<SignatureHeader> {
    let mut tokens = header.split_whitespace();
    let version = tokens.next()?;
    if version != "v1" {
        return None;
    }
    let key_id = tokens.next()?;
    let algorithm = tokens.next()?;
    let signature = tokens.next()?;
    Some(SignatureHeader {
        key_id: key_id.to_string(),
        algorithm: algorithm.to_string(),
        signature: signature.to_string(),
    })
}
