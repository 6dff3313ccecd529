//! Verification-key retrieval and caching.
//!
//! The gateway publishes RSA verification keys at
//! `{base}/{key_id}`, but the material format varies by deployment:
//! PEM or DER, certificate or bare `SubjectPublicKeyInfo`, sometimes
//! base64-wrapped DER. [`decode_key_material`] tries each form in a
//! fixed order; [`KeyStore`] caches decoded keys and refetches them
//! after a configurable age.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rsa::RsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use tokio::sync::RwLock;
use x509_cert::Certificate;
use x509_cert::der::{Decode, DecodePem, Encode};

use crate::error::GatewayError;

#[derive(Debug)]
struct CachedKey {
    key: RsaPublicKey,
    fetched_at: Instant,
}

/// Fetches and caches RSA verification keys by key id.
#[derive(Debug)]
pub struct KeyStore {
    http: reqwest::Client,
    base_url: String,
    refresh_after: Duration,
    cache: RwLock<HashMap<String, CachedKey>>,
}

impl KeyStore {
    /// Creates a store fetching keys from `base_url` with the given
    /// per-fetch timeout. Cached keys older than `refresh_after` are
    /// refetched on next use.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::GatewayTransport`] if the HTTP client
    /// cannot be constructed.
    pub fn new(
        base_url: &str,
        fetch_timeout: Duration,
        refresh_after: Duration,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(fetch_timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            refresh_after,
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the verification key for `key_id`, fetching it when the
    /// cache has no fresh entry.
    ///
    /// When a refresh fails but a stale key is still cached, the stale
    /// key is returned so signature checks keep working across transient
    /// key-endpoint outages.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::KeyUnavailable`] when the key can neither
    /// be fetched nor served from cache.
    pub async fn get(&self, key_id: &str) -> Result<RsaPublicKey, GatewayError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(key_id) {
                if entry.fetched_at.elapsed() < self.refresh_after {
                    return Ok(entry.key.clone());
                }
            }
        }

        // Concurrent misses may fetch the same key more than once; the
        // last write wins.
        match self.fetch(key_id).await {
            Ok(key) => {
                let mut cache = self.cache.write().await;
                cache.insert(
                    key_id.to_string(),
                    CachedKey {
                        key: key.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(key)
            }
            Err(error) => {
                let cache = self.cache.read().await;
                if let Some(entry) = cache.get(key_id) {
                    tracing::warn!(key_id, %error, "key refresh failed, serving stale key");
                    return Ok(entry.key.clone());
                }
                Err(error)
            }
        }
    }

    async fn fetch(&self, key_id: &str) -> Result<RsaPublicKey, GatewayError> {
        let url = format!("{}/{key_id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::KeyUnavailable(format!("fetch failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::KeyUnavailable(format!(
                "key endpoint returned status {status}"
            )));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::KeyUnavailable(format!("failed reading key body: {e}")))?;
        let Some((key, key_format)) = decode_key_material(&body) else {
            return Err(GatewayError::KeyUnavailable(
                "unrecognized key material format".to_string(),
            ));
        };
        tracing::info!(key_id, key_format, "verification key fetched");
        Ok(key)
    }
}

/// Decodes RSA public key material, trying each supported format in a
/// fixed order: PEM certificate, PEM public key, DER certificate, DER
/// public key, then the two DER forms base64-wrapped.
///
/// Returns the key together with a label naming the format that matched.
#[must_use]
pub fn decode_key_material(data: &[u8]) -> Option<(RsaPublicKey, &'static str)> {
    if let Some(key) = pem_certificate_key(data) {
        return Some((key, "pem certificate"));
    }
    if let Some(key) = pem_public_key(data) {
        return Some((key, "pem public key"));
    }
    if let Some(key) = der_certificate_key(data) {
        return Some((key, "der certificate"));
    }
    if let Ok(key) = RsaPublicKey::from_public_key_der(data) {
        return Some((key, "der public key"));
    }
    if let Some(decoded) = decode_base64_loose(data) {
        if let Some(key) = der_certificate_key(&decoded) {
            return Some((key, "base64 der certificate"));
        }
        if let Ok(key) = RsaPublicKey::from_public_key_der(&decoded) {
            return Some((key, "base64 der public key"));
        }
    }
    None
}

/// Base64-decodes `data` after stripping ASCII whitespace, so wrapped or
/// newline-separated encodings still decode.
#[must_use]
pub fn decode_base64_loose(data: &[u8]) -> Option<Vec<u8>> {
    let compact: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    BASE64.decode(compact).ok()
}

fn pem_certificate_key(data: &[u8]) -> Option<RsaPublicKey> {
    let cert = Certificate::from_pem(data).ok()?;
    certificate_public_key(&cert)
}

fn pem_public_key(data: &[u8]) -> Option<RsaPublicKey> {
    let text = std::str::from_utf8(data).ok()?;
    RsaPublicKey::from_public_key_pem(text).ok()
}

fn der_certificate_key(data: &[u8]) -> Option<RsaPublicKey> {
    let cert = Certificate::from_der(data).ok()?;
    certificate_public_key(&cert)
}

fn certificate_public_key(cert: &Certificate) -> Option<RsaPublicKey> {
    let spki = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .ok()?;
    RsaPublicKey::from_public_key_der(&spki).ok()
}
