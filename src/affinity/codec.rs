//! Authenticated encryption of backend addresses.
//!
//! Cookie payloads are NaCl `secretbox` (XSalsa20-Poly1305) boxes laid out as
//! `nonce(24) ‖ ciphertext`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crypto_secretbox::aead::generic_array::GenericArray;
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::XSalsa20Poly1305;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use thiserror::Error;

/// Affinity key length in bytes.
pub const KEY_LEN: usize = 32;

/// Nonce length in bytes, prepended to every sealed payload.
pub const NONCE_LEN: usize = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("affinity key is not valid base64")]
    Encoding,
    #[error("affinity key must be 32 bytes, got {0}")]
    Length(usize),
}

/// The 256-bit secret all sticky cookies are sealed with.
#[derive(Clone, PartialEq, Eq)]
pub struct AffinityKey([u8; KEY_LEN]);

impl AffinityKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a random key from the OS source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse a standard-alphabet base64 key.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| KeyError::Encoding)?;
        let len = bytes.len();
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| KeyError::Length(len))?;
        Ok(Self(bytes))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl std::fmt::Debug for AffinityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AffinityKey(..)")
    }
}

/// Seals and opens sticky cookie payloads under one [`AffinityKey`].
#[derive(Clone, Debug)]
pub struct StickyCodec {
    key: AffinityKey,
}

impl StickyCodec {
    pub fn new(key: AffinityKey) -> Self {
        Self { key }
    }

    fn cipher(&self) -> XSalsa20Poly1305 {
        XSalsa20Poly1305::new(GenericArray::from_slice(&self.key.0))
    }

    /// Seal `plaintext` under a fresh nonce from the OS random source.
    ///
    /// # Panics
    ///
    /// Panics if the OS random source cannot produce bytes.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, crypto_secretbox::aead::Error> {
        self.seal_with(&mut OsRng, plaintext)
    }

    /// Seal `plaintext` with a nonce drawn from `rng`.
    ///
    /// # Panics
    ///
    /// Panics if `rng` fails to fill the nonce.
    pub fn seal_with<R>(
        &self,
        rng: &mut R,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, crypto_secretbox::aead::Error>
    where
        R: RngCore + CryptoRng,
    {
        let mut nonce = [0u8; NONCE_LEN];
        if let Err(e) = rng.try_fill_bytes(&mut nonce) {
            panic!("secure random source unavailable: {e}");
        }

        let sealed = self
            .cipher()
            .encrypt(GenericArray::from_slice(&nonce), plaintext)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Open a `nonce ‖ ciphertext` payload.
    ///
    /// Short input and failed authentication both yield `None`.
    pub fn open(&self, data: &[u8]) -> Option<Vec<u8>> {
        if data.len() < NONCE_LEN {
            return None;
        }
        let (nonce, sealed) = data.split_at(NONCE_LEN);
        self.cipher()
            .decrypt(GenericArray::from_slice(nonce), sealed)
            .ok()
    }

    /// Seal a backend address.
    pub fn seal_backend(&self, backend: &str) -> Result<Vec<u8>, crypto_secretbox::aead::Error> {
        self.seal(backend.as_bytes())
    }

    /// Open a payload and interpret it as a backend address.
    pub fn open_backend(&self, data: &[u8]) -> Option<String> {
        String::from_utf8(self.open(data)?).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn codec(seed: u8) -> StickyCodec {
        StickyCodec::new(AffinityKey::new([seed; KEY_LEN]))
    }

    #[test]
    fn round_trip() {
        let codec = codec(7);
        for addr in ["10.0.0.1:8080", "backend.internal:443", ""] {
            let sealed = codec.seal_backend(addr).unwrap();
            assert_eq!(codec.open_backend(&sealed).as_deref(), Some(addr));
        }
    }

    #[test]
    fn payload_layout() {
        let codec = codec(1);
        let sealed = codec.seal(b"10.0.0.1:8080").unwrap();
        // nonce + plaintext + 16 byte Poly1305 tag
        assert_eq!(sealed.len(), NONCE_LEN + 13 + 16);
    }

    #[test]
    fn every_seal_uses_a_fresh_nonce() {
        let codec = codec(2);
        let a = codec.seal(b"10.0.0.1:8080").unwrap();
        let b = codec.seal(b"10.0.0.1:8080").unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn seal_with_injected_rng_is_deterministic() {
        let codec = codec(3);
        let a = codec
            .seal_with(&mut StdRng::seed_from_u64(9), b"10.0.0.1:8080")
            .unwrap();
        let b = codec
            .seal_with(&mut StdRng::seed_from_u64(9), b"10.0.0.1:8080")
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn any_flipped_byte_fails_authentication() {
        let codec = codec(4);
        let sealed = codec.seal(b"10.0.0.2:8080").unwrap();
        for i in 0..sealed.len() {
            let mut tampered = sealed.clone();
            tampered[i] ^= 0x01;
            assert_eq!(codec.open(&tampered), None, "flip at byte {i} was accepted");
        }
    }

    #[test]
    fn foreign_key_fails() {
        let sealed = codec(5).seal(b"10.0.0.3:8080").unwrap();
        assert_eq!(codec(6).open(&sealed), None);
    }

    #[test]
    fn short_input_is_absent() {
        let codec = codec(8);
        assert_eq!(codec.open(&[]), None);
        assert_eq!(codec.open(&[0u8; NONCE_LEN - 1]), None);
        // a bare nonce has no tag to authenticate
        assert_eq!(codec.open(&[0u8; NONCE_LEN]), None);

        let sealed = codec.seal(b"10.0.0.4:8080").unwrap();
        assert_eq!(codec.open(&sealed[..sealed.len() - 1]), None);
    }

    #[test]
    fn key_from_base64() {
        let key = AffinityKey::new([42; KEY_LEN]);
        assert_eq!(AffinityKey::from_base64(&key.to_base64()), Ok(key));
        assert_eq!(AffinityKey::from_base64("not base64!"), Err(KeyError::Encoding));
        assert_eq!(AffinityKey::from_base64("AAAA"), Err(KeyError::Length(3)));
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = AffinityKey::new([0xAB; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "AffinityKey(..)");
    }
}
