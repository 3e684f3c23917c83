//! Ed25519 signer with PEM key import and export.

use crate::config::SignerConfig;
use crate::error::{CoreError, CoreResult};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// Length of a digest that is signed without pre-hashing.
pub const DIGEST_LEN: usize = 32;

/// Length of a detached signature.
pub const SIGNATURE_LEN: usize = 64;

/// SHA-256 of `data`.
#[must_use]
pub fn digest(data: &[u8]) -> [u8; DIGEST_LEN] {
    Sha256::digest(data).into()
}

/// Inputs that are already digest-sized are signed as is.
fn prehash(data: &[u8]) -> Cow<'_, [u8]> {
    if data.len() == DIGEST_LEN {
        Cow::Borrowed(data)
    } else {
        Cow::Owned(digest(data).to_vec())
    }
}

fn parse_signature(signature: &[u8]) -> CoreResult<Signature> {
    Signature::from_slice(signature).map_err(|_| CoreError::SignatureInvalid)
}

enum Keys {
    Full(SigningKey),
    VerifyOnly(VerifyingKey),
}

impl Keys {
    fn verifying_key(&self) -> VerifyingKey {
        match self {
            Self::Full(signing) => signing.verifying_key(),
            Self::VerifyOnly(verifying) => *verifying,
        }
    }
}

/// Produces and checks detached signatures over payload digests.
///
/// A signer holds either a full keypair or only a public key. A verify-only
/// signer can check signatures but fails with
/// [`CoreError::MissingPrivateKey`] when asked to sign.
///
/// Inputs that are not exactly 32 bytes are hashed with SHA-256 before
/// signing or verifying, so callers may pass either a precomputed digest or
/// the raw bytes.
pub struct Signer {
    keys: Keys,
}

impl Signer {
    /// Builds a signer from PEM files.
    ///
    /// Tries the private key first, then the public key. If neither yields
    /// usable key material and `auto_generate` is set, a fresh keypair is
    /// generated; the generated key lives only in memory.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if no key could be loaded and
    /// auto-generation is off.
    pub fn new(config: SignerConfig) -> CoreResult<Self> {
        let mut failures = Vec::new();

        if let Some(path) = existing(config.private_key_path.as_deref()) {
            match load_private(path) {
                Ok(key) => {
                    info!(path = %path.display(), "loaded signing key");
                    return Ok(Self::from_signing_key(key));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "private key unusable");
                    failures.push(format!("{}: {e}", path.display()));
                }
            }
        }

        if let Some(path) = existing(config.public_key_path.as_deref()) {
            match load_public(path) {
                Ok(key) => {
                    info!(path = %path.display(), "loaded verify-only key");
                    return Ok(Self::from_verifying_key(key));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "public key unusable");
                    failures.push(format!("{}: {e}", path.display()));
                }
            }
        }

        if !config.auto_generate {
            return Err(CoreError::configuration(if failures.is_empty() {
                "no key files present and auto-generation is disabled".to_string()
            } else {
                failures.join("; ")
            }));
        }

        if !failures.is_empty() {
            warn!("falling back to a generated signing key");
        }
        info!("generated ephemeral signing key");
        Ok(Self::generate())
    }

    /// Creates a signer with a fresh random keypair.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Creates a signer that owns `key`.
    #[must_use]
    pub fn from_signing_key(key: SigningKey) -> Self {
        Self {
            keys: Keys::Full(key),
        }
    }

    /// Creates a verify-only signer.
    #[must_use]
    pub fn from_verifying_key(key: VerifyingKey) -> Self {
        Self {
            keys: Keys::VerifyOnly(key),
        }
    }

    /// Signs `data`, hashing it first unless it is 32 bytes long.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingPrivateKey`] on a verify-only signer.
    pub fn sign(&self, data: &[u8]) -> CoreResult<Vec<u8>> {
        match &self.keys {
            Keys::Full(key) => Ok(key.sign(&prehash(data)).to_bytes().to_vec()),
            Keys::VerifyOnly(_) => Err(CoreError::MissingPrivateKey),
        }
    }

    /// Verifies a detached signature over `data`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SignatureInvalid`] if the signature is malformed
    /// or does not match.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> CoreResult<()> {
        let signature = parse_signature(signature)?;
        self.keys
            .verifying_key()
            .verify(&prehash(data), &signature)
            .map_err(|_| CoreError::SignatureInvalid)
    }

    /// SPKI PEM of the public key, or `None` if it cannot be encoded.
    pub fn export_public_key_pem(&self) -> Option<String> {
        self.keys
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .ok()
    }

    /// PKCS#8 PEM of the private key, or `None` on a verify-only signer.
    pub fn export_private_key_pem(&self) -> Option<Zeroizing<String>> {
        match &self.keys {
            Keys::Full(key) => key.to_pkcs8_pem(LineEnding::LF).ok(),
            Keys::VerifyOnly(_) => None,
        }
    }

    /// Replaces the key material.
    ///
    /// A private key takes precedence. Supplying only a public key turns
    /// this into a verify-only signer. On error the current keys are kept.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidKey`] if the PEM cannot be parsed or no
    /// PEM is supplied.
    pub fn load_keys_from_pem(
        &mut self,
        private_pem: Option<&str>,
        public_pem: Option<&str>,
    ) -> CoreResult<()> {
        let private_pem = private_pem.filter(|p| !p.trim().is_empty());
        let public_pem = public_pem.filter(|p| !p.trim().is_empty());

        self.keys = match (private_pem, public_pem) {
            (Some(pem), _) => Keys::Full(
                SigningKey::from_pkcs8_pem(pem)
                    .map_err(|e| CoreError::invalid_key(format!("private key: {e}")))?,
            ),
            (None, Some(pem)) => Keys::VerifyOnly(decode_public(pem)?),
            (None, None) => return Err(CoreError::invalid_key("no PEM supplied")),
        };
        Ok(())
    }

    /// Returns true if this signer can sign.
    pub fn has_private_key(&self) -> bool {
        matches!(self.keys, Keys::Full(_))
    }

    /// Raw 32-byte public key.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.keys.verifying_key().to_bytes()
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("has_private_key", &self.has_private_key())
            .finish_non_exhaustive()
    }
}

/// Verifies `signature` over `data` with an exported SPKI PEM public key.
///
/// Uses the same pre-hash rule as [`Signer::verify`].
///
/// # Errors
///
/// Returns [`CoreError::InvalidKey`] if the PEM cannot be parsed, or
/// [`CoreError::SignatureInvalid`] if the signature does not match.
pub fn verify_with_public_key_pem(pem: &str, data: &[u8], signature: &[u8]) -> CoreResult<()> {
    Signer::from_verifying_key(decode_public(pem)?).verify(data, signature)
}

fn existing(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| p.exists())
}

fn load_private(path: &Path) -> CoreResult<SigningKey> {
    let pem = Zeroizing::new(std::fs::read_to_string(path)?);
    SigningKey::from_pkcs8_pem(&pem).map_err(|e| CoreError::invalid_key(e.to_string()))
}

fn load_public(path: &Path) -> CoreResult<VerifyingKey> {
    decode_public(&std::fs::read_to_string(path)?)
}

fn decode_public(pem: &str) -> CoreResult<VerifyingKey> {
    VerifyingKey::from_public_key_pem(pem)
        .map_err(|e| CoreError::invalid_key(format!("public key: {e}")))
}
