//! Signing support for tamper-evident entries.
//!
//! Entries are signed with Ed25519 over a 32-byte digest. Keys are exchanged
//! as PEM: PKCS#8 for private keys, SPKI for public keys.

mod signer;

pub use signer::{digest, verify_with_public_key_pem, Signer, DIGEST_LEN, SIGNATURE_LEN};
