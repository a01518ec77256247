//! Key derivation and salt generation for OneCloud payloads.

use std::fmt;

use pkcs12::kdf::{derive_key_utf8, Pkcs12KeyType};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::types::{OneCloudError, Result, KDF_ITERATIONS, KEY_SIZE, SALT_SIZE};

/// A derived AES-256 key. Wiped from memory on drop.
#[derive(Clone)]
pub struct SymmetricKey(Zeroizing<[u8; KEY_SIZE]>);

impl SymmetricKey {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Derive a 256-bit key from a passphrase and salt.
///
/// Uses the PKCS#12 key derivation (RFC 7292 appendix B) over SHA-256 with
/// [`KDF_ITERATIONS`] rounds, the scheme the coordinator keys its streams
/// with. The passphrase is fed in as a null-terminated UTF-16BE string.
///
/// # Arguments
/// * `passphrase` - Shared secret, must not be empty
/// * `salt` - Salt bytes (for session salts, the bytes of the hex text)
pub fn derive_key(passphrase: &str, salt: &[u8]) -> Result<SymmetricKey> {
    derive_key_with_iterations(passphrase, salt, KDF_ITERATIONS)
}

/// Derive a key with an explicit iteration count.
///
/// Deterministic for a given `(passphrase, salt, iterations)` triple.
pub fn derive_key_with_iterations(
    passphrase: &str,
    salt: &[u8],
    iterations: u32,
) -> Result<SymmetricKey> {
    if passphrase.is_empty() {
        return Err(OneCloudError::KeyDerivation(
            "Passphrase must not be empty".to_string(),
        ));
    }
    if iterations == 0 {
        return Err(OneCloudError::KeyDerivation(
            "Iteration count must be positive".to_string(),
        ));
    }

    let rounds = i32::try_from(iterations).map_err(|_| {
        OneCloudError::KeyDerivation(format!("Iteration count {} out of range", iterations))
    })?;

    let derived = Zeroizing::new(
        derive_key_utf8::<Sha256>(passphrase, salt, Pkcs12KeyType::EncryptionKey, rounds, KEY_SIZE)
            .map_err(|e| OneCloudError::KeyDerivation(format!("PKCS#12 KDF failed: {}", e)))?,
    );

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(&derived);
    Ok(SymmetricKey(key))
}

/// Generate a fresh random salt, hex-encoded for embedding in a text extra.
///
/// # Returns
/// 40 lowercase hex characters ([`SALT_SIZE`] random bytes)
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    hex::encode(salt)
}
