//! Encrypted seed management
//!
//! A seed is 64 bytes of OS randomness that strengthens derivation beyond
//! the master password. It is stored encrypted under the master password
//! using Argon2id + AES-256-GCM.
//!
//! # Blob Layout
//!
//! ```text
//! [version (1)][salt (16)][nonce (12)][ciphertext + tag (64 + 16)]
//! ```
//!
//! The version byte is authenticated as associated data, so a blob whose
//! header was altered fails to open just like one with a wrong password.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Key, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

/// Argon2id parameters for the seed encryption key.
/// - m_cost: 64 MiB memory
/// - t_cost: 3 iterations
/// - p_cost: 4 lanes
const ARGON2_M_COST: u32 = 65536;
const ARGON2_T_COST: u32 = 3;
const ARGON2_P_COST: u32 = 4;
const ARGON2_OUTPUT_LEN: usize = 32;

/// Current blob format version
pub const BLOB_VERSION: u8 = 1;

/// Length of the raw seed in bytes
pub const SEED_LEN: usize = 64;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + SALT_LEN + NONCE_LEN;

/// Total serialized length of an [`EncryptedSeed`]
pub const BLOB_LEN: usize = HEADER_LEN + SEED_LEN + TAG_LEN;

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("Decryption failed: invalid password or corrupted seed")]
    DecryptionFailed,
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
    #[error("Invalid seed blob format")]
    InvalidFormat,
    #[error("Unsupported seed blob version: {0}")]
    UnsupportedVersion(u8),
}

/// Decrypted seed bytes, zeroized on drop.
pub struct Seed(Zeroizing<[u8; SEED_LEN]>);

impl Seed {
    /// Fresh seed from the OS CSPRNG
    pub fn random() -> Self {
        let mut bytes = Zeroizing::new([0u8; SEED_LEN]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

// No Debug or Clone for Seed: its bytes are never printed or copied.

/// Password-encrypted seed, safe to persist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedSeed {
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
    /// Encrypted seed + authentication tag
    ciphertext: Vec<u8>,
}

impl EncryptedSeed {
    /// Generate a fresh random seed and encrypt it under `password`.
    ///
    /// Every call produces a different blob, even for the same password.
    pub fn generate(password: &str) -> Result<Self, SeedError> {
        let seed = Seed::random();
        encrypt_seed(&seed, password)
    }

    /// Decrypt the seed with the password it was generated under.
    pub fn open(&self, password: &str) -> Result<Seed, SeedError> {
        decrypt_seed(self, password)
    }

    /// Serialize to bytes: version || salt || nonce || ciphertext
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        bytes.push(BLOB_VERSION);
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SeedError> {
        let (&version, rest) = bytes.split_first().ok_or(SeedError::InvalidFormat)?;
        if version != BLOB_VERSION {
            return Err(SeedError::UnsupportedVersion(version));
        }
        if bytes.len() != BLOB_LEN {
            return Err(SeedError::InvalidFormat);
        }

        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        salt.copy_from_slice(&rest[..SALT_LEN]);
        nonce.copy_from_slice(&rest[SALT_LEN..SALT_LEN + NONCE_LEN]);
        let ciphertext = rest[SALT_LEN + NONCE_LEN..].to_vec();

        Ok(Self {
            salt,
            nonce,
            ciphertext,
        })
    }
}

/// Derive the seed encryption key from a password using Argon2id
fn derive_key(
    password: &str,
    salt: &[u8; SALT_LEN],
) -> Result<Zeroizing<[u8; ARGON2_OUTPUT_LEN]>, SeedError> {
    let params = Params::new(
        ARGON2_M_COST,
        ARGON2_T_COST,
        ARGON2_P_COST,
        Some(ARGON2_OUTPUT_LEN),
    )
    .map_err(|e| SeedError::KeyDerivationFailed(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; ARGON2_OUTPUT_LEN]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key[..])
        .map_err(|e| SeedError::KeyDerivationFailed(e.to_string()))?;

    Ok(key)
}

/// Encrypt an existing seed under `password` with a fresh salt and nonce.
pub fn encrypt_seed(seed: &Seed, password: &str) -> Result<EncryptedSeed, SeedError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let nonce_arr = Aes256Gcm::generate_nonce(&mut OsRng);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&nonce_arr);

    let key = derive_key(password, &salt)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: seed.as_bytes(),
                aad: &[BLOB_VERSION],
            },
        )
        .map_err(|e| SeedError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedSeed {
        salt,
        nonce,
        ciphertext,
    })
}

/// Decrypt an encrypted seed with a password
///
/// # Errors
/// Returns [`SeedError::DecryptionFailed`] if the password is wrong or the
/// blob was tampered with. No partial seed is ever returned.
pub fn decrypt_seed(encrypted: &EncryptedSeed, password: &str) -> Result<Seed, SeedError> {
    let key = derive_key(password, &encrypted.salt)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(
                Nonce::from_slice(&encrypted.nonce),
                Payload {
                    msg: encrypted.ciphertext.as_slice(),
                    aad: &[BLOB_VERSION],
                },
            )
            .map_err(|_| SeedError::DecryptionFailed)?,
    );

    if plaintext.len() != SEED_LEN {
        return Err(SeedError::InvalidFormat);
    }

    let mut bytes = [0u8; SEED_LEN];
    bytes.copy_from_slice(&plaintext);
    let seed = Seed::from_bytes(bytes);
    zeroize::Zeroize::zeroize(&mut bytes);
    log::debug!("opened encrypted seed (format v{})", BLOB_VERSION);
    Ok(seed)
}

/// Generate a new encrypted seed for `password`.
pub fn generate_encrypted_seed(password: &str) -> Result<EncryptedSeed, SeedError> {
    EncryptedSeed::generate(password)
}
