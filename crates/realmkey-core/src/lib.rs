//! RealmKey Core
//!
//! Deterministic keys and passwords from a master password and a realm.
//!
//! # Derivation
//!
//! (password, realm, optional seed) feeds an Argon2id + SHAKE256 byte
//! stream. Generators for EC P-256/384/521, RSA-2048/4096, X25519,
//! Ed25519 and passwords draw from it, so the same inputs always
//! reproduce the same output.
//!
//! # Encrypted Seed
//!
//! A 64-byte random seed, encrypted at rest with Argon2id + AES-256-GCM,
//! adds entropy beyond the master password. Keys derived without one
//! require an explicit opt-in.

pub mod encode;
pub mod keys;
pub mod password;
pub mod seed;
pub mod stream;

pub use encode::{encode_to_der, encode_to_pem, write_pem, EncodeError};
pub use keys::{
    generate_key, get_key, get_raw_bytes, KeyError, KeyType, PrivateKey, MAX_RAW_LENGTH,
};
pub use password::{generate_password, get_password, CharClass, PasswordError, PasswordSpec};
pub use seed::{decrypt_seed, encrypt_seed, generate_encrypted_seed, EncryptedSeed, Seed, SeedError};
pub use stream::{new_stream, Stream, StreamError, StreamKey};
