//! Deterministic byte stream
//!
//! Turns (master password, realm, optional seed) into an unbounded,
//! reproducible pseudorandom byte stream. Every generator in this crate
//! draws from it.
//!
//! # Construction
//!
//! 1. Argon2id stretches the master password into a 32-byte stream key.
//!    The salt is a domain tag followed by the length-prefixed realm and
//!    seed bytes, so no two (realm, seed) pairs share a salt.
//! 2. SHAKE256 absorbs the stream key and is squeezed on demand.
//!
//! The KDF runs once per [`StreamKey`]; [`StreamKey::stream`] restarts the
//! expansion from byte zero without re-deriving.

use argon2::{Algorithm, Argon2, Params, Version};
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Shake256, Shake256Reader};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::seed::Seed;

/// Argon2id parameters for the stream key (OWASP minimum profile).
const ARGON2_M_COST: u32 = 19456; // 19 MiB
const ARGON2_T_COST: u32 = 2;
const ARGON2_P_COST: u32 = 1;
const STREAM_KEY_LEN: usize = 32;

const SALT_DOMAIN: &[u8] = b"realmkey/stream-salt/v1";
const EXPAND_DOMAIN: &[u8] = b"realmkey/stream-expand/v1";

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Stream key derivation failed: {0}")]
    KeyDerivationFailed(String),
}

/// Key from which a [`Stream`] is expanded.
pub struct StreamKey(Zeroizing<[u8; STREAM_KEY_LEN]>);

impl StreamKey {
    /// Run the password KDF for (password, realm, seed).
    pub fn derive(password: &str, realm: &str, seed: Option<&Seed>) -> Result<Self, StreamError> {
        let salt = stream_salt(realm, seed.map(|s| &s.as_bytes()[..]).unwrap_or_default());

        let params = Params::new(
            ARGON2_M_COST,
            ARGON2_T_COST,
            ARGON2_P_COST,
            Some(STREAM_KEY_LEN),
        )
        .map_err(|e| StreamError::KeyDerivationFailed(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; STREAM_KEY_LEN]);
        argon2
            .hash_password_into(password.as_bytes(), &salt, &mut key[..])
            .map_err(|e| StreamError::KeyDerivationFailed(e.to_string()))?;

        log::debug!(
            "derived stream key (realm length {}, seeded: {})",
            realm.len(),
            seed.is_some()
        );
        Ok(Self(key))
    }

    /// A fresh stream positioned at byte zero.
    pub fn stream(&self) -> Stream {
        let mut xof = Shake256::default();
        xof.update(EXPAND_DOMAIN);
        xof.update(&self.0[..]);
        Stream {
            reader: xof.finalize_xof(),
            consumed: 0,
        }
    }
}

/// Salt layout: domain || len(realm) as u64 BE || realm || len(seed) as u64 BE || seed
fn stream_salt(realm: &str, seed: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut salt = Zeroizing::new(Vec::with_capacity(
        SALT_DOMAIN.len() + 16 + realm.len() + seed.len(),
    ));
    salt.extend_from_slice(SALT_DOMAIN);
    salt.extend_from_slice(&(realm.len() as u64).to_be_bytes());
    salt.extend_from_slice(realm.as_bytes());
    salt.extend_from_slice(&(seed.len() as u64).to_be_bytes());
    salt.extend_from_slice(seed);
    salt
}

/// Unbounded deterministic byte stream.
pub struct Stream {
    reader: Shake256Reader,
    consumed: u64,
}

impl Stream {
    /// Fill `buf` with the next `buf.len()` bytes.
    pub fn fill(&mut self, buf: &mut [u8]) {
        self.reader.read(buf);
        self.consumed += buf.len() as u64;
    }

    /// Next `n` bytes.
    pub fn next_bytes(&mut self, n: usize) -> Zeroizing<Vec<u8>> {
        let mut buf = Zeroizing::new(vec![0u8; n]);
        self.fill(&mut buf);
        buf
    }

    pub fn next_u8(&mut self) -> u8 {
        let mut b = [0u8; 1];
        self.fill(&mut b);
        b[0]
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut b = [0u8; 4];
        self.fill(&mut b);
        u32::from_be_bytes(b)
    }

    /// Total bytes drawn since the stream started.
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }
}

/// Derive the key and open a stream in one step.
pub fn new_stream(password: &str, realm: &str, seed: Option<&Seed>) -> Result<Stream, StreamError> {
    Ok(StreamKey::derive(password, realm, seed)?.stream())
}
