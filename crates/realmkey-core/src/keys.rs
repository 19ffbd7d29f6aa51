//! Deterministic private key generation
//!
//! Every key type draws from a [`Stream`], so the same (password, realm,
//! seed) always yields the same key:
//!
//! | Key type        | Strategy                                                |
//! |-----------------|---------------------------------------------------------|
//! | EC P-256/384/521| scalar candidates, rejected until within [1, n-1]       |
//! | RSA 2048/4096   | odd half-size prime candidates, e = 65537               |
//! | X25519          | 32 bytes, clamped by the primitive                      |
//! | Ed25519         | 32-byte seed, expanded per RFC 8032                     |
//!
//! Deriving a key without a seed is refused unless the caller opts in.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::SigningKey;
use num_bigint_dig::prime::probably_prime;
use p256::elliptic_curve::{CurveArithmetic, FieldBytes, SecretKey};
use rsa::{BigUint, RsaPrivateKey};
use thiserror::Error;
use x25519_dalek::StaticSecret;
use zeroize::{Zeroize, Zeroizing};

use crate::seed::{EncryptedSeed, Seed, SeedError};
use crate::stream::{new_stream, Stream, StreamError};

/// Candidate scalars drawn before giving up on an EC key
const MAX_EC_ATTEMPTS: u32 = 128;

/// Candidates drawn per RSA prime before giving up
const MAX_PRIME_CANDIDATES: u32 = 200_000;

/// Prime pairs drawn before giving up on an RSA key
const MAX_RSA_ATTEMPTS: u32 = 16;

/// Longest raw byte output [`get_raw_bytes`] will produce
pub const MAX_RAW_LENGTH: usize = 1 << 20;

/// Miller-Rabin rounds (followed by a Lucas test)
const PRIME_ROUNDS: usize = 20;

const RSA_EXPONENT: u32 = 65537;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Refusing to generate a key without a seed; pass allow_unsafe to override")]
    UnsafeGeneration,
    #[error("Generation exhausted: no valid {what} after {attempts} attempts")]
    GenerationExhausted { what: &'static str, attempts: u32 },
    #[error("Key construction failed: {0}")]
    Construction(String),
    #[error("Raw length {requested} exceeds maximum of {max}")]
    RawLengthTooLarge { requested: usize, max: usize },
    #[error("Unknown key type: {0}")]
    UnknownKeyType(String),
    #[error(transparent)]
    Seed(#[from] SeedError),
    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Supported key types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Ec256,
    Ec384,
    Ec521,
    Rsa2048,
    Rsa4096,
    X25519,
    Ed25519,
}

impl KeyType {
    pub const ALL: [KeyType; 7] = [
        KeyType::Ec256,
        KeyType::Ec384,
        KeyType::Ec521,
        KeyType::Rsa2048,
        KeyType::Rsa4096,
        KeyType::X25519,
        KeyType::Ed25519,
    ];

    /// Short name, as accepted by [`FromStr`]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ec256 => "ec256",
            Self::Ec384 => "ec384",
            Self::Ec521 => "ec521",
            Self::Rsa2048 => "rsa2048",
            Self::Rsa4096 => "rsa4096",
            Self::X25519 => "x25519",
            Self::Ed25519 => "ed25519",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyType {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kt| kt.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| KeyError::UnknownKeyType(s.to_string()))
    }
}

/// A generated private key, one variant per [`KeyType`].
pub enum PrivateKey {
    Ec256(p256::SecretKey),
    Ec384(p384::SecretKey),
    Ec521(p521::SecretKey),
    Rsa2048(RsaPrivateKey),
    Rsa4096(RsaPrivateKey),
    X25519(StaticSecret),
    Ed25519(SigningKey),
}

impl PrivateKey {
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Ec256(_) => KeyType::Ec256,
            Self::Ec384(_) => KeyType::Ec384,
            Self::Ec521(_) => KeyType::Ec521,
            Self::Rsa2048(_) => KeyType::Rsa2048,
            Self::Rsa4096(_) => KeyType::Rsa4096,
            Self::X25519(_) => KeyType::X25519,
            Self::Ed25519(_) => KeyType::Ed25519,
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({})", self.key_type())
    }
}

/// Open the seed if one was given, otherwise enforce the unsafe opt-in.
///
/// A supplied seed makes `allow_unsafe` irrelevant.
fn open_seed_gated(
    password: &str,
    seed: Option<&EncryptedSeed>,
    allow_unsafe: bool,
) -> Result<Option<Seed>, KeyError> {
    match seed {
        Some(blob) => Ok(Some(blob.open(password)?)),
        None if allow_unsafe => {
            log::warn!("deriving from the master password alone; output is only as strong as the password");
            Ok(None)
        }
        None => Err(KeyError::UnsafeGeneration),
    }
}

/// Derive a private key of `key_type` for `realm`.
///
/// # Errors
/// - [`KeyError::UnsafeGeneration`] if `seed` is `None` and `allow_unsafe` is false
/// - [`KeyError::Seed`] if the seed cannot be opened with `password`
/// - [`KeyError::GenerationExhausted`] if rejection sampling hits its bound
pub fn get_key(
    password: &str,
    realm: &str,
    seed: Option<&EncryptedSeed>,
    key_type: KeyType,
    allow_unsafe: bool,
) -> Result<PrivateKey, KeyError> {
    let seed = open_seed_gated(password, seed, allow_unsafe)?;
    let mut stream = new_stream(password, realm, seed.as_ref())?;
    generate_key(&mut stream, key_type)
}

/// Derive `len` raw bytes for `realm`, gated like [`get_key`].
///
/// `len` is checked against [`MAX_RAW_LENGTH`] before any derivation.
pub fn get_raw_bytes(
    password: &str,
    realm: &str,
    seed: Option<&EncryptedSeed>,
    len: usize,
    allow_unsafe: bool,
) -> Result<Zeroizing<Vec<u8>>, KeyError> {
    if len > MAX_RAW_LENGTH {
        return Err(KeyError::RawLengthTooLarge {
            requested: len,
            max: MAX_RAW_LENGTH,
        });
    }
    let seed = open_seed_gated(password, seed, allow_unsafe)?;
    let mut stream = new_stream(password, realm, seed.as_ref())?;
    Ok(stream.next_bytes(len))
}

/// Generate a key of `key_type` from an already-open stream.
pub fn generate_key(stream: &mut Stream, key_type: KeyType) -> Result<PrivateKey, KeyError> {
    let key = match key_type {
        KeyType::Ec256 => {
            PrivateKey::Ec256(ec_secret::<p256::NistP256>(stream, 256, MAX_EC_ATTEMPTS)?)
        }
        KeyType::Ec384 => {
            PrivateKey::Ec384(ec_secret::<p384::NistP384>(stream, 384, MAX_EC_ATTEMPTS)?)
        }
        KeyType::Ec521 => {
            PrivateKey::Ec521(ec_secret::<p521::NistP521>(stream, 521, MAX_EC_ATTEMPTS)?)
        }
        KeyType::Rsa2048 => PrivateKey::Rsa2048(rsa_key(stream, 2048, MAX_RSA_ATTEMPTS)?),
        KeyType::Rsa4096 => PrivateKey::Rsa4096(rsa_key(stream, 4096, MAX_RSA_ATTEMPTS)?),
        KeyType::X25519 => PrivateKey::X25519(x25519_secret(stream)),
        KeyType::Ed25519 => PrivateKey::Ed25519(ed25519_key(stream)),
    };
    log::debug!(
        "generated {} key from {} stream bytes",
        key_type,
        stream.bytes_consumed()
    );
    Ok(key)
}

/// Draw up to `max_attempts` scalar candidates until one lies in [1, n-1].
///
/// Bits above the order's bit length are cleared first; this keeps P-521
/// candidates (66 bytes for a 521-bit order) from being rejected almost
/// always while leaving the accepted distribution uniform.
fn ec_secret<C>(
    stream: &mut Stream,
    order_bits: usize,
    max_attempts: u32,
) -> Result<SecretKey<C>, KeyError>
where
    C: CurveArithmetic,
{
    let mut candidate = FieldBytes::<C>::default();
    let excess = candidate.len() * 8 - order_bits;

    for attempt in 1..=max_attempts {
        stream.fill(&mut candidate);
        candidate[0] &= 0xFF >> excess;

        let accepted = SecretKey::<C>::from_bytes(&candidate);
        candidate.as_mut_slice().zeroize();
        if let Ok(secret) = accepted {
            log::debug!("EC scalar accepted on attempt {}", attempt);
            return Ok(secret);
        }
    }

    Err(KeyError::GenerationExhausted {
        what: "EC scalar",
        attempts: max_attempts,
    })
}

/// Draw a prime of exactly `bits` bits with the top two bits set.
///
/// Setting the top two bits guarantees the product of two such primes has
/// exactly twice as many bits.
fn rsa_prime(
    stream: &mut Stream,
    bits: usize,
    max_candidates: u32,
) -> Result<BigUint, KeyError> {
    let exponent = BigUint::from(RSA_EXPONENT);
    let one = BigUint::from(1u32);
    let zero = BigUint::from(0u32);
    let mut buf = Zeroizing::new(vec![0u8; bits / 8]);

    for attempt in 1..=max_candidates {
        stream.fill(&mut buf);
        buf[0] |= 0xC0;
        if let Some(last) = buf.last_mut() {
            *last |= 1;
        }

        let candidate = BigUint::from_bytes_be(&buf);
        // p - 1 must be coprime to e; e is prime, so it must not divide p - 1
        if (&candidate - &one) % &exponent == zero {
            continue;
        }
        if probably_prime(&candidate, PRIME_ROUNDS) {
            log::debug!("{}-bit prime found after {} candidates", bits, attempt);
            return Ok(candidate);
        }
    }

    Err(KeyError::GenerationExhausted {
        what: "RSA prime",
        attempts: max_candidates,
    })
}

fn rsa_key(
    stream: &mut Stream,
    bits: usize,
    max_attempts: u32,
) -> Result<RsaPrivateKey, KeyError> {
    for _ in 0..max_attempts {
        let p = rsa_prime(stream, bits / 2, MAX_PRIME_CANDIDATES)?;
        let q = rsa_prime(stream, bits / 2, MAX_PRIME_CANDIDATES)?;
        if p == q {
            continue;
        }
        if (&p * &q).bits() != bits {
            continue;
        }

        return RsaPrivateKey::from_p_q(p, q, BigUint::from(RSA_EXPONENT))
            .map_err(|e| KeyError::Construction(e.to_string()));
    }

    Err(KeyError::GenerationExhausted {
        what: "RSA prime pair",
        attempts: max_attempts,
    })
}

fn x25519_secret(stream: &mut Stream) -> StaticSecret {
    let mut bytes = [0u8; 32];
    stream.fill(&mut bytes);
    let secret = StaticSecret::from(bytes);
    bytes.zeroize();
    secret
}

fn ed25519_key(stream: &mut Stream) -> SigningKey {
    let mut seed = Zeroizing::new([0u8; 32]);
    stream.fill(&mut seed[..]);
    SigningKey::from_bytes(&seed)
}
