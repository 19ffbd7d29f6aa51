//! Deterministic password generation
//!
//! Characters are drawn from the stream over the printable ASCII alphabet
//! (digits, punctuation, upper and lower case letters) minus any excluded
//! characters. If the result misses a per-class minimum, a repair pass
//! overwrites stream-chosen positions that no other class needs.
//!
//! # Example
//! ```no_run
//! use realmkey_core::password::{get_password, PasswordSpec};
//!
//! let spec = PasswordSpec::default();
//! let pass = get_password("master", "example.com", None, &spec).unwrap();
//! assert_eq!(pass.len(), spec.length);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::seed::{EncryptedSeed, SeedError};
use crate::stream::{new_stream, Stream, StreamError};

/// Longest password a spec may ask for
pub const MAX_PASSWORD_LENGTH: usize = 4096;

/// Stream draws allowed for a single choice before giving up
const MAX_DRAWS: u32 = 1 << 16;

const DIGITS: &[u8] = b"0123456789";
const SPECIAL: &[u8] = b"!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Invalid password spec: {0}")]
    Configuration(String),
    #[error("Generation exhausted after {0} stream draws")]
    GenerationExhausted(u32),
    #[error(transparent)]
    Seed(#[from] SeedError),
    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Character classes a spec can require a minimum of.
///
/// Variant order is the order in which the repair pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Digit,
    Special,
    Upper,
    Lower,
}

impl CharClass {
    pub const ALL: [CharClass; 4] = [
        CharClass::Digit,
        CharClass::Special,
        CharClass::Upper,
        CharClass::Lower,
    ];

    pub fn members(&self) -> &'static [u8] {
        match self {
            Self::Digit => DIGITS,
            Self::Special => SPECIAL,
            Self::Upper => UPPER,
            Self::Lower => LOWER,
        }
    }

    pub fn of(c: u8) -> Option<CharClass> {
        Self::ALL.into_iter().find(|class| class.members().contains(&c))
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Password policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordSpec {
    /// Total number of characters
    pub length: usize,
    /// Minimum number of digits
    pub digits: usize,
    /// Minimum number of punctuation characters
    pub special: usize,
    /// Minimum number of uppercase letters
    pub upper: usize,
    /// Minimum number of lowercase letters
    pub lower: usize,
    /// Characters that must never appear
    pub excluded: String,
}

impl Default for PasswordSpec {
    fn default() -> Self {
        Self {
            length: 16,
            digits: 3,
            special: 3,
            upper: 2,
            lower: 1,
            excluded: String::new(),
        }
    }
}

impl PasswordSpec {
    pub fn minimum(&self, class: CharClass) -> usize {
        match class {
            CharClass::Digit => self.digits,
            CharClass::Special => self.special,
            CharClass::Upper => self.upper,
            CharClass::Lower => self.lower,
        }
    }

    pub fn is_excluded(&self, c: u8) -> bool {
        self.excluded.as_bytes().contains(&c)
    }

    /// Members of `class` that are not excluded
    pub fn allowed(&self, class: CharClass) -> Vec<u8> {
        class
            .members()
            .iter()
            .copied()
            .filter(|c| !self.is_excluded(*c))
            .collect()
    }

    /// Check the policy can be satisfied at all.
    pub fn validate(&self) -> Result<(), PasswordError> {
        if self.length == 0 {
            return Err(PasswordError::Configuration(
                "length must be at least 1".into(),
            ));
        }
        if self.length > MAX_PASSWORD_LENGTH {
            return Err(PasswordError::Configuration(format!(
                "length {} exceeds maximum of {}",
                self.length, MAX_PASSWORD_LENGTH
            )));
        }

        let required = CharClass::ALL
            .iter()
            .try_fold(0usize, |acc, c| acc.checked_add(self.minimum(*c)))
            .ok_or_else(|| {
                PasswordError::Configuration("class minimums overflow".into())
            })?;
        if required > self.length {
            return Err(PasswordError::Configuration(format!(
                "class minimums add up to {} but length is {}",
                required, self.length
            )));
        }

        for class in CharClass::ALL {
            if self.minimum(class) > 0 && self.allowed(class).is_empty() {
                return Err(PasswordError::Configuration(format!(
                    "{:?} characters are required but all are excluded",
                    class
                )));
            }
        }

        if CharClass::ALL.iter().all(|c| self.allowed(*c).is_empty()) {
            return Err(PasswordError::Configuration(
                "every character is excluded".into(),
            ));
        }

        Ok(())
    }
}

/// Derive a password for `realm` conforming to `spec`.
///
/// The spec is validated before any key derivation happens.
pub fn get_password(
    password: &str,
    realm: &str,
    seed: Option<&EncryptedSeed>,
    spec: &PasswordSpec,
) -> Result<Zeroizing<String>, PasswordError> {
    spec.validate()?;
    let seed = seed.map(|blob| blob.open(password)).transpose()?;
    let mut stream = new_stream(password, realm, seed.as_ref())?;
    generate_password(&mut stream, spec)
}

/// Generate a password from an already-open stream.
pub fn generate_password(
    stream: &mut Stream,
    spec: &PasswordSpec,
) -> Result<Zeroizing<String>, PasswordError> {
    spec.validate()?;

    let alphabet: Vec<u8> = CharClass::ALL
        .iter()
        .flat_map(|c| c.members().iter().copied())
        .collect();

    let mut chars = Zeroizing::new(Vec::with_capacity(spec.length));
    for _ in 0..spec.length {
        let c = draw_char(stream, &alphabet, |c| !spec.is_excluded(c))?;
        chars.push(c);
    }

    repair_classes(stream, spec, &mut chars)?;

    let password = String::from_utf8(chars.to_vec())
        .map_err(|e| PasswordError::Configuration(e.to_string()))?;
    Ok(Zeroizing::new(password))
}

/// Overwrite unneeded positions until every class minimum is met.
fn repair_classes(
    stream: &mut Stream,
    spec: &PasswordSpec,
    chars: &mut [u8],
) -> Result<(), PasswordError> {
    // The first `minimum` occurrences of each class are locked in place;
    // everything else is a surplus position and may be replaced.
    let mut counts = [0usize; 4];
    let mut locked = vec![false; chars.len()];
    for (i, c) in chars.iter().enumerate() {
        if let Some(class) = CharClass::of(*c) {
            if counts[class.index()] < spec.minimum(class) {
                locked[i] = true;
            }
            counts[class.index()] += 1;
        }
    }

    for class in CharClass::ALL {
        let allowed = spec.allowed(class);
        while counts[class.index()] < spec.minimum(class) {
            let free: Vec<usize> = (0..chars.len()).filter(|i| !locked[*i]).collect();
            if free.is_empty() {
                return Err(PasswordError::Configuration(format!(
                    "no position left to place a {:?} character",
                    class
                )));
            }

            let pos = free[draw_index(stream, free.len())?];
            if let Some(old) = CharClass::of(chars[pos]) {
                counts[old.index()] -= 1;
            }
            chars[pos] = draw_char(stream, &allowed, |_| true)?;
            counts[class.index()] += 1;
            locked[pos] = true;
        }
    }

    Ok(())
}

/// Draw a byte-indexed character from `alphabet`, redrawing on bias and on
/// characters rejected by `accept`.
fn draw_char(
    stream: &mut Stream,
    alphabet: &[u8],
    accept: impl Fn(u8) -> bool,
) -> Result<u8, PasswordError> {
    let n = alphabet.len();
    let limit = 256 - 256 % n;
    for _ in 0..MAX_DRAWS {
        let b = stream.next_u8() as usize;
        if b >= limit {
            continue;
        }
        let c = alphabet[b % n];
        if accept(c) {
            return Ok(c);
        }
    }
    Err(PasswordError::GenerationExhausted(MAX_DRAWS))
}

/// Uniform index in `0..n`
fn draw_index(stream: &mut Stream, n: usize) -> Result<usize, PasswordError> {
    let n = n as u64;
    let zone = (u64::from(u32::MAX) + 1) / n * n;
    for _ in 0..MAX_DRAWS {
        let x = u64::from(stream.next_u32());
        if x < zone {
            return Ok((x % n) as usize);
        }
    }
    Err(PasswordError::GenerationExhausted(MAX_DRAWS))
}
