//! Security-specific tests.
//!
//! These tests verify:
//! 1. The unsafe gate refuses unseeded keys and raw bytes
//! 2. Seed blobs fail cleanly on wrong passwords and tampering
//! 3. Impossible password specs fail before any derivation
//! 4. Malformed inputs don't panic

use realmkey_core::{
    decrypt_seed, encrypt_seed, get_key, get_password, get_raw_bytes, EncryptedSeed, KeyError,
    KeyType, PasswordError, PasswordSpec, Seed, SeedError,
};

// ============================================================================
// 1. Unsafe gate
// ============================================================================

#[test]
fn test_unseeded_key_refused_for_every_type() {
    for kt in KeyType::ALL {
        let result = get_key("pass1", "example.com", None, kt, false);
        assert!(
            matches!(result, Err(KeyError::UnsafeGeneration)),
            "{kt} generated without a seed"
        );
    }
}

#[test]
fn test_unseeded_raw_bytes_refused() {
    assert!(matches!(
        get_raw_bytes("pass1", "example.com", None, 32, false),
        Err(KeyError::UnsafeGeneration)
    ));
}

#[test]
fn test_seeded_key_ignores_unsafe_flag() {
    let seed = EncryptedSeed::generate("pass1").unwrap();
    let a = get_key("pass1", "example.com", Some(&seed), KeyType::Ed25519, false).unwrap();
    let b = get_key("pass1", "example.com", Some(&seed), KeyType::Ed25519, true).unwrap();

    match (a, b) {
        (realmkey_core::PrivateKey::Ed25519(a), realmkey_core::PrivateKey::Ed25519(b)) => {
            assert_eq!(a.to_bytes(), b.to_bytes())
        }
        _ => panic!("unexpected key types"),
    }
}

#[test]
fn test_wrong_seed_password_fails_regardless_of_flag() {
    let seed = EncryptedSeed::generate("pass1").unwrap();
    for allow_unsafe in [false, true] {
        let result = get_key("pass2", "example.com", Some(&seed), KeyType::Ec256, allow_unsafe);
        assert!(matches!(
            result,
            Err(KeyError::Seed(SeedError::DecryptionFailed))
        ));
    }
}

// ============================================================================
// 2. Seed blob integrity
// ============================================================================

#[test]
fn test_wrong_password_fails_decryption() {
    let seed = Seed::from_bytes([0xABu8; 64]);
    let encrypted = encrypt_seed(&seed, "correct horse battery staple").unwrap();

    assert!(matches!(
        decrypt_seed(&encrypted, "wrong horse battery staple"),
        Err(SeedError::DecryptionFailed)
    ));
}

#[test]
fn test_every_tampered_byte_fails_decryption() {
    let password = "test password";
    let bytes = EncryptedSeed::generate(password).unwrap().to_bytes();

    // Version byte, salt, nonce, ciphertext and tag are all covered
    for i in [0usize, 1, 16, 17, 28, 29, 60, bytes.len() - 1] {
        let mut tampered = bytes.clone();
        tampered[i] ^= 0x01;
        let result = EncryptedSeed::from_bytes(&tampered).and_then(|b| b.open(password));
        assert!(result.is_err(), "tampered byte {i} was accepted");
    }
}

#[test]
fn test_password_with_wrong_seed_password_fails() {
    let seed = EncryptedSeed::generate("pass1").unwrap();
    let result = get_password("pass2", "example.com", Some(&seed), &PasswordSpec::default());
    assert!(matches!(
        result,
        Err(PasswordError::Seed(SeedError::DecryptionFailed))
    ));
}

// ============================================================================
// 3. Configuration errors
// ============================================================================

#[test]
fn test_impossible_spec_fails_before_seed_is_opened() {
    // A wrong seed password would fail decryption; the policy must be rejected first
    let seed = EncryptedSeed::generate("pass1").unwrap();
    let spec = PasswordSpec {
        length: 4,
        digits: 3,
        special: 3,
        upper: 0,
        lower: 0,
        excluded: String::new(),
    };

    assert!(matches!(
        get_password("wrong", "example.com", Some(&seed), &spec),
        Err(PasswordError::Configuration(_))
    ));
}

#[test]
fn test_fully_excluded_required_class_fails() {
    let spec = PasswordSpec {
        digits: 1,
        excluded: "0123456789".into(),
        ..PasswordSpec::default()
    };
    assert!(matches!(
        get_password("pass1", "example.com", None, &spec),
        Err(PasswordError::Configuration(_))
    ));
}

// ============================================================================
// 4. Malformed inputs
// ============================================================================

#[test]
fn test_random_blobs_never_panic() {
    use rand::{Rng, RngCore};

    let mut rng = rand::thread_rng();
    for _ in 0..1000 {
        let len = rng.gen_range(0..200);
        let mut data = vec![0u8; len];
        rng.fill_bytes(&mut data);
        let _ = EncryptedSeed::from_bytes(&data);
    }
}

#[test]
fn test_unknown_key_type_names() {
    for name in ["", "ec", "rsa", "rsa1024", "ed448", "x448"] {
        assert!(matches!(
            name.parse::<KeyType>(),
            Err(KeyError::UnknownKeyType(_))
        ));
    }
}
