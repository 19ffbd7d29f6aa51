#![no_main]

use libfuzzer_sys::fuzz_target;
use realmkey_core::password::{generate_password, CharClass, PasswordSpec};
use realmkey_core::stream::StreamKey;
use std::sync::OnceLock;

// One KDF run for the whole session; each input restarts the stream
static KEY: OnceLock<StreamKey> = OnceLock::new();

// Nine bytes per class: a tag byte picks a small count or a full-width one
fn class_minimum(chunk: &[u8]) -> usize {
    if chunk[0] & 0x80 == 0 {
        return (chunk[0] % 16) as usize;
    }
    let mut wide = [0u8; 8];
    wide.copy_from_slice(&chunk[1..9]);
    u64::from_le_bytes(wide) as usize
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 37 {
        return;
    }
    let spec = PasswordSpec {
        length: data[0] as usize,
        digits: class_minimum(&data[1..10]),
        special: class_minimum(&data[10..19]),
        upper: class_minimum(&data[19..28]),
        lower: class_minimum(&data[28..37]),
        excluded: data[37..]
            .iter()
            .filter(|b| b.is_ascii_graphic())
            .map(|b| *b as char)
            .collect(),
    };

    let key = KEY.get_or_init(|| StreamKey::derive("fuzz", "example.com", None).unwrap());
    let Ok(pass) = generate_password(&mut key.stream(), &spec) else {
        // Only configuration problems may be reported
        assert!(spec.validate().is_err());
        return;
    };

    assert_eq!(pass.len(), spec.length);
    for class in CharClass::ALL {
        let count = pass.bytes().filter(|b| CharClass::of(*b) == Some(class)).count();
        assert!(count >= spec.minimum(class));
    }
    assert!(!pass.bytes().any(|b| spec.is_excluded(b)));
});
