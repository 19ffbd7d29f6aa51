#![no_main]

use libfuzzer_sys::fuzz_target;
use realmkey_core::seed::{EncryptedSeed, BLOB_LEN};

fuzz_target!(|data: &[u8]| {
    // from_bytes must return Ok or Err, never panic
    if let Ok(blob) = EncryptedSeed::from_bytes(data) {
        assert_eq!(data.len(), BLOB_LEN);
        // Accepted blobs serialize back to exactly the input
        assert_eq!(blob.to_bytes(), data);
    }
});
