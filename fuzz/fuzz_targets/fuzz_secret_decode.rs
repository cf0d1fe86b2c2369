#![no_main]

use libfuzzer_sys::fuzz_target;
use presence_core::Secret;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(secret) = Secret::from_base32(text) {
            assert!(!secret.is_empty());

            // Canonical form decodes to the same bytes
            let reencoded = secret.to_base32();
            let again = Secret::from_base32(&reencoded).unwrap();
            assert_eq!(secret, again);
        }
    }

    if let Ok(secret) = Secret::from_bytes(data.to_vec()) {
        assert_eq!(secret.as_bytes(), data);
    }
});
