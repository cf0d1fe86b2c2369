#![no_main]

use libfuzzer_sys::fuzz_target;
use presence_server::auth::{SignedTokenVerifier, TokenVerifier, TOKEN_KEY_LEN};

fuzz_target!(|data: &[u8]| {
    let verifier = SignedTokenVerifier::new([7u8; TOKEN_KEY_LEN]);

    // Without the key nothing should verify
    if let Ok(text) = std::str::from_utf8(data) {
        assert!(verifier.verify(text, 0).is_err());
    }
});
