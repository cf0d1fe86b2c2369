#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use presence_core::{CodeEngine, CodeEngineConfig, Secret, VerificationResult, MAX_DRIFT_STEPS};

#[derive(Debug, Arbitrary)]
struct Input {
    secret: Vec<u8>,
    submitted: String,
    now: u64,
    drift: u32,
    digits: u8,
    step: u16,
}

fuzz_target!(|input: Input| {
    let config = CodeEngineConfig::new(6 + u32::from(input.digits % 5), u64::from(input.step).max(1));
    let Ok(engine) = CodeEngine::new(config) else {
        return;
    };
    let Ok(secret) = Secret::from_bytes(input.secret) else {
        return;
    };

    // Arbitrary submissions never panic and never report an offset outside the window
    match engine.verify(&secret, &input.submitted, input.now, input.drift) {
        Ok(VerificationResult::Accepted { step_offset }) => {
            assert!(step_offset.unsigned_abs() <= u64::from(input.drift));
        }
        Ok(VerificationResult::Rejected) => {}
        Err(_) => assert!(input.drift > MAX_DRIFT_STEPS),
    }

    // The current code always verifies
    let current = engine.generate(&secret, input.now);
    assert_eq!(current.code.len(), engine.config().digits as usize);
    assert!(engine.check(&secret, &current.code, input.now).is_accepted());
});
