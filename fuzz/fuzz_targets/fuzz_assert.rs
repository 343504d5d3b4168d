#![no_main]
use gatecheck_core::contract::select;
use gatecheck_core::mode::Mode;
use gatecheck_engine::assertions::AssertionSet;
use gatecheck_engine::report::render_verdict;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(record) = gatecheck_core::decode::decode_status(text) {
        for mode in Mode::ALL {
            let spec = select(mode);
            let mut result = gatecheck_core::result::VerificationResult::new();
            result.extend(AssertionSet::for_contract(&spec).evaluate(&record));
            let verdict = render_verdict(&spec.suite, &result);
            assert_eq!(verdict.passed, result.all_passed());
        }
    }
});
