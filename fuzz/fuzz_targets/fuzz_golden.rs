#![no_main]
use gatecheck_engine::golden::{compare_text, normalize_line_endings};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mid = data.len() / 2;
    let (left, right) = data.split_at(mid);
    if let (Ok(a), Ok(b)) = (std::str::from_utf8(left), std::str::from_utf8(right)) {
        let outcome = compare_text(a, b);
        assert_eq!(
            outcome.is_match(),
            normalize_line_endings(a) == normalize_line_endings(b)
        );
    }
});
