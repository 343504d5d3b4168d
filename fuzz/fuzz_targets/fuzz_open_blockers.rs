#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        let _ = gatecheck_engine::activation::parse_open_blockers_count(&value);
        let _ = gatecheck_engine::activation::parse_t4_overlay(&value);
    }
});
