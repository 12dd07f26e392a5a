#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(frames) = tracer_hardware::parse_script(data) {
        assert!(!frames.is_empty());
    }
});
