#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(records) = xpress_io::parse_gtf_str(text) {
            let _ = xpress_io::gtf_to_string(&records);
        }
    }
});
