#![no_main]

use libfuzzer_sys::fuzz_target;
use pix_brcode::{decode, DecodeOptions};

fuzz_target!(|data: &[u8]| {
    // Try to decode arbitrary bytes as a BR Code payload
    if let Ok(s) = std::str::from_utf8(data) {
        // Strict mode skips unknown tags, maximizing parser coverage

        // We don't care about the result - we're looking for panics/crashes
        let _ = decode(s, DecodeOptions::strict());
        let _ = decode(s, DecodeOptions::default());
    }
});
