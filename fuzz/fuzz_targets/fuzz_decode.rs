#![no_main]

use libfuzzer_sys::fuzz_target;
use zenraster::{decode_with_limits, Limits, Unstoppable};

fuzz_target!(|data: &[u8]| {
    let limits = Limits {
        max_pixels: Some(1 << 20),
        max_memory_bytes: Some(1 << 24),
        ..Limits::default()
    };
    // Must never panic or overflow; errors are fine.
    let _ = decode_with_limits(data, &limits, Unstoppable);
});
