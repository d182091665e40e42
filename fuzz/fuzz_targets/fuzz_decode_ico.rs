#![no_main]

use libfuzzer_sys::fuzz_target;
use zenraster::{decode_ico_bmp_with_limits, Limits, Unstoppable};

fuzz_target!(|data: &[u8]| {
    // The header-less ICO entry point skips the magic check entirely, so
    // it sees far more hostile headers than the auto-detect path.
    let limits = Limits {
        max_pixels: Some(1 << 20),
        max_memory_bytes: Some(1 << 24),
        ..Limits::default()
    };
    let _ = decode_ico_bmp_with_limits(data, &limits, Unstoppable);
});
