#![no_main]

use graypool::engine::{decode_pgm_bytes, encode_pgm_bytes, Limits};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let limits = Limits {
        max_dimension: 4096,
        max_pixels: 1 << 20,
    };
    if let Ok(frame) = decode_pgm_bytes(data, &limits) {
        // Whatever decodes must survive our own encoder unchanged.
        let again = decode_pgm_bytes(&encode_pgm_bytes(&frame), &limits).unwrap();
        assert_eq!(again, frame);
    }
});
