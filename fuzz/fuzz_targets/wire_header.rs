#![no_main]

use graypool::engine::{receive_frame, Limits};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let limits = Limits {
        max_dimension: 4096,
        max_pixels: 1 << 20,
    };
    if let Ok((header, frame)) = receive_frame(&mut Cursor::new(data), &limits) {
        assert_eq!(frame.width(), header.width as usize);
        assert_eq!(frame.height(), header.height as usize);
        assert!(frame.len() <= data.len());
    }
});
