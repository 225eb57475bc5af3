#![no_main]

use arbitrary::Arbitrary;
use graypool::engine::{apply_serial, dispatch, Frame};
use graypool::{EngineConfig, TransformRequest};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct DispatchSeed {
    width: u8,
    height: u8,
    threads: u8,
    capacity: u8,
    rows_per_task: Option<u8>,
    slice: bool,
    t1: i16,
    t2: i16,
    pixels: Vec<u8>,
}

fuzz_target!(|seed: DispatchSeed| {
    let width = usize::from(seed.width % 64) + 1;
    let height = usize::from(seed.height % 64) + 1;
    let pixels = seed.pixels;
    let Ok(frame) = Frame::from_fn(width, height, 255, |x, y| {
        pixels.get((y * width + x) % pixels.len().max(1)).copied().unwrap_or(0)
    }) else {
        return;
    };

    let config = EngineConfig::default()
        .with_threads(usize::from(seed.threads % 16) + 1)
        .with_queue_capacity(usize::from(seed.capacity % 8) + 1)
        .with_rows_per_task(seed.rows_per_task.map(|r| usize::from(r % 16) + 1));
    let request = if seed.slice {
        TransformRequest::slice(i32::from(seed.t1), i32::from(seed.t2))
    } else {
        TransformRequest::negative()
    };

    match dispatch(&frame, &request, &config) {
        Ok((output, report)) => {
            assert_eq!(report.pool.processed(), report.tasks.len());
            assert_eq!(output, apply_serial(&request, &frame).unwrap());
        }
        Err(err) => assert!(request.validate().is_err(), "unexpected failure: {err}"),
    }
});
