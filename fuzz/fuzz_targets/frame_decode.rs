//! Stream decoder under arbitrary input and arbitrary chunking.
//!
//! The first byte picks the chunk size, the rest is fed to the decoder.
//! Decoding must never panic, and any frame it yields must survive an
//! encode/decode cycle unchanged.

#![no_main]

use libfuzzer_sys::fuzz_target;
use roomfeed_proto::{Frame, FrameDecoder};

fuzz_target!(|data: &[u8]| {
    let Some((&chunk, input)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(chunk).max(1);

    let mut decoder = FrameDecoder::with_max_frame_size(64 * 1024);
    for piece in input.chunks(chunk) {
        decoder.extend(piece);
        loop {
            match decoder.next_frame() {
                Ok(Some(frame)) => {
                    let reparsed = Frame::decode(&frame.to_bytes()).expect("encoded frame decodes");
                    assert_eq!(reparsed, frame);
                },
                Ok(None) => break,
                Err(_) => return,
            }
        }
    }
});
