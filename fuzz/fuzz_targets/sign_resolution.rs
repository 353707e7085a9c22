#![no_main]

use arbitrary::Unstructured;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = cellsign::arbitrary::sign_resolution(&mut Unstructured::new(data));
});
