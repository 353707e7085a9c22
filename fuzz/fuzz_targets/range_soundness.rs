#![no_main]

use arbitrary::Unstructured;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = cellsign::arbitrary::range_soundness(&mut Unstructured::new(data));
});
