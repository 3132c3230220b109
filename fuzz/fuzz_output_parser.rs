//! Fuzz target for code block extraction.
//!
//! Run with: cargo +nightly fuzz run fuzz_output_parser
//!
//! Any extracted code and explanation must be verbatim slices of the input,
//! and the "None" sentinel must never come back as code.

#![no_main]

use coderag_core::pipeline::{NO_CODE_SENTINEL, OutputParser};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    let parsed = OutputParser::default().parse(raw);
    match (&parsed.code, &parsed.explanation) {
        (Some(code), Some(explanation)) => {
            assert_ne!(code, NO_CODE_SENTINEL);
            assert!(raw.contains(&format!("```python{code}```")));
            assert!(raw.ends_with(explanation.as_str()));
        }
        (None, None) => {}
        _ => panic!("code and explanation must be present together"),
    }
});
