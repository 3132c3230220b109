//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary text to `AppConfig::parse()`, covering both TOML decoding
//! and validation of the `[llm]`, `[pipeline]`, `[prompts]` and `[store]`
//! sections.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Only panics matter; rejected configs are expected
        if let Ok(config) = coderag_config::AppConfig::parse(s) {
            assert!(config.store.top_k > 0);
            assert_ne!(config.pipeline.max_context_tokens, Some(0));
        }
    }
});
