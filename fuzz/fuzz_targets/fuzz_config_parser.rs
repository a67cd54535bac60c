//! Fuzz target: `parse_config` (JSON run configuration)
//!
//! Any document that parses must also pass validation and survive a
//! serialize/parse round trip.
//!
//! cargo fuzz run fuzz_config_parser

#![no_main]

use kiln::adapters::config_file::parse_config;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(config) = parse_config(data) else {
        return;
    };
    assert!(config.validate().is_ok());

    let json = serde_json::to_vec(&config).expect("valid config serializes");
    let again = parse_config(&json).expect("serialized config parses");
    assert_eq!(again.validate(), Ok(()));
});
