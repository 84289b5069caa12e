#![no_main]
use libfuzzer_sys::fuzz_target;
use nfsc::SessionConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(json) = std::str::from_utf8(data) {
        // Anything accepted must validate and survive a round trip
        if let Ok(config) = SessionConfig::from_json(json) {
            assert!(config.validate().is_ok());
            let encoded = serde_json::to_string(&config).unwrap();
            assert_eq!(SessionConfig::from_json(&encoded).unwrap(), config);
        }
    }
});
