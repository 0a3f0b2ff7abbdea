#![no_main]

use libfuzzer_sys::fuzz_target;
use logflow_core::types::ParsedEntry;
use logflow_pipeline::QueryFilter;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    let filter = QueryFilter::new().level("ERROR");
    if let Ok(entry) = serde_json::from_str::<ParsedEntry>(&line) {
        let _ = filter.matches_entry(&entry);
        let again = serde_json::to_string(&entry).expect("entry encodes");
        let back: ParsedEntry = serde_json::from_str(&again).expect("re-encoded entry decodes");
        assert_eq!(back.timestamp, entry.timestamp);
    }
});
