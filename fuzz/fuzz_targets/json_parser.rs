#![no_main]

use libfuzzer_sys::fuzz_target;
use logflow_core::pipeline::LogParser;
use logflow_pipeline::parser::JsonParser;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    let parser = JsonParser::default();
    if let Ok(entry) = parser.parse(&line) {
        assert_eq!(entry.raw, line.as_ref());
    }
});
