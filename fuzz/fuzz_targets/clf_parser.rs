#![no_main]

use libfuzzer_sys::fuzz_target;
use logflow_core::pipeline::LogParser;
use logflow_pipeline::parser::ClfParser;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    let apache = ClfParser::apache().parse(&line).is_ok();
    let nginx = ClfParser::nginx().parse(&line).is_ok();
    // apache stops after the size, nginx requires the referer/agent pair
    assert!(!(apache && nginx), "both dialects accepted {line:?}");
});
