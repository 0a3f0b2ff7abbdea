#![no_main]

use libfuzzer_sys::fuzz_target;
use logflow_core::pipeline::LogParser;
use logflow_pipeline::parser::SyslogParser;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    let _ = SyslogParser::new().parse(&line);
});
