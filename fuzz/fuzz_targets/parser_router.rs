#![no_main]

use libfuzzer_sys::fuzz_target;
use logflow_core::types::ParserFormat;
use logflow_pipeline::parser::ParserRouter;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    let router = ParserRouter::for_format(ParserFormat::Auto);
    if let Ok(entry) = router.parse(&line) {
        // every decoded entry must survive the storage encoding
        let encoded = serde_json::to_string(&entry).expect("entry encodes");
        assert!(!encoded.contains('\n'));
    }
});
