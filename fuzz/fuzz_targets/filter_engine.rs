#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use logflow_core::config::{EntryFilterConfig, FilterAction, RawFilterConfig};
use logflow_core::types::{LogFormat, ParsedEntry};
use logflow_pipeline::FilterEngine;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    rules: Vec<FuzzRule>,
    line: String,
    level: String,
    extra_field: String,
    extra_value: String,
}

#[derive(Arbitrary, Debug)]
struct FuzzRule {
    field: FuzzField,
    pattern: String,
    include: bool,
}

#[derive(Arbitrary, Debug)]
enum FuzzField {
    Level,
    Message,
    Extra,
    Missing,
}

impl FuzzField {
    fn name<'a>(&self, extra: &'a str) -> &'a str {
        match self {
            FuzzField::Level => "level",
            FuzzField::Message => "message",
            FuzzField::Extra => extra,
            FuzzField::Missing => "no_such_field",
        }
    }
}

fn action(include: bool) -> FilterAction {
    if include {
        FilterAction::Include
    } else {
        FilterAction::Exclude
    }
}

fuzz_target!(|input: FuzzInput| {
    let rules: Vec<&FuzzRule> = input.rules.iter().take(8).collect();

    let raw: Vec<RawFilterConfig> = rules
        .iter()
        .map(|r| RawFilterConfig {
            pattern: r.pattern.clone(),
            action: action(r.include),
        })
        .collect();
    if let Ok(engine) = FilterEngine::for_raw_lines(&raw) {
        let _ = engine.keep_line(&input.line);
        if raw.is_empty() {
            assert!(engine.keep_line(&input.line));
        }
    }

    let entry_rules: Vec<EntryFilterConfig> = rules
        .iter()
        .map(|r| EntryFilterConfig {
            field: r.field.name(&input.extra_field).to_owned(),
            pattern: r.pattern.clone(),
            action: action(r.include),
        })
        .collect();
    let Ok(engine) = FilterEngine::for_entries(&entry_rules) else {
        return;
    };

    let mut entry = ParsedEntry::new("2024-01-15T12:00:00Z", input.line.clone(), LogFormat::Json);
    entry.level = input.level;
    entry.message = Some(input.line);
    entry.insert_field(input.extra_field, serde_json::Value::String(input.extra_value));
    let _ = engine.keep_entry(&entry);
});
