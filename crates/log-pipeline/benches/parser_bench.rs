//! Line decoder throughput.
//!
//! Measures each fixed-format decoder and the auto-detecting router, which
//! pays for failed attempts before the matching decoder succeeds.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use logflow_core::pipeline::LogParser;
use logflow_core::types::ParserFormat;
use logflow_pipeline::parser::{ClfParser, JsonParser, ParserRouter, SyslogParser};

const JSON_SHORT: &str =
    r#"{"timestamp":"2024-01-15T12:00:00Z","level":"INFO","service":"auth","message":"login ok"}"#;

const JSON_LONG: &str = r#"{"timestamp":"2024-01-15T12:00:00.123456Z","level":"ERROR","id":"evt-0001","service":"api-gateway","user_id":"u-42","request_id":"550e8400-e29b-41d4-a716-446655440000","duration_ms":245.5,"message":"upstream request failed","source_file":"gateway/handler.rs","tags":["upstream","timeout"],"http":{"method":"POST","path":"/api/v1/users","status":502},"region":"us-east-1"}"#;

const APACHE: &str = r#"203.0.113.45 - frank [10/Oct/2023:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326"#;

const NGINX: &str = r#"203.0.113.45 - - [10/Oct/2023:13:55:36 +0000] "POST /api/v1/login HTTP/1.1" 401 512 "https://example.com/" "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36""#;

const SYSLOG: &str = "<34>Oct 11 22:14:15 mymachine su[230]: 'su root' failed for lonvick on /dev/pts/8";

fn bench_fixed_formats(c: &mut Criterion) {
    let json = JsonParser::default();
    let apache = ClfParser::apache();
    let nginx = ClfParser::nginx();
    let syslog = SyslogParser::new();

    let mut group = c.benchmark_group("decoder");
    group.throughput(Throughput::Elements(1));

    group.bench_function("json_short", |b| {
        b.iter(|| json.parse(black_box(JSON_SHORT)).unwrap())
    });
    group.bench_function("json_long", |b| {
        b.iter(|| json.parse(black_box(JSON_LONG)).unwrap())
    });
    group.bench_function("apache", |b| {
        b.iter(|| apache.parse(black_box(APACHE)).unwrap())
    });
    group.bench_function("nginx", |b| {
        b.iter(|| nginx.parse(black_box(NGINX)).unwrap())
    });
    group.bench_function("syslog", |b| {
        b.iter(|| syslog.parse(black_box(SYSLOG)).unwrap())
    });

    group.finish();
}

fn bench_auto_detect(c: &mut Criterion) {
    let router = ParserRouter::for_format(ParserFormat::Auto);

    let mut group = c.benchmark_group("auto_detect");
    group.throughput(Throughput::Elements(1));

    for (name, line) in [
        ("json", JSON_SHORT),
        ("syslog", SYSLOG),
        ("nginx", NGINX),
        ("apache", APACHE),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), line, |b, line| {
            b.iter(|| router.parse(black_box(line)).unwrap())
        });
    }

    group.bench_function("no_match", |b| {
        b.iter(|| router.parse(black_box("plain text that matches nothing")).is_err())
    });

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let router = ParserRouter::for_format(ParserFormat::Auto);
    let lines: Vec<&str> = [JSON_SHORT, APACHE, NGINX, SYSLOG]
        .iter()
        .copied()
        .cycle()
        .take(1000)
        .collect();

    let mut group = c.benchmark_group("batch");
    group.throughput(Throughput::Elements(lines.len() as u64));
    group.bench_function("mixed_1000", |b| {
        b.iter(|| {
            lines
                .iter()
                .filter(|line| router.parse(black_box(line)).is_ok())
                .count()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_fixed_formats, bench_auto_detect, bench_batch);
criterion_main!(benches);
