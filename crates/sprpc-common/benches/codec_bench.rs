// Criterion benchmarks for the sprpc-common protocol and transport layers
//
// Run benchmarks with:
//   cargo bench -p sprpc-common
//
// For detailed output with plots:
//   cargo bench -p sprpc-common -- --save-baseline main

use std::io::Cursor;

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sprpc_common::protocol::schema;
use sprpc_common::transport::decode;
use sprpc_common::{format_method_call, parse_method_response, MethodCall, Value};

fn process_info_xml(count: usize) -> String {
    let mut entries = String::new();
    for i in 0..count {
        entries.push_str(&format!(
            "<value><struct>\
<member><name>name</name><value><string>worker_{i}</string></value></member>\
<member><name>group</name><value><string>workers</string></value></member>\
<member><name>pid</name><value><i4>{pid}</i4></value></member>\
<member><name>state</name><value><i4>20</i4></value></member>\
<member><name>statename</name><value><string>RUNNING</string></value></member>\
</struct></value>",
            i = i,
            pid = 1000 + i
        ));
    }
    format!(
        "<?xml version=\"1.0\"?>\n<methodResponse><params><param><value><array><data>{}</data></array></value></param></params></methodResponse>",
        entries
    )
}

fn chunked(body: &str, chunk_size: usize) -> Bytes {
    let mut out = b"HTTP/1.1 200 OK\r\nContent-Type: text/xml\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    for piece in body.as_bytes().chunks(chunk_size) {
        out.extend_from_slice(format!("{:x}\r\n", piece.len()).as_bytes());
        out.extend_from_slice(piece);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    Bytes::from(out)
}

fn bench_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_method_call");

    group.bench_function("no_params", |b| {
        let call = MethodCall::new("supervisor.getState");
        b.iter(|| format_method_call(black_box(&call)));
    });

    group.bench_function("nested_struct", |b| {
        let call = MethodCall::new("system.multicall").arg(Value::array((0..20).map(|i| {
            MethodCall::new("supervisor.getProcessInfo")
                .arg(format!("worker_{}", i))
                .to_value()
        })));
        b.iter(|| format_method_call(black_box(&call)));
    });

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_method_response");

    for count in [1, 10, 100] {
        let xml = process_info_xml(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &xml, |b, xml| {
            b.iter(|| parse_method_response(black_box(xml)));
        });
    }

    group.finish();
}

fn bench_schema(c: &mut Criterion) {
    let names = schema::array(schema::record(|m| m.field("name", &schema::string())));
    let value = parse_method_response(&process_info_xml(100))
        .and_then(|response| response.into_result())
        .unwrap();

    c.bench_function("schema_decode_100_records", |b| {
        b.iter(|| names.decode(black_box(&value)));
    });
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_chunked");
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let body = process_info_xml(50);

    for chunk_size in [64, 1024, 16 * 1024] {
        let raw = chunked(&body, chunk_size);
        group.bench_with_input(BenchmarkId::from_parameter(chunk_size), &raw, |b, raw| {
            b.iter(|| {
                rt.block_on(async {
                    let response = decode(Cursor::new(black_box(raw.clone()))).await.unwrap();
                    response.bytes().await.unwrap()
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_format, bench_parse, bench_schema, bench_decode);
criterion_main!(benches);
