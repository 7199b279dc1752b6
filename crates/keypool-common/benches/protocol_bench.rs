// Criterion benchmarks for keypool-common frames and encodings
//
// Run benchmarks with:
//   cargo bench -p keypool-common
//
// For detailed output with plots:
//   cargo bench -p keypool-common -- --save-baseline main

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use keypool_common::transport::JsonCodec;
use keypool_common::{EndpointKey, Encoding, Request, Response, TransportErrorKind};
use serde_json::json;

fn bench_frame_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encoding");

    for size in [16usize, 1024, 64 * 1024] {
        let request = Request::new("echo", vec![0x5a; size]);
        group.bench_with_input(BenchmarkId::new("encode_request", size), &request, |b, req| {
            b.iter(|| JsonCodec::encode_request(black_box(req)));
        });

        let encoded = JsonCodec::encode_request(&request).unwrap();
        group.bench_with_input(BenchmarkId::new("decode_request", size), &encoded, |b, data| {
            b.iter(|| JsonCodec::decode_request(black_box(data)));
        });
    }

    group.finish();
}

fn bench_response_handling(c: &mut Criterion) {
    let mut group = c.benchmark_group("response_handling");

    let ok = JsonCodec::encode_response(&Response::success(1, b"\"hello\"".to_vec())).unwrap();
    group.bench_function("decode_success", |b| {
        b.iter(|| JsonCodec::decode_response(black_box(&ok)).and_then(|r| r.into_result()));
    });

    let busy = JsonCodec::encode_response(&Response::error(1, TransportErrorKind::TooManyRequests, "busy")).unwrap();
    group.bench_function("decode_error_and_classify", |b| {
        b.iter(|| {
            let err = JsonCodec::decode_response(black_box(&busy))
                .and_then(|r| r.into_result())
                .unwrap_err();
            err.kind.retry_action()
        });
    });

    group.finish();
}

fn bench_payload_encodings(c: &mut Criterion) {
    let mut group = c.benchmark_group("payload_encodings");

    let object = json!({"values": (0..100).collect::<Vec<_>>(), "name": "bench"});
    group.bench_function("json_encode", |b| {
        b.iter(|| Encoding::Json.encode(black_box(&object)));
    });

    let text = json!("x".repeat(1024));
    group.bench_function("utf8_encode", |b| {
        b.iter(|| Encoding::Utf8.encode(black_box(&text)));
    });

    let hex_blob = json!("ab".repeat(1024));
    group.bench_function("binary_encode", |b| {
        b.iter(|| Encoding::Binary.encode(black_box(&hex_blob)));
    });

    group.finish();
}

fn bench_key_decoding(c: &mut Criterion) {
    let encoded = "3f".repeat(32);
    c.bench_function("endpoint_key_decode", |b| {
        b.iter(|| EndpointKey::decode(black_box(&encoded)));
    });
}

criterion_group!(
    benches,
    bench_frame_encoding,
    bench_response_handling,
    bench_payload_encodings,
    bench_key_decoding
);
criterion_main!(benches);
