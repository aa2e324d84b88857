use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use echoapi_core::{OpenApiDocument, RequestInput, RequestValidator};

fn echo_validator() -> RequestValidator {
    let mut doc = OpenApiDocument::embedded().unwrap();
    doc.clear_servers();
    RequestValidator::new(doc)
}

fn bench_document_load(c: &mut Criterion) {
    c.bench_function("openapi_document_load", |b| {
        b.iter(|| black_box(OpenApiDocument::embedded().unwrap()));
    });
}

fn bench_echo_validation(c: &mut Criterion) {
    let validator = echo_validator();
    let mut group = c.benchmark_group("echo_request_validation");

    for size in [16usize, 1024, 64 * 1024] {
        let body = serde_json::to_vec(&serde_json::json!({ "message": "x".repeat(size) })).unwrap();
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &body, |b, body| {
            b.iter(|| {
                let request = RequestInput {
                    method: "POST",
                    path: "/echo",
                    content_type: Some("application/json"),
                    body,
                    ..Default::default()
                };
                validator.validate(black_box(&request)).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_rejection(c: &mut Criterion) {
    let validator = echo_validator();

    c.bench_function("echo_request_missing_message", |b| {
        b.iter(|| {
            let request = RequestInput {
                method: "POST",
                path: "/echo",
                content_type: Some("application/json"),
                body: b"{}",
                ..Default::default()
            };
            black_box(validator.validate(&request)).unwrap_err();
        });
    });
}

criterion_group!(benches, bench_document_load, bench_echo_validation, bench_rejection);
criterion_main!(benches);
