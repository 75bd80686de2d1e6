//! Criterion micro-benchmarks for leaf encoding and decoding.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use tessel_core::{Codec, PrimitiveKind, Value};

const N: usize = 10_000;

/// Benchmark: encode then decode 10K values of each of a few kinds.
fn bench_round_trip(c: &mut Criterion) {
    let cases = [
        (PrimitiveKind::UInt16, Value::from(4321u16)),
        (PrimitiveKind::Float32, Value::from(1.25f32)),
        (PrimitiveKind::VarInt, Value::from(-123_456i64)),
        (PrimitiveKind::String, Value::from("replicated")),
    ];
    for (kind, value) in cases {
        let width = kind.encoded_len(&value);
        let mut buf = vec![0u8; width * N];
        c.bench_function(&format!("codec_{}_10k", kind.name()), |b| {
            b.iter(|| {
                for i in 0..N {
                    kind.encode(&value, &mut buf, i * width).unwrap();
                }
                let mut offset = 0;
                while offset < buf.len() {
                    let (decoded, read) = kind.decode(&buf, offset).unwrap();
                    black_box(decoded);
                    offset += read;
                }
            });
        });
    }
}

/// Benchmark: coerce 10K mixed inputs into a `uint8` leaf.
fn bench_coerce(c: &mut Criterion) {
    let inputs: Vec<Value> = (0..N)
        .map(|i| match i % 3 {
            0 => Value::from(i as i64),
            1 => Value::from(i as f64 / 3.0),
            _ => Value::from(i.to_string()),
        })
        .collect();
    c.bench_function("coerce_uint8_10k", |b| {
        b.iter(|| {
            for input in &inputs {
                black_box(PrimitiveKind::UInt8.coerce(input));
            }
        });
    });
}

criterion_group!(benches, bench_round_trip, bench_coerce);
criterion_main!(benches);
