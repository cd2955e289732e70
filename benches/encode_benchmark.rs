use std::{hint::black_box, io::Write};

use criterion::{criterion_group, criterion_main, Criterion};
use jsongraph::{
    source::{ChildSink, Key, PullSource, Shape},
    value::{Array, Object, Value},
    writer::{CyclePolicy, EncodeSettings},
    Codec, JsonError,
};

struct BlackBoxWriter;
impl Write for BlackBoxWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        black_box(buf);
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        black_box(buf);
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn bench_compare(c: &mut Criterion, name: &str, value: &Value) {
    let mut group = c.benchmark_group(name);
    group.bench_with_input("jsongraph", value, |b, value| {
        b.iter(|| jsongraph::to_string(value).unwrap())
    });
    group.bench_with_input("jsongraph (pretty)", value, |b, value| {
        let settings = EncodeSettings::pretty();
        b.iter(|| jsongraph::to_string_with(value, &settings).unwrap())
    });
    let codec = Codec::default();
    group.bench_with_input("jsongraph (codec)", value, |b, value| {
        b.iter(|| codec.encode(value).unwrap())
    });
    group.bench_with_input("jsongraph (writer, small arena)", value, |b, value| {
        let settings = EncodeSettings {
            max_arena_size: 1024,
            ..Default::default()
        };
        b.iter(|| jsongraph::to_writer_with(value, BlackBoxWriter, &settings).unwrap())
    });

    let json = jsongraph::to_string(value).unwrap();
    let serde_value: serde_json::Value = serde_json::from_str(&json).unwrap();
    group.bench_with_input("serde", &serde_value, |b, value| {
        b.iter(|| serde_json::to_string(value).unwrap())
    });

    group.finish();
}

fn benchmark_large_array(c: &mut Criterion) {
    let array = Array::new();
    for _ in 0..1000 {
        array.push(true);
        array.push(false);
        array.push(Value::Null);
        array.push(12345);
        array.push(123.45e-7);
        array.push("string value");
    }
    bench_compare(c, "encode-large-array", &Value::Array(array));
}

fn benchmark_nested_object(c: &mut Criterion) {
    let mut value = Value::from(true);
    for i in 0..15 {
        let object = Object::new();
        object.insert("member name", value);
        object.insert("other member", [i, i + 1].into_iter().collect::<Array>());
        value = Value::Object(object);
    }
    bench_compare(c, "encode-nested-object", &value);
}

fn benchmark_shared_references(c: &mut Criterion) {
    let shared = Object::new();
    shared.insert("name", "value");
    shared.insert("items", Array::from(vec![Value::from(1), Value::from(2)]));
    let refs: Array = (0..1000).map(|_| Value::Object(shared.clone())).collect();
    let root = Object::new();
    root.insert("shared", shared);
    root.insert("refs", refs);
    let value = Value::Object(root);

    let mut group = c.benchmark_group("encode-shared-references");
    for policy in [CyclePolicy::Error, CyclePolicy::EmitPointer, CyclePolicy::EmitNull] {
        let settings = EncodeSettings {
            cycle_policy: policy,
            null_shared_references: true,
            ..Default::default()
        };
        group.bench_with_input(format!("jsongraph ({policy})"), &value, |b, value| {
            b.iter(|| jsongraph::to_string_with(value, &settings).unwrap())
        });
    }
    group.finish();
}

fn benchmark_large_strings(c: &mut Criterion) {
    let ascii = Value::from("this is a test string".repeat(10_000));
    bench_compare(c, "encode-large-ascii-string", &ascii);

    let escapes = Value::from("a\nb\tc\\d\"e\r".repeat(10_000));
    bench_compare(c, "encode-large-escapes-string", &escapes);
}

struct Point {
    x: i64,
    y: i64,
    label: String,
}

impl PullSource for Point {
    fn shape(&self) -> Shape {
        Shape::Object
    }

    fn push_children(&self, sink: &mut dyn ChildSink) -> Result<(), JsonError> {
        sink.child(Key::Name("x"), &self.x)?;
        sink.child(Key::Name("y"), &self.y)?;
        sink.child(Key::Name("label"), &self.label)
    }
}

fn benchmark_structs(c: &mut Criterion) {
    let points: Vec<Point> = (0..1000)
        .map(|i| Point {
            x: i,
            y: -i,
            label: format!("point {i}"),
        })
        .collect();

    let mut group = c.benchmark_group("encode-structs");
    group.bench_with_input("jsongraph", &points, |b, points| {
        b.iter(|| jsongraph::to_string(points).unwrap())
    });
    group.finish();
}

criterion_group!(
    benches,
    // Benchmark functions
    benchmark_large_array,
    benchmark_nested_object,
    benchmark_shared_references,
    benchmark_large_strings,
    benchmark_structs
);
criterion_main!(benches);
