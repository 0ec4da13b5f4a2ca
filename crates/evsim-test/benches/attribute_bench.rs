//! Benchmarks for attribute (de)serialization and string-keyed access

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use evsim_config::Config;
use evsim_core::Time;
use evsim_object::{
    create_object, make_data_rate_checker, make_time_checker, make_uinteger_checker, AttributeValue, DataRate,
    ObjectExt, ObjectFactory,
};
use evsim_test::{build_topology, register_types, Sample};

fn bench_serialize(c: &mut Criterion) {
    let checker = make_time_checker();
    let value = AttributeValue::from(Time::millis(1_500));

    c.bench_function("attribute_serialize_time", |b| {
        b.iter(|| black_box(&value).serialize_to_string(&checker))
    });
}

fn bench_deserialize(c: &mut Criterion) {
    let uinteger = make_uinteger_checker::<u32>();
    let rate = make_data_rate_checker();

    c.bench_function("attribute_deserialize_uinteger", |b| {
        b.iter(|| AttributeValue::deserialize_from_string(black_box("4096"), &uinteger))
    });
    c.bench_function("attribute_deserialize_data_rate", |b| {
        b.iter(|| AttributeValue::deserialize_from_string(black_box("5Mbps"), &rate))
    });
    c.bench_function("data_rate_parse", |b| {
        b.iter(|| black_box("1.5Gb/s").parse::<DataRate>())
    });
}

fn bench_set_attribute(c: &mut Criterion) {
    register_types();
    let sample = create_object::<Sample>();

    c.bench_function("object_set_attribute", |b| {
        let mut size = 1u32;
        b.iter(|| {
            size = size % 100 + 1;
            sample.set_attribute(black_box("Size"), size);
        })
    });
    c.bench_function("object_get_attribute", |b| {
        b.iter(|| black_box(sample.get_attribute(black_box("Label"))))
    });
}

fn bench_factory(c: &mut Criterion) {
    register_types();
    c.bench_function("object_factory_parse_create", |b| {
        b.iter(|| {
            let factory: ObjectFactory = black_box("T[Size=7|Label=bench|Enabled=false]").parse().unwrap();
            black_box(factory.create_as::<Sample>())
        })
    });
}

fn bench_config_set(c: &mut Criterion) {
    build_topology(16);
    c.bench_function("config_set_wildcard_path", |b| {
        b.iter(|| Config::set(black_box("/NodeList/*/$Ipv4/Ttl"), 32u8))
    });
}

criterion_group!(
    benches,
    bench_serialize,
    bench_deserialize,
    bench_set_attribute,
    bench_factory,
    bench_config_set,
);
criterion_main!(benches);
