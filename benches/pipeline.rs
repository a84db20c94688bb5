//! Performance benchmarks for a3s-changelog
//!
//! Run with: cargo bench

use a3s_changelog::{
    record, register, with_actor, ChangeLog, Context, Database, EntitySchema, FieldSchema,
    LoggableModel, MemoryDatabase, Model, Operation, Options, Statement,
};
use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};

#[derive(Default)]
struct Order {
    id: Option<u64>,
    customer: String,
    total: i64,
    loggable: LoggableModel,
}

impl Model for Order {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "ID" => self.id.map(Value::from),
            "Customer" => Some(json!(self.customer)),
            "Total" => Some(json!(self.total)),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> bool {
        match name {
            "ID" => self.id = value.as_u64(),
            "Customer" => self.customer = value.as_str().unwrap_or_default().to_string(),
            "Total" => self.total = value.as_i64().unwrap_or_default(),
            _ => return false,
        }
        true
    }

    fn loggable_marker(&self) -> Option<&LoggableModel> {
        Some(&self.loggable)
    }
}

fn order_schema() -> EntitySchema {
    EntitySchema::new("Order", "orders")
        .field(FieldSchema::named("ID").primary_key().auto_increment())
        .field(FieldSchema::named("Customer").loggable())
        .field(FieldSchema::named("Total").loggable())
        .field(FieldSchema::marker("LoggableModel"))
}

fn order() -> Order {
    Order {
        id: None,
        customer: "acme".to_string(),
        total: 4200,
        loggable: LoggableModel,
    }
}

fn bench_record_build(c: &mut Criterion) {
    let schema = order_schema();
    let mut model = order();
    model.id = Some(7);
    let options = Options::new().with_compute_diff();
    let stmt = Statement::for_schema(&schema, &model)
        .with_context(with_actor(&Context::background(), "bench"))
        .with_changed(["Total"]);

    c.bench_function("record::build update", |b| {
        b.iter(|| record::build(&options, &stmt, Operation::Update));
    });

    let log = record::build(&options, &stmt, Operation::Update).unwrap();
    c.bench_function("ChangeLog to_row", |b| {
        b.iter(|| log.to_row().unwrap());
    });

    let row = log.to_row().unwrap();
    c.bench_function("ChangeLog from_row", |b| {
        b.iter(|| ChangeLog::from_row(&row).unwrap());
    });
}

fn bench_memory_create(c: &mut Criterion) {
    let schema = order_schema();
    let ctx = Context::background();

    let plain = MemoryDatabase::new();
    plain.auto_migrate(&schema.table_schema()).unwrap();
    c.bench_function("MemoryDatabase create", |b| {
        b.iter(|| plain.create(&ctx, &schema, &mut order()).unwrap());
    });

    let audited = MemoryDatabase::new();
    register(&audited, Options::new()).unwrap();
    audited.auto_migrate(&schema.table_schema()).unwrap();
    c.bench_function("MemoryDatabase create (audited)", |b| {
        b.iter(|| audited.create(&ctx, &schema, &mut order()).unwrap());
    });
}

criterion_group!(benches, bench_record_build, bench_memory_create);
criterion_main!(benches);
