#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use hgraph::{Engine, MemContainer, TypeRegistry, Value};
use libfuzzer_sys::fuzz_target;

/// Упрощённое дерево значений, которое умеет строить `arbitrary`.
#[derive(Debug, Arbitrary)]
enum FuzzValue {
    Absent,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Floats(Vec<f64>),
    Sequence(Vec<FuzzValue>),
    Mapping(Vec<(String, FuzzValue)>),
}

impl FuzzValue {
    fn into_value(
        self,
        depth: usize,
    ) -> Value {
        if depth > 8 {
            return Value::Absent;
        }
        match self {
            FuzzValue::Absent => Value::Absent,
            FuzzValue::Bool(b) => Value::Bool(b),
            FuzzValue::Int(i) => Value::Int(i),
            FuzzValue::Float(f) => Value::Float(f),
            FuzzValue::Text(s) => Value::text(s),
            FuzzValue::Floats(v) => Value::from(v),
            FuzzValue::Sequence(items) => Value::Sequence(
                items.into_iter().map(|v| v.into_value(depth + 1)).collect(),
            ),
            FuzzValue::Mapping(entries) => Value::Mapping(
                entries
                    .into_iter()
                    // Служебные и составные имена отвергаются при сохранении.
                    .filter(|(k, _)| !k.is_empty() && !k.starts_with("__") && !k.contains('/'))
                    .map(|(k, v)| (k, v.into_value(depth + 1)))
                    .collect::<BTreeMap<_, _>>(),
            ),
        }
    }
}

fuzz_target!(|input: FuzzValue| {
    let value = input.into_value(0);
    let registry = TypeRegistry::new();
    let engine = Engine::new(&registry);

    let mut container = MemContainer::new();
    engine
        .save(&value, &mut container)
        .unwrap_or_else(|err| panic!("save failed: {err}"));
    let loaded = engine
        .load(&container)
        .unwrap_or_else(|err| panic!("load failed: {err}"));
    assert!(value.equivalent(&loaded), "saved {value:?}\nloaded {loaded:?}");
});
