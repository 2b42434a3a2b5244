//! Генераторы для property-based тестирования графов значений.
//!
//! Каждый генератор создаёт стратегию для случайных, но допустимых для
//! сохранения значений: имена полей не начинаются с `__`, глубина
//! вложенности ограничена.

#![allow(dead_code)]

use std::{collections::BTreeMap, ops::RangeInclusive};

use bytes::Bytes;
use hgraph::{ArrayData, NdArray, Value};
use proptest::{collection, prelude::*, string::string_regex};

/// Размеры коллекций.
const SMALL_SIZE: RangeInclusive<usize> = 0..=5;

/// Порог сжатия по умолчанию (байты).
pub const COMPRESSION_THRESHOLD: usize = 64;

/// Имя поля: латиница, цифры и `_`, первая буква обязательна.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    string_regex("[a-z][a-z0-9_]{0,7}").unwrap()
}

/// Числа с плавающей точкой, включая граничные значения.
pub fn float_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(0.0f64),
        Just(-0.0f64),
        Just(f64::MIN),
        Just(f64::MAX),
        Just(f64::MIN_POSITIVE),
        Just(f64::INFINITY),
        Just(f64::NAN),
        any::<f64>(),
    ]
}

/// Скаляры и Absent.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Absent),
        any::<bool>().prop_map(Value::Bool),
        prop_oneof![Just(i64::MIN), Just(i64::MAX), Just(0i64), any::<i64>()].prop_map(Value::Int),
        float_strategy().prop_map(Value::Float),
        collection::vec(any::<u8>(), 0..32).prop_map(|b| Value::Bytes(Bytes::from(b))),
    ]
}

/// Двумерные массивы разных типов, в том числе больше порога сжатия.
pub fn array_strategy() -> impl Strategy<Value = NdArray> {
    let dims = (1usize..4, 0usize..40);
    dims.prop_flat_map(|(rows, cols)| {
        let n = rows * cols;
        prop_oneof![
            collection::vec(any::<i32>(), n).prop_map(ArrayData::I32),
            collection::vec(any::<u8>(), n).prop_map(ArrayData::U8),
            collection::vec(float_strategy(), n).prop_map(ArrayData::F64),
            collection::vec(any::<f32>(), n).prop_map(ArrayData::F32),
            collection::vec(any::<bool>(), n).prop_map(ArrayData::Bool),
        ]
        .prop_map(move |data| NdArray::new(vec![rows, cols], data).unwrap())
    })
}

/// Листовые значения: скаляры, Absent и массивы.
pub fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => scalar_strategy(),
        1 => array_strategy().prop_map(Value::Array),
    ]
}

/// Однородная последовательность целых: при сохранении приводится к
/// массиву.
pub fn int_sequence_strategy() -> impl Strategy<Value = Value> {
    collection::vec(any::<i64>(), SMALL_SIZE)
        .prop_map(|v| Value::Sequence(v.into_iter().map(Value::Int).collect()))
}

/// Произвольный граф без объектов.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            collection::vec(inner.clone(), SMALL_SIZE).prop_map(Value::Sequence),
            collection::btree_map(field_name_strategy(), inner, SMALL_SIZE)
                .prop_map(|m: BTreeMap<String, Value>| Value::Mapping(m)),
            int_sequence_strategy(),
        ]
    })
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use proptest::{strategy::ValueTree, test_runner::TestRunner};

    use super::*;

    /// Тест проверяет, что имена полей никогда не служебные и не пустые.
    #[test]
    fn test_field_names_are_valid() {
        let mut runner = TestRunner::default();
        for _ in 0..200 {
            let name = field_name_strategy()
                .new_tree(&mut runner)
                .unwrap()
                .current();
            assert!(!name.is_empty());
            assert!(!name.starts_with("__"));
            assert!(!name.contains('/'));
        }
    }

    /// Тест проверяет согласованность формы и буфера сгенерированных
    /// массивов.
    #[test]
    fn test_arrays_are_rectangular() {
        let mut runner = TestRunner::default();
        for _ in 0..100 {
            let array = array_strategy().new_tree(&mut runner).unwrap().current();
            assert_eq!(array.rank(), 2);
            assert_eq!(array.len(), array.shape().iter().product::<usize>());
        }
    }
}
