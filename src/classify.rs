//! Классификатор значений.
//!
//! Решает, как значение будет закодировано: лист (атрибут или датасет) или
//! составное значение, требующее рекурсивного обхода. Чистая функция без
//! побочных эффектов, используется обоими движками.

use std::{borrow::Cow, collections::BTreeMap};

use crate::model::{ArrayData, Element, ElementType, NdArray, Object, Value};

/// Категория значения.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Class {
    Scalar,
    Absent,
    Array {
        element: ElementType,
        shape: Vec<usize>,
    },
    Mapping,
    Sequence,
    Object,
}

/// Результат классификации вместе с данными, которые понадобятся при
/// кодировании (приведённый массив не вычисляется повторно).
#[derive(Debug)]
pub enum Classified<'a> {
    Absent,
    Scalar(&'a Value),
    Array(Cow<'a, NdArray>),
    Mapping(&'a BTreeMap<String, Value>),
    Sequence(&'a [Value]),
    Object(&'a Object),
}

impl Classified<'_> {
    pub fn class(&self) -> Class {
        match self {
            Self::Absent => Class::Absent,
            Self::Scalar(_) => Class::Scalar,
            Self::Array(a) => Class::Array {
                element: a.element_type(),
                shape: a.shape().to_vec(),
            },
            Self::Mapping(_) => Class::Mapping,
            Self::Sequence(_) => Class::Sequence,
            Self::Object(_) => Class::Object,
        }
    }

    /// Лист кодируется одной записью узла (атрибутом или датасетом).
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Absent | Self::Scalar(_) | Self::Array(_))
    }
}

/// Классифицирует значение с включённым приведением Sequence → Array.
pub fn classify(value: &Value) -> Class {
    classify_with(value, true).class()
}

/// Классифицирует значение.
///
/// При `coerce = false` непустые последовательности всегда остаются
/// Sequence; пустая последовательность в любом случае становится массивом
/// нулевой длины.
pub fn classify_with(
    value: &Value,
    coerce: bool,
) -> Classified<'_> {
    match value {
        Value::Absent => Classified::Absent,
        Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Bytes(_) => {
            Classified::Scalar(value)
        }
        Value::Array(a) => Classified::Array(Cow::Borrowed(a)),
        Value::Mapping(m) => Classified::Mapping(m),
        Value::Object(o) => Classified::Object(o),
        Value::Sequence(items) if items.is_empty() => {
            Classified::Array(Cow::Owned(NdArray::empty(ElementType::F64)))
        }
        Value::Sequence(items) => match coerce.then(|| coerce_sequence(items)).flatten() {
            Some(array) => Classified::Array(Cow::Owned(array)),
            None => Classified::Sequence(items),
        },
    }
}

/// Пытается без потерь привести последовательность к массиву.
///
/// Все элементы должны быть одного примитивного типа (bool, int или float),
/// либо все должны быть массивами/последовательностями одной формы и типа,
/// тогда результат получает дополнительную ведущую ось. Смешение int и
/// float, байтовые строки, Absent и составные значения дают `None`.
pub fn coerce_sequence(items: &[Value]) -> Option<NdArray> {
    let Some(first) = items.first() else {
        return Some(NdArray::empty(ElementType::F64));
    };
    match first {
        Value::Bool(_) => collect_scalars(items, |v| match v {
            Value::Bool(b) => Some(*b),
            _ => None,
        }),
        Value::Int(_) => collect_scalars(items, |v| match v {
            Value::Int(i) => Some(*i),
            _ => None,
        }),
        Value::Float(_) => collect_scalars(items, |v| match v {
            Value::Float(f) => Some(*f),
            _ => None,
        }),
        Value::Array(_) | Value::Sequence(_) => stack(items),
        _ => None,
    }
}

fn collect_scalars<T: Element>(
    items: &[Value],
    pick: impl Fn(&Value) -> Option<T>,
) -> Option<NdArray> {
    items
        .iter()
        .map(pick)
        .collect::<Option<Vec<T>>>()
        .map(NdArray::from_vec)
}

fn stack(items: &[Value]) -> Option<NdArray> {
    let mut parts: Vec<Cow<'_, NdArray>> = Vec::with_capacity(items.len());
    for item in items {
        let part = match item {
            Value::Array(a) => Cow::Borrowed(a),
            Value::Sequence(s) => Cow::Owned(coerce_sequence(s)?),
            _ => return None,
        };
        parts.push(part);
    }

    let first = parts.first()?;
    let inner = first.shape().to_vec();
    let element = first.element_type();
    if parts
        .iter()
        .any(|p| p.shape() != inner.as_slice() || p.element_type() != element)
    {
        return None;
    }

    let mut data = ArrayData::with_capacity(element, first.len() * parts.len());
    for p in &parts {
        data.extend_from(p.data());
    }
    let mut shape = Vec::with_capacity(inner.len() + 1);
    shape.push(parts.len());
    shape.extend(inner);
    NdArray::new(shape, data).ok()
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
