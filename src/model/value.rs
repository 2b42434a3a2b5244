use std::collections::BTreeMap;

use bytes::Bytes;
use hgraph_error::{GenericError, HgraphResult, StackError, StatusCode};
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serialize, Serializer,
};

use super::{ArrayData, NdArray, Object, Record};
use crate::classify::coerce_sequence;

/// Любое значение, которое движки умеют сохранять.
///
/// `Value` владеет своими ветвями: общих поддеревьев нет, поэтому в
/// сохранённом графе не бывает циклов.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Явное «нет значения»; отличается и от нуля, и от пустого массива.
    #[default]
    Absent,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Байтовая строка (текст хранится в UTF-8).
    Bytes(Bytes),
    /// Однородный прямоугольный числовой буфер.
    Array(NdArray),
    /// Имя поля → значение; имена уникальны, порядок не важен.
    Mapping(BTreeMap<String, Value>),
    /// Упорядоченный, возможно разнородный список.
    Sequence(Vec<Value>),
    /// Экземпляр зарегистрированного пользовательского типа.
    Object(Object),
}

/// Преобразование загруженного [`Value`] в конкретный тип.
///
/// Используется setter'ами схем: `record.rate = value.decode()?`.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> HgraphResult<Self>;
}

impl Value {
    /// Заворачивает запись в `Value::Object`.
    pub fn object<T: Record>(record: T) -> Self {
        Value::Object(Object::new(record))
    }

    /// Текст в виде байтовой строки UTF-8.
    pub fn text(s: impl Into<String>) -> Self {
        Value::Bytes(Bytes::from(s.into()))
    }

    /// Короткое имя варианта для сообщений и CLI.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Absent => "absent",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Mapping(_) => "mapping",
            Value::Sequence(_) => "sequence",
            Value::Object(_) => "object",
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Преобразует в `T`; несовпадение вида даёт `TypeError`.
    pub fn decode<T: FromValue>(self) -> HgraphResult<T> {
        T::from_value(self)
    }

    /// Достаёт запись типа `T` из `Value::Object`.
    pub fn into_record<T: Record>(self) -> HgraphResult<T> {
        match self {
            Value::Object(obj) => {
                let tag = obj.type_tag();
                obj.into_record::<T>()
                    .ok_or_else(|| type_error(T::TYPE_TAG, &format!("object '{tag}'")))
            }
            other => Err(type_error(T::TYPE_TAG, other.kind())),
        }
    }

    /// Structural equality modulo the Sequence → Array coercion.
    ///
    /// Числа с плавающей точкой сравниваются по значению, NaN равен NaN.
    /// Последовательность равна массиву, если приводится к нему. Пустые
    /// массивы одной формы равны при любом типе элемента.
    pub fn equivalent(
        &self,
        other: &Value,
    ) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Array(a), Value::Array(b)) => a.equivalent(b),
            (Value::Sequence(items), Value::Array(arr))
            | (Value::Array(arr), Value::Sequence(items)) => {
                coerce_sequence(items).is_some_and(|c| c.equivalent(arr))
            }
            (Value::Sequence(a), Value::Sequence(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
            }
            (Value::Mapping(a), Value::Mapping(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.equivalent(vb))
            }
            _ => self == other,
        }
    }
}

fn type_error(
    expected: &str,
    got: &str,
) -> StackError {
    StackError::new(GenericError::new(
        StatusCode::TypeError,
        format!("expected {expected}, got {got}"),
    ))
}

/// Элементы массива скалярами, построчно.
pub(crate) fn array_elements(data: &ArrayData) -> Vec<Value> {
    match data {
        ArrayData::Bool(v) => v.iter().map(|&b| Value::Bool(b)).collect(),
        ArrayData::U8(v) => v.iter().map(|&x| Value::Int(x as i64)).collect(),
        ArrayData::I32(v) => v.iter().map(|&x| Value::Int(x as i64)).collect(),
        ArrayData::I64(v) => v.iter().map(|&x| Value::Int(x)).collect(),
        ArrayData::F32(v) => v.iter().map(|&x| Value::Float(x as f64)).collect(),
        ArrayData::F64(v) => v.iter().map(|&x| Value::Float(x)).collect(),
    }
}

/// Делит массив по первой оси: скаляры для ранга 1, подмассивы для
/// больших рангов.
fn array_rows(array: &NdArray) -> Vec<Value> {
    if array.rank() <= 1 {
        return array_elements(array.data());
    }
    array.rows().into_iter().map(Value::Array).collect()
}

////////////////////////////////////////////////////////////////////////////////
// Конвертации в Value
////////////////////////////////////////////////////////////////////////////////

macro_rules! value_from {
    ($($ty:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $body
                }
            }
        )*
    };
}

value_from! {
    bool => |v| Value::Bool(v),
    i64 => |v| Value::Int(v),
    i32 => |v| Value::Int(v as i64),
    u32 => |v| Value::Int(v as i64),
    f64 => |v| Value::Float(v),
    f32 => |v| Value::Float(v as f64),
    &str => |v| Value::text(v),
    String => |v| Value::text(v),
    Bytes => |v| Value::Bytes(v),
    &[u8] => |v| Value::Bytes(Bytes::copy_from_slice(v)),
    NdArray => |v| Value::Array(v),
    Object => |v| Value::Object(v),
    Vec<Value> => |v| Value::Sequence(v),
    BTreeMap<String, Value> => |v| Value::Mapping(v),
    Vec<bool> => |v| Value::Array(NdArray::from_vec(v)),
    Vec<i32> => |v| Value::Array(NdArray::from_vec(v)),
    Vec<i64> => |v| Value::Array(NdArray::from_vec(v)),
    Vec<f32> => |v| Value::Array(NdArray::from_vec(v)),
    Vec<f64> => |v| Value::Array(NdArray::from_vec(v)),
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Absent, Into::into)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Конвертации из Value
////////////////////////////////////////////////////////////////////////////////

impl FromValue for Value {
    fn from_value(value: Value) -> HgraphResult<Self> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> HgraphResult<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(type_error("bool", other.kind())),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> HgraphResult<Self> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(type_error("int", other.kind())),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> HgraphResult<Self> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|_| type_error("i32", &format!("int {wide}")))
    }
}

impl FromValue for u32 {
    fn from_value(value: Value) -> HgraphResult<Self> {
        let wide = i64::from_value(value)?;
        u32::try_from(wide).map_err(|_| type_error("u32", &format!("int {wide}")))
    }
}

impl FromValue for usize {
    fn from_value(value: Value) -> HgraphResult<Self> {
        let wide = i64::from_value(value)?;
        usize::try_from(wide).map_err(|_| type_error("usize", &format!("int {wide}")))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> HgraphResult<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(type_error("float", other.kind())),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> HgraphResult<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl FromValue for Bytes {
    fn from_value(value: Value) -> HgraphResult<Self> {
        match value {
            Value::Bytes(b) => Ok(b),
            other => Err(type_error("bytes", other.kind())),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> HgraphResult<Self> {
        let bytes = Bytes::from_value(value)?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

impl FromValue for NdArray {
    fn from_value(value: Value) -> HgraphResult<Self> {
        match value {
            Value::Array(a) => Ok(a),
            Value::Sequence(items) => {
                coerce_sequence(&items).ok_or_else(|| type_error("array", "heterogeneous sequence"))
            }
            other => Err(type_error("array", other.kind())),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> HgraphResult<Self> {
        let items = match value {
            Value::Sequence(items) => items,
            Value::Array(a) => array_rows(&a),
            other => return Err(type_error("sequence", other.kind())),
        };
        items.into_iter().map(T::from_value).collect()
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> HgraphResult<Self> {
        match value {
            Value::Absent => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: Value) -> HgraphResult<Self> {
        match value {
            Value::Mapping(m) => m
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            other => Err(type_error("mapping", other.kind())),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// JSON-экспорт
////////////////////////////////////////////////////////////////////////////////

struct ArrayView<'a> {
    shape: &'a [usize],
    elements: &'a [Value],
}

impl Serialize for ArrayView<'_> {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let (&rows, inner) = match self.shape.split_first() {
            Some(split) => split,
            None => return self.elements.first().unwrap_or(&Value::Absent).serialize(serializer),
        };
        let mut seq = serializer.serialize_seq(Some(rows))?;
        if inner.is_empty() {
            for e in self.elements {
                seq.serialize_element(e)?;
            }
        } else {
            let stride = inner.iter().product::<usize>();
            for r in 0..rows {
                seq.serialize_element(&ArrayView {
                    shape: inner,
                    elements: &self.elements[r * stride..(r + 1) * stride],
                })?;
            }
        }
        seq.end()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match self {
            Value::Absent => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => serializer.serialize_str(s),
                Err(_) => serializer.collect_seq(b.iter()),
            },
            Value::Array(a) => {
                let elements = array_elements(a.data());
                ArrayView {
                    shape: a.shape(),
                    elements: &elements,
                }
                .serialize(serializer)
            }
            Value::Mapping(m) => serializer.collect_map(m),
            Value::Sequence(items) => serializer.collect_seq(items),
            Value::Object(obj) => {
                let fields = obj.fields();
                let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
                map.serialize_entry("__type__", obj.type_tag())?;
                for (name, value) in &fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
