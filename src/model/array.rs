use std::fmt;

use hgraph_error::{GenericError, HgraphResult, StackError, StatusCode};
use serde::{Deserialize, Serialize};

/// Примитивный тип элемента массива.
///
/// Значение дискриминанта совпадает с байтом, которым тип кодируется в
/// файле HGF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ElementType {
    Bool = 1,
    U8 = 2,
    I32 = 3,
    I64 = 4,
    F32 = 5,
    F64 = 6,
}

/// Типизированный непрерывный буфер элементов.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Bool(Vec<bool>),
    U8(Vec<u8>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Однородный прямоугольный числовой массив произвольного ранга.
///
/// Элементы хранятся в row-major порядке; произведение измерений `shape`
/// всегда равно длине буфера.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    shape: Vec<usize>,
    data: ArrayData,
}

/// Примитив, который может быть элементом [`NdArray`].
pub trait Element: Copy + Send + Sync + 'static {
    const TYPE: ElementType;

    fn wrap(values: Vec<Self>) -> ArrayData;
    fn slice(data: &ArrayData) -> Option<&[Self]>;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const TYPE: ElementType = ElementType::$variant;

            fn wrap(values: Vec<Self>) -> ArrayData {
                ArrayData::$variant(values)
            }

            fn slice(data: &ArrayData) -> Option<&[Self]> {
                match data {
                    ArrayData::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(bool, Bool);
impl_element!(u8, U8);
impl_element!(i32, I32);
impl_element!(i64, I64);
impl_element!(f32, F32);
impl_element!(f64, F64);

impl ElementType {
    /// Размер одного элемента в байтах при сериализации.
    pub fn size(self) -> usize {
        match self {
            Self::Bool | Self::U8 => 1,
            Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Bool),
            2 => Some(Self::U8),
            3 => Some(Self::I32),
            4 => Some(Self::I64),
            5 => Some(Self::F32),
            6 => Some(Self::F64),
            _ => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ArrayData {
    /// Пустой буфер заданного типа.
    pub fn empty(element: ElementType) -> Self {
        Self::with_capacity(element, 0)
    }

    pub fn with_capacity(
        element: ElementType,
        capacity: usize,
    ) -> Self {
        match element {
            ElementType::Bool => Self::Bool(Vec::with_capacity(capacity)),
            ElementType::U8 => Self::U8(Vec::with_capacity(capacity)),
            ElementType::I32 => Self::I32(Vec::with_capacity(capacity)),
            ElementType::I64 => Self::I64(Vec::with_capacity(capacity)),
            ElementType::F32 => Self::F32(Vec::with_capacity(capacity)),
            ElementType::F64 => Self::F64(Vec::with_capacity(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::U8(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Bool(_) => ElementType::Bool,
            Self::U8(_) => ElementType::U8,
            Self::I32(_) => ElementType::I32,
            Self::I64(_) => ElementType::I64,
            Self::F32(_) => ElementType::F32,
            Self::F64(_) => ElementType::F64,
        }
    }

    /// Дописывает элементы `other` в конец буфера.
    ///
    /// Возвращает `false`, если типы элементов различаются (буфер не
    /// изменяется).
    pub fn extend_from(
        &mut self,
        other: &ArrayData,
    ) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.extend_from_slice(b),
            (Self::U8(a), Self::U8(b)) => a.extend_from_slice(b),
            (Self::I32(a), Self::I32(b)) => a.extend_from_slice(b),
            (Self::I64(a), Self::I64(b)) => a.extend_from_slice(b),
            (Self::F32(a), Self::F32(b)) => a.extend_from_slice(b),
            (Self::F64(a), Self::F64(b)) => a.extend_from_slice(b),
            _ => return false,
        }
        true
    }

    /// Копия `len` элементов начиная с `start`.
    fn slice_range(
        &self,
        start: usize,
        len: usize,
    ) -> ArrayData {
        let end = start + len;
        match self {
            Self::Bool(v) => Self::Bool(v[start..end].to_vec()),
            Self::U8(v) => Self::U8(v[start..end].to_vec()),
            Self::I32(v) => Self::I32(v[start..end].to_vec()),
            Self::I64(v) => Self::I64(v[start..end].to_vec()),
            Self::F32(v) => Self::F32(v[start..end].to_vec()),
            Self::F64(v) => Self::F64(v[start..end].to_vec()),
        }
    }

    /// Сравнение элементов, при котором NaN равен NaN.
    pub fn same_elements(
        &self,
        other: &ArrayData,
    ) -> bool {
        match (self, other) {
            (Self::F32(a), Self::F32(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
            }
            (Self::F64(a), Self::F64(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
            }
            _ => self == other,
        }
    }
}

impl NdArray {
    /// Создаёт массив, проверяя согласованность формы и буфера.
    pub fn new(
        shape: Vec<usize>,
        data: ArrayData,
    ) -> HgraphResult<Self> {
        let expected = shape_len(&shape).ok_or_else(|| {
            StackError::new(GenericError::new(
                StatusCode::SizeLimit,
                format!("Array shape {shape:?} overflows usize"),
            ))
        })?;
        if expected != data.len() {
            return Err(StackError::new(GenericError::new(
                StatusCode::InvalidData,
                format!(
                    "Array shape {shape:?} needs {expected} elements, buffer holds {}",
                    data.len()
                ),
            )));
        }
        Ok(Self { shape, data })
    }

    /// Одномерный массив из вектора.
    pub fn from_vec<T: Element>(values: Vec<T>) -> Self {
        Self {
            shape: vec![values.len()],
            data: T::wrap(values),
        }
    }

    /// Одномерный массив нулевой длины.
    pub fn empty(element: ElementType) -> Self {
        Self {
            shape: vec![0],
            data: ArrayData::empty(element),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Общее количество элементов.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn into_parts(self) -> (Vec<usize>, ArrayData) {
        (self.shape, self.data)
    }

    /// Меняет форму, сохраняя количество элементов.
    pub fn reshape(
        self,
        shape: Vec<usize>,
    ) -> HgraphResult<Self> {
        Self::new(shape, self.data)
    }

    /// Срез элементов, если тип совпадает с `T`.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(&self.data)
    }

    /// Подмассивы вдоль первой оси (для ранга >= 2).
    pub fn rows(&self) -> Vec<NdArray> {
        let Some((&count, inner)) = self.shape.split_first() else {
            return Vec::new();
        };
        let stride = inner.iter().product::<usize>();
        (0..count)
            .map(|r| NdArray {
                shape: inner.to_vec(),
                data: self.data.slice_range(r * stride, stride),
            })
            .collect()
    }

    /// Копия элементов, если тип совпадает с `T`.
    pub fn to_vec<T: Element>(&self) -> Option<Vec<T>> {
        self.as_slice::<T>().map(<[T]>::to_vec)
    }

    /// Размер полезной нагрузки в байтах.
    pub fn byte_len(&self) -> usize {
        self.len() * self.element_type().size()
    }

    /// Равенство формы и элементов (NaN равен NaN). Пустые массивы одной
    /// формы равны независимо от типа элементов.
    pub fn equivalent(
        &self,
        other: &NdArray,
    ) -> bool {
        if self.shape != other.shape {
            return false;
        }
        if self.is_empty() {
            return true;
        }
        self.data.same_elements(&other.data)
    }
}

/// Произведение измерений, `None` при переполнении.
pub(crate) fn shape_len(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

impl<T: Element> From<Vec<T>> for NdArray {
    fn from(values: Vec<T>) -> Self {
        Self::from_vec(values)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что форма и длина буфера должны совпадать.
    #[test]
    fn test_new_validates_shape() {
        let ok = NdArray::new(vec![2, 3], ArrayData::I64(vec![1, 2, 3, 4, 5, 6])).unwrap();
        assert_eq!(ok.rank(), 2);
        assert_eq!(ok.len(), 6);

        let err = NdArray::new(vec![2, 2], ArrayData::I64(vec![1, 2, 3])).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidData);
    }

    #[test]
    fn test_from_vec_is_one_dimensional() {
        let a = NdArray::from_vec(vec![1.5f64, 2.5]);
        assert_eq!(a.shape(), &[2]);
        assert_eq!(a.element_type(), ElementType::F64);
        assert_eq!(a.as_slice::<f64>(), Some(&[1.5, 2.5][..]));
        assert!(a.as_slice::<i64>().is_none());
    }

    #[test]
    fn test_reshape() {
        let a = NdArray::from_vec(vec![1i32, 2, 3, 4]).reshape(vec![2, 2]).unwrap();
        assert_eq!(a.shape(), &[2, 2]);
        assert!(NdArray::from_vec(vec![1i32, 2, 3]).reshape(vec![2, 2]).is_err());
    }

    #[test]
    fn test_element_type_byte_roundtrip() {
        for t in [
            ElementType::Bool,
            ElementType::U8,
            ElementType::I32,
            ElementType::I64,
            ElementType::F32,
            ElementType::F64,
        ] {
            assert_eq!(ElementType::from_byte(t as u8), Some(t));
        }
        assert_eq!(ElementType::from_byte(0), None);
        assert_eq!(ElementType::from_byte(7), None);
    }

    /// Тест проверяет, что NaN считается равным NaN при сравнении массивов.
    #[test]
    fn test_equivalent_nan_and_empty() {
        let a = NdArray::from_vec(vec![f64::NAN, 1.0]);
        let b = NdArray::from_vec(vec![f64::NAN, 1.0]);
        assert_ne!(a, b);
        assert!(a.equivalent(&b));

        let e1 = NdArray::empty(ElementType::F64);
        let e2 = NdArray::empty(ElementType::I64);
        assert!(e1.equivalent(&e2));
    }

    #[test]
    fn test_extend_from_rejects_mixed_types() {
        let mut a = ArrayData::I64(vec![1]);
        assert!(a.extend_from(&ArrayData::I64(vec![2, 3])));
        assert_eq!(a.len(), 3);
        assert!(!a.extend_from(&ArrayData::F64(vec![1.0])));
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_rows_keep_element_type() {
        let m = NdArray::new(vec![2, 3], ArrayData::U8(vec![1, 2, 3, 4, 5, 6])).unwrap();
        let rows = m.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].shape(), &[3]);
        assert_eq!(rows[1].as_slice::<u8>(), Some(&[4, 5, 6][..]));
    }

    #[test]
    fn test_byte_len() {
        let a = NdArray::new(vec![2, 2], ArrayData::F32(vec![0.0; 4])).unwrap();
        assert_eq!(a.byte_len(), 16);
    }
}
