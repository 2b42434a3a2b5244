//! Модель данных: значения, массивы и пользовательские типы.

pub mod array;
pub mod record;
pub mod value;

pub use array::{ArrayData, Element, ElementType, NdArray};
pub use record::{DynRecord, Object, Record};
pub use value::{FromValue, Value};
