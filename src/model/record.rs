use std::{
    any::{Any, TypeId},
    fmt,
};

use super::Value;
use crate::registry::Schema;

/// Пользовательский тип, который можно сохранить как Object.
///
/// Тип объявляет уникальный тег (записывается в контейнер) и
/// дескриптор [`Schema`]: упорядоченный список полей и необязательные хуки.
/// `Default` служит фабрикой экземпляра при загрузке: поля заполняются
/// setter'ами поверх значения по умолчанию.
///
/// ```
/// use hgraph::{Record, Schema};
///
/// #[derive(Debug, Clone, Default, PartialEq)]
/// struct Unit {
///     id: i64,
///     rate: f64,
/// }
///
/// impl Record for Unit {
///     const TYPE_TAG: &'static str = "Unit";
///
///     fn schema() -> Schema<Self> {
///         Schema::<Self>::new()
///             .field("id", |u| u.id.into(), |u, v| {
///                 u.id = v.decode()?;
///                 Ok(())
///             })
///             .field("rate", |u| u.rate.into(), |u, v| {
///                 u.rate = v.decode()?;
///                 Ok(())
///             })
///     }
/// }
///
/// assert_eq!(Unit::schema().fields().len(), 2);
/// ```
pub trait Record: Default + Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    const TYPE_TAG: &'static str;

    fn schema() -> Schema<Self>;
}

/// Object-safe часть [`Record`], через которую работает [`Object`].
pub trait DynRecord: Any + Send + Sync + fmt::Debug {
    fn type_tag(&self) -> &'static str;
    fn type_name(&self) -> &'static str;
    fn clone_record(&self) -> Box<dyn DynRecord>;
    fn eq_record(
        &self,
        other: &dyn DynRecord,
    ) -> bool;
    /// Значения полей в порядке объявления схемы.
    fn field_values(&self) -> Vec<(&'static str, Value)>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Record> DynRecord for T {
    fn type_tag(&self) -> &'static str {
        T::TYPE_TAG
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn clone_record(&self) -> Box<dyn DynRecord> {
        Box::new(self.clone())
    }

    fn eq_record(
        &self,
        other: &dyn DynRecord,
    ) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|o| self == o)
    }

    fn field_values(&self) -> Vec<(&'static str, Value)> {
        T::schema()
            .fields()
            .iter()
            .map(|f| (f.name(), f.get(self)))
            .collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Экземпляр зарегистрированного пользовательского типа со стёртым типом.
///
/// Тег по умолчанию равен `T::TYPE_TAG`. Объект, созданный загрузчиком,
/// несёт тег, под которым тип зарегистрирован (см.
/// [`TypeRegistry::register_as`](crate::TypeRegistry::register_as)).
pub struct Object {
    inner: Box<dyn DynRecord>,
    tag: &'static str,
}

impl Object {
    pub fn new<T: Record>(record: T) -> Self {
        Self {
            inner: Box::new(record),
            tag: T::TYPE_TAG,
        }
    }

    pub(crate) fn with_tag(
        mut self,
        tag: &'static str,
    ) -> Self {
        self.tag = tag;
        self
    }

    /// Тег, с которым объект пишется в JSON и в отладочный вывод.
    pub fn type_tag(&self) -> &'static str {
        self.tag
    }

    pub fn type_name(&self) -> &'static str {
        self.inner.type_name()
    }

    /// `TypeId` конкретного типа записи.
    pub fn record_type_id(&self) -> TypeId {
        self.inner.as_any().type_id()
    }

    pub fn is<T: Record>(&self) -> bool {
        self.inner.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Record>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Record>(&mut self) -> Option<&mut T> {
        self.inner.as_any_mut().downcast_mut::<T>()
    }

    pub fn into_record<T: Record>(self) -> Option<T> {
        self.inner.into_any().downcast::<T>().ok().map(|b| *b)
    }

    pub fn fields(&self) -> Vec<(&'static str, Value)> {
        self.inner.field_values()
    }
}

impl Clone for Object {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_record(),
            tag: self.tag,
        }
    }
}

impl PartialEq for Object {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.inner.eq_record(other.inner.as_ref())
    }
}

impl fmt::Debug for Object {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Object<{}>({:?})", self.type_tag(), self.inner)
    }
}
