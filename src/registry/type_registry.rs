use std::{
    any::{type_name, TypeId},
    fmt,
    marker::PhantomData,
    sync::Arc,
};

use ahash::{AHashMap, AHashSet};
use hgraph_error::{HgraphResult, RegistryError};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use super::{is_reserved, Schema};
use crate::{
    container::NodeId,
    engine::{Loader, Saver},
    model::{Object, Record, Value},
};

/// Процессный реестр, которым пользуются `save_object` / `load_object`.
static GLOBAL: Lazy<RwLock<TypeRegistry>> = Lazy::new(|| RwLock::new(TypeRegistry::new()));

/// Тип со стёртым параметром: всё, что движкам нужно знать о
/// зарегистрированном типе.
pub(crate) trait ErasedType: Send + Sync {
    fn tag(&self) -> &'static str;
    fn type_name(&self) -> &'static str;
    fn record_type_id(&self) -> TypeId;
    fn field_names(&self) -> Vec<&'static str>;
    /// Экземпляр по умолчанию (фабрика).
    fn instantiate(&self) -> Object;
    fn field_values(
        &self,
        object: &Object,
    ) -> Vec<(&'static str, Value)>;
    /// `None`, если поле не объявлено в схеме.
    fn set_field(
        &self,
        object: &mut Object,
        name: &str,
        value: Value,
    ) -> Option<HgraphResult<()>>;
    fn save_hook(
        &self,
        object: &Object,
        saver: &mut Saver<'_>,
        node: NodeId,
    ) -> Option<HgraphResult<()>>;
    fn load_hook(
        &self,
        loader: &mut Loader<'_>,
        node: NodeId,
    ) -> Option<HgraphResult<Object>>;
    fn post_load(
        &self,
        object: &mut Object,
    ) -> Option<HgraphResult<()>>;
}

struct SchemaType<T: Record> {
    tag: &'static str,
    schema: Schema<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> SchemaType<T> {
    fn record<'a>(
        &self,
        object: &'a Object,
    ) -> Option<&'a T> {
        object.downcast_ref::<T>()
    }
}

impl<T: Record> ErasedType for SchemaType<T> {
    fn tag(&self) -> &'static str {
        self.tag
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn record_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn field_names(&self) -> Vec<&'static str> {
        self.schema.fields().iter().map(|f| f.name()).collect()
    }

    fn instantiate(&self) -> Object {
        Object::new(T::default()).with_tag(self.tag)
    }

    fn field_values(
        &self,
        object: &Object,
    ) -> Vec<(&'static str, Value)> {
        match self.record(object) {
            Some(record) => self
                .schema
                .fields()
                .iter()
                .map(|f| (f.name(), f.get(record)))
                .collect(),
            None => Vec::new(),
        }
    }

    fn set_field(
        &self,
        object: &mut Object,
        name: &str,
        value: Value,
    ) -> Option<HgraphResult<()>> {
        let field = self.schema.find(name)?;
        let record = object.downcast_mut::<T>()?;
        Some(field.set(record, value))
    }

    fn save_hook(
        &self,
        object: &Object,
        saver: &mut Saver<'_>,
        node: NodeId,
    ) -> Option<HgraphResult<()>> {
        let hook = self.schema.get_save_hook()?;
        let record = self.record(object)?;
        Some(hook(record, saver, node))
    }

    fn load_hook(
        &self,
        loader: &mut Loader<'_>,
        node: NodeId,
    ) -> Option<HgraphResult<Object>> {
        let hook = self.schema.get_load_hook()?;
        Some(hook(loader, node).map(|record| Object::new(record).with_tag(self.tag)))
    }

    fn post_load(
        &self,
        object: &mut Object,
    ) -> Option<HgraphResult<()>> {
        let hook = self.schema.get_post_load()?;
        let record = object.downcast_mut::<T>()?;
        Some(hook(record))
    }
}

/// Запись реестра: тег, фабрика, схема и хуки одного типа.
#[derive(Clone)]
pub struct RegisteredType(pub(crate) Arc<dyn ErasedType>);

impl RegisteredType {
    pub fn tag(&self) -> &'static str {
        self.0.tag()
    }

    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.0.field_names()
    }

    pub fn instantiate(&self) -> Object {
        self.0.instantiate()
    }
}

impl fmt::Debug for RegisteredType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("RegisteredType")
            .field("tag", &self.tag())
            .field("type", &self.type_name())
            .finish()
    }
}

/// Реестр типов: взаимно однозначное соответствие тег ↔ тип.
///
/// Должен быть заполнен до загрузки контейнера, записанного с этими типами.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    by_tag: AHashMap<&'static str, RegisteredType>,
    by_type: AHashMap<TypeId, &'static str>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Процессный реестр.
    pub fn global() -> &'static RwLock<TypeRegistry> {
        &GLOBAL
    }

    /// Регистрирует `T` под его собственным тегом `T::TYPE_TAG`.
    pub fn register<T: Record>(&mut self) -> HgraphResult<()> {
        self.register_as::<T>(T::TYPE_TAG)
    }

    /// Регистрирует `T` под явным тегом.
    ///
    /// Повторная регистрация того же типа под тем же тегом ничего не делает.
    pub fn register_as<T: Record>(
        &mut self,
        tag: &'static str,
    ) -> HgraphResult<()> {
        let type_id = TypeId::of::<T>();

        if let Some(existing) = self.by_type.get(&type_id) {
            if *existing == tag {
                debug!(tag, type_name = type_name::<T>(), "Type already registered");
                return Ok(());
            }
            return Err(RegistryError::DuplicateType {
                type_name: type_name::<T>().to_string(),
                existing: existing.to_string(),
            }
            .into());
        }
        if let Some(existing) = self.by_tag.get(tag) {
            return Err(RegistryError::DuplicateTag {
                tag: tag.to_string(),
                existing: existing.type_name().to_string(),
            }
            .into());
        }

        let schema = T::schema();
        let mut seen = AHashSet::new();
        for field in schema.fields() {
            let name = field.name();
            if name.is_empty() || name.contains('/') || is_reserved(name) {
                return Err(RegistryError::ReservedField {
                    tag: tag.to_string(),
                    field: name.to_string(),
                }
                .into());
            }
            if !seen.insert(name) {
                return Err(RegistryError::DuplicateField {
                    tag: tag.to_string(),
                    field: name.to_string(),
                }
                .into());
            }
        }

        debug!(
            tag,
            type_name = type_name::<T>(),
            fields = schema.fields().len(),
            save_hook = schema.has_save_hook(),
            load_hook = schema.has_load_hook(),
            post_load = schema.has_post_load(),
            "Registered type"
        );
        let entry = RegisteredType(Arc::new(SchemaType {
            tag,
            schema,
            _marker: PhantomData,
        }));
        self.by_tag.insert(tag, entry);
        self.by_type.insert(type_id, tag);
        Ok(())
    }

    /// Builder-вариант [`TypeRegistry::register`].
    pub fn with<T: Record>(mut self) -> HgraphResult<Self> {
        self.register::<T>()?;
        Ok(self)
    }

    pub fn resolve(
        &self,
        tag: &str,
    ) -> Option<&RegisteredType> {
        self.by_tag.get(tag)
    }

    /// Запись по конкретному типу (используется при сохранении).
    pub fn resolve_type(
        &self,
        type_id: TypeId,
    ) -> Option<&RegisteredType> {
        self.by_type.get(&type_id).and_then(|tag| self.by_tag.get(tag))
    }

    pub fn contains(
        &self,
        tag: &str,
    ) -> bool {
        self.by_tag.contains_key(tag)
    }

    /// Все зарегистрированные теги в алфавитном порядке.
    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<_> = self.by_tag.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

/// Регистрирует `T` в глобальном реестре.
pub fn register_type<T: Record>() -> HgraphResult<()> {
    TypeRegistry::global().write().register::<T>()
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
