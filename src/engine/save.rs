use std::collections::BTreeMap;

use bytes::Bytes;
use hgraph_error::{BackendError, EncodeError, HgraphResult, ResultExt, StackError};
use tracing::trace;

use super::{format_path, reflist, EngineOptions};
use crate::{
    classify::{classify_with, Classified},
    container::{Attr, Container, Dataset, NodeId},
    model::{Object, Value},
    registry::{is_reserved, TypeRegistry, DATA_ENTRY, MAPPING_MARKER_ATTR, TYPE_TAG_ATTR},
};

/// Состояние одного прохода сохранения.
///
/// Передаётся в save hook, чтобы тот мог писать поля тем же способом, что и
/// обход по умолчанию.
pub struct Saver<'a> {
    container: &'a mut dyn Container,
    registry: &'a TypeRegistry,
    options: &'a EngineOptions,
    path: Vec<String>,
}

impl<'a> Saver<'a> {
    pub(crate) fn new(
        container: &'a mut dyn Container,
        registry: &'a TypeRegistry,
        options: &'a EngineOptions,
    ) -> Self {
        Self {
            container,
            registry,
            options,
            path: Vec::new(),
        }
    }

    /// Контейнер, в который идёт запись.
    pub fn container(&mut self) -> &mut dyn Container {
        &mut *self.container
    }

    /// Текущий путь в дереве, например `/units/[2]/rate`.
    pub fn path(&self) -> String {
        format_path(&self.path)
    }

    /// Пишет `value` как содержимое узла `node`.
    ///
    /// Отображение и объект раскладываются по записям узла; всё остальное
    /// пишется под именем `data`.
    pub fn save_into(
        &mut self,
        node: NodeId,
        value: &Value,
    ) -> HgraphResult<()> {
        match value {
            Value::Mapping(m) => self.write_mapping(node, m),
            Value::Object(o) => self.write_object(node, o),
            other => self.save_field(node, DATA_ENTRY, other),
        }
    }

    /// Пишет `value` в запись `name` узла `node`.
    pub fn save_field(
        &mut self,
        node: NodeId,
        name: &str,
        value: &Value,
    ) -> HgraphResult<()> {
        self.check_name(name)?;
        self.enter(name)?;
        let result = self.write_field(node, name, value);
        self.leave();
        result
    }

    fn write_field(
        &mut self,
        node: NodeId,
        name: &str,
        value: &Value,
    ) -> HgraphResult<()> {
        match classify_with(value, self.options.coerce_sequences) {
            Classified::Absent => self.set_attribute(node, name, Attr::Absent),
            Classified::Scalar(scalar) => {
                let attr = self.scalar_attr(scalar)?;
                self.set_attribute(node, name, attr)
            }
            Classified::Array(array) => {
                self.create_dataset(node, name, Dataset::Array(array.into_owned()))
            }
            Classified::Mapping(m) => {
                let child = self.create_child(node, name)?;
                self.write_mapping(child, m)
            }
            Classified::Object(o) => {
                let child = self.create_child(node, name)?;
                self.write_object(child, o)
            }
            Classified::Sequence(items) => reflist::write_list(self, node, name, items),
        }
    }

    fn write_mapping(
        &mut self,
        node: NodeId,
        mapping: &BTreeMap<String, Value>,
    ) -> HgraphResult<()> {
        // {data: лист} без маркера читался бы как анонимное значение.
        if mapping.len() == 1 {
            if let Some(inner) = mapping.get(DATA_ENTRY) {
                if !matches!(inner, Value::Mapping(_) | Value::Object(_)) {
                    self.set_attribute(node, MAPPING_MARKER_ATTR, Attr::Bool(true))?;
                }
            }
        }
        for (name, value) in mapping {
            self.save_field(node, name, value)?;
        }
        Ok(())
    }

    fn write_object(
        &mut self,
        node: NodeId,
        object: &Object,
    ) -> HgraphResult<()> {
        let registry = self.registry;
        let entry = registry
            .resolve_type(object.record_type_id())
            .ok_or_else(|| EncodeError::UnregisteredType {
                type_name: object.type_name().to_string(),
                path: self.path(),
            })?;
        let tag = entry.tag();
        self.set_attribute(node, TYPE_TAG_ATTR, Attr::Bytes(Bytes::from_static(tag.as_bytes())))?;

        if let Some(result) = entry.0.save_hook(object, self, node) {
            trace!(tag, path = %self.path(), "Save hook invoked");
            return result.with_context(|| format!("Save hook of '{tag}' failed at {}", self.path()));
        }

        for (name, value) in entry.0.field_values(object) {
            self.save_field(node, name, &value)?;
        }
        Ok(())
    }

    fn scalar_attr(
        &self,
        value: &Value,
    ) -> HgraphResult<Attr> {
        Ok(match value {
            Value::Bool(b) => Attr::Bool(*b),
            Value::Int(i) => Attr::Int(*i),
            Value::Float(f) => Attr::Float(*f),
            Value::Bytes(b) => Attr::Bytes(b.clone()),
            other => {
                return Err(EncodeError::UnsupportedValue {
                    path: self.path(),
                    reason: format!("{} is not a scalar", other.kind()),
                }
                .into())
            }
        })
    }

    fn check_name(
        &self,
        name: &str,
    ) -> HgraphResult<()> {
        if is_reserved(name) {
            return Err(EncodeError::ReservedName {
                name: name.to_string(),
                path: self.path(),
            }
            .into());
        }
        if name.is_empty() || name.contains('/') {
            return Err(EncodeError::UnsupportedValue {
                path: self.path(),
                reason: format!("invalid entry name {name:?}"),
            }
            .into());
        }
        Ok(())
    }

    pub(crate) fn enter(
        &mut self,
        segment: impl Into<String>,
    ) -> HgraphResult<()> {
        if self.path.len() >= self.options.max_depth {
            return Err(EncodeError::DepthLimit {
                limit: self.options.max_depth,
                path: self.path(),
            }
            .into());
        }
        self.path.push(segment.into());
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.path.pop();
    }

    pub(crate) fn create_child(
        &mut self,
        node: NodeId,
        name: &str,
    ) -> HgraphResult<NodeId> {
        let result = self.container.create_child(node, name);
        result.map_err(|e| self.collision(e, name))
    }

    fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: Attr,
    ) -> HgraphResult<()> {
        // Контейнер заменяет атрибут молча; при сохранении занятое имя
        // отвергается так же, как для узлов и датасетов.
        if self.container.entry(node, name)?.is_some() {
            return Err(EncodeError::NameCollision {
                name: name.to_string(),
                path: self.path(),
            }
            .into());
        }
        let result = self.container.set_attribute(node, name, value);
        result.map_err(|e| self.collision(e, name))
    }

    pub(crate) fn create_dataset(
        &mut self,
        node: NodeId,
        name: &str,
        data: Dataset,
    ) -> HgraphResult<()> {
        let result = self.container.create_dataset(node, name, data);
        result.map_err(|e| self.collision(e, name))
    }

    /// `NameTaken` из контейнера превращается в ошибку кодирования с путём.
    fn collision(
        &self,
        err: StackError,
        name: &str,
    ) -> StackError {
        match err.downcast_ref::<BackendError>() {
            Some(BackendError::NameTaken { .. }) => EncodeError::NameCollision {
                name: name.to_string(),
                path: self.path(),
            }
            .into(),
            _ => err,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use hgraph_error::StatusCode;

    use super::*;
    use crate::{
        container::{EntryKind, MemContainer},
        model::{NdArray, Record},
        registry::Schema,
    };

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Gauge {
        depth: f64,
        label: String,
    }

    impl Record for Gauge {
        const TYPE_TAG: &'static str = "Gauge";

        fn schema() -> Schema<Self> {
            Schema::<Self>::new()
                .field(
                    "depth",
                    |p| p.depth.into(),
                    |p, v| {
                        p.depth = v.decode()?;
                        Ok(())
                    },
                )
                .field(
                    "label",
                    |p| p.label.as_str().into(),
                    |p, v| {
                        p.label = v.decode()?;
                        Ok(())
                    },
                )
        }
    }

    fn save(
        value: &Value,
        registry: &TypeRegistry,
    ) -> HgraphResult<MemContainer> {
        let mut c = MemContainer::new();
        let options = EngineOptions::default();
        let root = c.root();
        Saver::new(&mut c, registry, &options).save_into(root, value)?;
        Ok(c)
    }

    fn kinds(
        c: &MemContainer,
        node: NodeId,
    ) -> Vec<(String, EntryKind)> {
        c.entries(node)
            .unwrap()
            .into_iter()
            .map(|(n, e)| (n.to_string(), e.kind()))
            .collect()
    }

    #[test]
    fn test_leaf_root_goes_to_data() {
        let reg = TypeRegistry::new();
        let c = save(&Value::Int(5), &reg).unwrap();
        assert_eq!(c.attribute(NodeId::ROOT, DATA_ENTRY).unwrap(), &Attr::Int(5));

        let c = save(&Value::from(vec![1i64, 2, 3]), &reg).unwrap();
        assert!(matches!(
            c.dataset(NodeId::ROOT, DATA_ENTRY).unwrap(),
            Dataset::Array(a) if a.shape() == [3]
        ));
    }

    #[test]
    fn test_mapping_layout() {
        let mut m = BTreeMap::new();
        m.insert("a".to_string(), Value::Bool(true));
        m.insert("none".to_string(), Value::Absent);
        m.insert("v".to_string(), Value::from(vec![0.5f64, 1.5]));
        let mut inner = BTreeMap::new();
        inner.insert("x".to_string(), Value::Int(1));
        m.insert("nested".to_string(), Value::Mapping(inner));

        let c = save(&Value::Mapping(m), &TypeRegistry::new()).unwrap();
        assert_eq!(
            kinds(&c, NodeId::ROOT),
            vec![
                ("a".to_string(), EntryKind::Attribute),
                ("nested".to_string(), EntryKind::Child),
                ("none".to_string(), EntryKind::Attribute),
                ("v".to_string(), EntryKind::Dataset),
            ]
        );
        assert_eq!(c.attribute(NodeId::ROOT, "none").unwrap(), &Attr::Absent);
    }

    #[test]
    fn test_object_writes_tag_and_fields() {
        let reg = TypeRegistry::new().with::<Gauge>().unwrap();
        let gauge = Gauge {
            depth: 1.5,
            label: "tip".into(),
        };
        let c = save(&Value::object(gauge), &reg).unwrap();
        assert_eq!(
            c.attribute(NodeId::ROOT, TYPE_TAG_ATTR).unwrap(),
            &Attr::Bytes("Gauge".into())
        );
        assert_eq!(c.attribute(NodeId::ROOT, "depth").unwrap(), &Attr::Float(1.5));
        assert_eq!(
            c.attribute(NodeId::ROOT, "label").unwrap(),
            &Attr::Bytes("tip".into())
        );
    }

    #[test]
    fn test_unregistered_object_rejected() {
        let err = save(&Value::object(Gauge::default()), &TypeRegistry::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EncodeError>(),
            Some(EncodeError::UnregisteredType { .. })
        ));
    }

    #[test]
    fn test_reserved_and_invalid_names() {
        let reg = TypeRegistry::new();
        let mut m = BTreeMap::new();
        m.insert("__secret".to_string(), Value::Int(1));
        let err = save(&Value::Mapping(m), &reg).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::ReservedName);

        let mut m = BTreeMap::new();
        m.insert("a/b".to_string(), Value::Int(1));
        let err = save(&Value::Mapping(m), &reg).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::EncodingError);
    }

    /// Тест проверяет, что сохранение поверх занятого имени отвергается
    /// одинаково для атрибута, датасета и дочернего узла.
    #[test]
    fn test_existing_entries_are_not_overwritten() {
        let reg = TypeRegistry::new();
        let options = EngineOptions::default();
        let mut c = MemContainer::new();
        let root = c.root();
        c.set_attribute(root, "attr", Attr::Int(1)).unwrap();
        c.create_dataset(root, "set", Dataset::Array(NdArray::from_vec(vec![1i64])))
            .unwrap();
        c.create_child(root, "child").unwrap();

        for name in ["attr", "set", "child"] {
            let mut m = BTreeMap::new();
            m.insert(name.to_string(), Value::Int(2));
            let err = Saver::new(&mut c, &reg, &options)
                .save_into(root, &Value::Mapping(m))
                .unwrap_err();
            assert_eq!(err.status_code(), StatusCode::AlreadyExists, "{name}");
            assert!(matches!(
                err.downcast_ref::<EncodeError>(),
                Some(EncodeError::NameCollision { name: n, .. }) if n == name
            ));
        }
        assert_eq!(c.attribute(root, "attr").unwrap(), &Attr::Int(1));
    }

    /// Тест проверяет маркер у отображения с единственной записью `data`.
    #[test]
    fn test_single_data_mapping_gets_marker() {
        let mut m = BTreeMap::new();
        m.insert(DATA_ENTRY.to_string(), Value::Int(1));
        let c = save(&Value::Mapping(m), &TypeRegistry::new()).unwrap();
        assert_eq!(
            c.attribute(NodeId::ROOT, MAPPING_MARKER_ATTR).unwrap(),
            &Attr::Bool(true)
        );
    }

    #[test]
    fn test_depth_limit() {
        let mut value = Value::Int(0);
        for _ in 0..20 {
            let mut m = BTreeMap::new();
            m.insert("x".to_string(), value);
            value = Value::Mapping(m);
        }
        let mut c = MemContainer::new();
        let options = EngineOptions {
            max_depth: 10,
            ..EngineOptions::default()
        };
        let reg = TypeRegistry::new();
        let err = Saver::new(&mut c, &reg, &options)
            .save_into(NodeId::ROOT, &value)
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::DepthLimit);
    }

    #[test]
    fn test_large_array_is_dataset_not_attribute() {
        let array = NdArray::from_vec(vec![0u8; 4096]);
        let mut m = BTreeMap::new();
        m.insert("raw".to_string(), Value::Array(array));
        let c = save(&Value::Mapping(m), &TypeRegistry::new()).unwrap();
        assert!(c.dataset(NodeId::ROOT, "raw").is_ok());
    }

    #[test]
    fn test_name_collision_in_open_container() {
        let mut c = MemContainer::new();
        c.create_child(NodeId::ROOT, "a").unwrap();
        let mut m = BTreeMap::new();
        m.insert("a".to_string(), Value::Int(1));
        let reg = TypeRegistry::new();
        let options = EngineOptions::default();
        let err = Saver::new(&mut c, &reg, &options)
            .save_into(NodeId::ROOT, &Value::Mapping(m))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EncodeError>(),
            Some(EncodeError::NameCollision { .. })
        ));
    }
}
