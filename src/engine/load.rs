use std::collections::BTreeMap;

use hgraph_error::{DecodeError, HgraphResult, ResultExt};
use tracing::{trace, warn};

use super::{format_path, reflist, EngineOptions, UnknownTypePolicy};
use crate::{
    container::{Attr, Container, Dataset, EntryRef, NodeId},
    model::Value,
    registry::{is_reserved, TypeRegistry, DATA_ENTRY, MAPPING_MARKER_ATTR, TYPE_TAG_ATTR},
};

/// Состояние одного прохода загрузки.
///
/// Передаётся в load hook. Контейнер при загрузке только читается.
pub struct Loader<'a> {
    container: &'a dyn Container,
    registry: &'a TypeRegistry,
    options: &'a EngineOptions,
    path: Vec<String>,
    /// Узлы, которые загружаются прямо сейчас (для обнаружения циклов).
    active: Vec<NodeId>,
}

impl<'a> Loader<'a> {
    pub(crate) fn new(
        container: &'a dyn Container,
        registry: &'a TypeRegistry,
        options: &'a EngineOptions,
    ) -> Self {
        Self {
            container,
            registry,
            options,
            path: Vec::new(),
            active: Vec::new(),
        }
    }

    pub fn container(&self) -> &'a dyn Container {
        self.container
    }

    pub fn path(&self) -> String {
        format_path(&self.path)
    }

    /// Загружает содержимое узла.
    ///
    /// - узел с тегом: объект зарегистрированного типа;
    /// - узел без тега с единственной записью `data`: само значение этой
    ///   записи;
    /// - иначе отображение имя → значение.
    pub fn load_node(
        &mut self,
        node: NodeId,
    ) -> HgraphResult<Value> {
        if self.active.contains(&node) {
            return Err(DecodeError::Inconsistent {
                path: self.path(),
                reason: format!("reference cycle through node {node}"),
            }
            .into());
        }
        self.active.push(node);
        let result = self.load_node_inner(node);
        self.active.pop();
        result
    }

    /// Загружает запись `name` узла `node`; отсутствие записи является ошибкой.
    pub fn load_field(
        &mut self,
        node: NodeId,
        name: &str,
    ) -> HgraphResult<Value> {
        match self.try_load_field(node, name)? {
            Some(value) => Ok(value),
            None => Err(DecodeError::MissingEntry {
                name: name.to_string(),
                path: self.path(),
            }
            .into()),
        }
    }

    /// Как [`Loader::load_field`], но отсутствие записи даёт `None`.
    pub fn try_load_field(
        &mut self,
        node: NodeId,
        name: &str,
    ) -> HgraphResult<Option<Value>> {
        let container = self.container;
        match container.entry(node, name)? {
            Some(entry) => self.load_entry(name, entry).map(Some),
            None => Ok(None),
        }
    }

    fn load_node_inner(
        &mut self,
        node: NodeId,
    ) -> HgraphResult<Value> {
        let container = self.container;
        match container.entry(node, TYPE_TAG_ATTR)? {
            Some(EntryRef::Attribute(Attr::Bytes(tag))) => {
                let tag = std::str::from_utf8(tag).map_err(|_| DecodeError::InvalidTypeTag {
                    path: self.path(),
                })?;
                self.load_object(node, tag)
            }
            Some(_) => Err(DecodeError::InvalidTypeTag { path: self.path() }.into()),
            None => {
                if let Some(entry) = self.anonymous_entry(node)? {
                    return self.load_entry(DATA_ENTRY, entry);
                }
                self.load_entries(node).map(Value::Mapping)
            }
        }
    }

    /// Запись `data`, если узел хранит одно анонимное значение.
    fn anonymous_entry(
        &self,
        node: NodeId,
    ) -> HgraphResult<Option<EntryRef<'a>>> {
        let container = self.container;
        let entries = container.entries(node)?;
        if entries.iter().any(|(name, _)| *name == MAPPING_MARKER_ATTR) {
            return Ok(None);
        }
        let mut visible = entries.into_iter().filter(|(name, _)| !is_reserved(name));
        match (visible.next(), visible.next()) {
            (Some((DATA_ENTRY, entry)), None) if !matches!(entry, EntryRef::Child(_)) => {
                Ok(Some(entry))
            }
            _ => Ok(None),
        }
    }

    fn load_entries(
        &mut self,
        node: NodeId,
    ) -> HgraphResult<BTreeMap<String, Value>> {
        let container = self.container;
        let mut out = BTreeMap::new();
        for (name, entry) in container.entries(node)? {
            if is_reserved(name) {
                continue;
            }
            let value = self.load_entry(name, entry)?;
            out.insert(name.to_string(), value);
        }
        Ok(out)
    }

    fn load_entry(
        &mut self,
        name: &str,
        entry: EntryRef<'a>,
    ) -> HgraphResult<Value> {
        self.enter(name)?;
        let result = match entry {
            EntryRef::Attribute(attr) => Ok(attr_value(attr)),
            EntryRef::Dataset(Dataset::Array(array)) => Ok(Value::Array(array.clone())),
            EntryRef::Dataset(Dataset::References(refs)) => reflist::read_list(self, refs),
            EntryRef::Child(child) => self.load_node(child),
        };
        self.leave();
        result
    }

    fn load_object(
        &mut self,
        node: NodeId,
        tag: &str,
    ) -> HgraphResult<Value> {
        let registry = self.registry;
        let Some(entry) = registry.resolve(tag) else {
            return match self.options.unknown_types {
                UnknownTypePolicy::Reject => Err(DecodeError::UnknownType {
                    tag: tag.to_string(),
                    path: self.path(),
                }
                .into()),
                UnknownTypePolicy::AsMapping => {
                    warn!(tag, path = %self.path(), "Unknown type loaded as mapping");
                    let mut mapping = self.load_entries(node)?;
                    mapping.insert(TYPE_TAG_ATTR.to_string(), Value::text(tag));
                    Ok(Value::Mapping(mapping))
                }
            };
        };

        if let Some(result) = entry.0.load_hook(self, node) {
            trace!(tag, path = %self.path(), "Load hook invoked");
            return result
                .map(Value::Object)
                .with_context(|| format!("Load hook of '{tag}' failed at {}", self.path()));
        }

        let container = self.container;
        let mut object = entry.instantiate();
        for (name, field) in container.entries(node)? {
            if is_reserved(name) {
                continue;
            }
            let value = self.load_entry(name, field)?;
            match entry.0.set_field(&mut object, name, value) {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    return Err(DecodeError::Field {
                        tag: tag.to_string(),
                        field: name.to_string(),
                        path: self.path(),
                        reason: e.to_string(),
                    }
                    .into())
                }
                None => warn!(tag, field = name, path = %self.path(), "Skipping unknown field"),
            }
        }

        if let Some(result) = entry.0.post_load(&mut object) {
            trace!(tag, path = %self.path(), "Post-load hook invoked");
            result.with_context(|| format!("Post-load hook of '{tag}' failed at {}", self.path()))?;
        }
        Ok(Value::Object(object))
    }

    pub(crate) fn enter(
        &mut self,
        segment: impl Into<String>,
    ) -> HgraphResult<()> {
        if self.path.len() >= self.options.max_depth {
            return Err(DecodeError::DepthLimit {
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
}

/// Значение атрибута. Пустой одномерный массив в атрибуте: старая запись
/// Absent.
fn attr_value(attr: &Attr) -> Value {
    match attr {
        Attr::Absent => Value::Absent,
        Attr::Bool(b) => Value::Bool(*b),
        Attr::Int(i) => Value::Int(*i),
        Attr::Float(f) => Value::Float(*f),
        Attr::Bytes(b) => Value::Bytes(b.clone()),
        Attr::Array(a) if a.rank() == 1 && a.is_empty() => Value::Absent,
        Attr::Array(a) => Value::Array(a.clone()),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
