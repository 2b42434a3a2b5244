use std::collections::BTreeMap;

use hgraph_error::{BackendError, GenericError, HgraphResult, StackError, StatusCode};

use super::{
    Attr, Container, Dataset, EntryKind, EntryRef, NodeId, Reference, MAX_ATTRIBUTE_ARRAY_LEN,
};

/// Запись узла.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Entry {
    Attr(Attr),
    Dataset(Dataset),
    Child(NodeId),
}

/// Узел: одна упорядоченная таблица имён на все три вида записей.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Node {
    pub(crate) entries: BTreeMap<String, Entry>,
}

/// Контейнер в памяти.
///
/// Узлы лежат в арене и адресуются индексом; удалённый узел остаётся
/// "надгробием" (`None`), поэтому ссылки на него обнаруживаемо висят, а
/// индексы остальных узлов не сдвигаются.
#[derive(Debug, Clone, PartialEq)]
pub struct MemContainer {
    pub(crate) nodes: Vec<Option<Node>>,
    read_only: bool,
}

impl Entry {
    pub(crate) fn kind(&self) -> EntryKind {
        match self {
            Entry::Attr(_) => EntryKind::Attribute,
            Entry::Dataset(_) => EntryKind::Dataset,
            Entry::Child(_) => EntryKind::Child,
        }
    }

    fn view(&self) -> EntryRef<'_> {
        match self {
            Entry::Attr(a) => EntryRef::Attribute(a),
            Entry::Dataset(d) => EntryRef::Dataset(d),
            Entry::Child(id) => EntryRef::Child(*id),
        }
    }
}

impl MemContainer {
    /// Пустой контейнер с одним корневым узлом.
    pub fn new() -> Self {
        Self {
            nodes: vec![Some(Node::default())],
            read_only: false,
        }
    }

    /// Контейнер из готовой арены (используется декодером HGF).
    pub(crate) fn from_nodes(nodes: Vec<Option<Node>>) -> Self {
        Self {
            nodes,
            read_only: false,
        }
    }

    pub fn set_read_only(
        &mut self,
        read_only: bool,
    ) {
        self.read_only = read_only;
    }

    /// Общее число слотов арены, включая удалённые узлы.
    pub fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    fn node(
        &self,
        id: NodeId,
    ) -> HgraphResult<&Node> {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| BackendError::NoSuchNode { node: id.0 }.into())
    }

    fn node_mut(
        &mut self,
        id: NodeId,
    ) -> HgraphResult<&mut Node> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| BackendError::NoSuchNode { node: id.0 }.into())
    }

    fn check_writable(
        &self,
        operation: &str,
    ) -> HgraphResult<()> {
        if self.read_only {
            return Err(BackendError::ReadOnly {
                operation: operation.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Проверяет, что имя свободно (или занято записью того же вида, если
    /// `replace_kind` задан).
    fn check_name(
        &self,
        node: NodeId,
        name: &str,
        replace_kind: Option<EntryKind>,
    ) -> HgraphResult<()> {
        if name.is_empty() {
            return Err(StackError::new(GenericError::new(
                StatusCode::InvalidArgs,
                format!("Empty entry name in node {node}"),
            )));
        }
        match self.node(node)?.entries.get(name) {
            Some(existing) if Some(existing.kind()) != replace_kind => {
                Err(BackendError::NameTaken {
                    node: node.0,
                    name: name.to_string(),
                    existing: existing.kind().name(),
                }
                .into())
            }
            _ => Ok(()),
        }
    }

    /// Помечает поддерево удалённым.
    fn drop_subtree(
        &mut self,
        root: NodeId,
    ) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(id.0 as usize).and_then(Option::take) {
                stack.extend(node.entries.values().filter_map(|e| match e {
                    Entry::Child(child) => Some(*child),
                    _ => None,
                }));
            }
        }
    }
}

impl Default for MemContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Container for MemContainer {
    fn is_writable(&self) -> bool {
        !self.read_only
    }

    fn create_child(
        &mut self,
        parent: NodeId,
        name: &str,
    ) -> HgraphResult<NodeId> {
        self.check_writable("create_child")?;
        self.check_name(parent, name, None)?;
        let index = u32::try_from(self.nodes.len()).map_err(|_| BackendError::SizeLimit {
            what: "Node table".to_string(),
            size: self.nodes.len() as u64,
            limit: u32::MAX as u64,
        })?;
        let id = NodeId(index);
        self.nodes.push(Some(Node::default()));
        self.node_mut(parent)?
            .entries
            .insert(name.to_string(), Entry::Child(id));
        Ok(id)
    }

    fn open_child(
        &self,
        parent: NodeId,
        name: &str,
    ) -> HgraphResult<NodeId> {
        match self.node(parent)?.entries.get(name) {
            Some(Entry::Child(id)) => Ok(*id),
            _ => Err(BackendError::NoSuchEntry {
                node: parent.0,
                name: name.to_string(),
            }
            .into()),
        }
    }

    fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: Attr,
    ) -> HgraphResult<()> {
        self.check_writable("set_attribute")?;
        self.check_name(node, name, Some(EntryKind::Attribute))?;
        if let Attr::Array(a) = &value {
            if a.len() > MAX_ATTRIBUTE_ARRAY_LEN {
                return Err(BackendError::SizeLimit {
                    what: format!("Attribute '{name}' array"),
                    size: a.len() as u64,
                    limit: MAX_ATTRIBUTE_ARRAY_LEN as u64,
                }
                .into());
            }
        }
        self.node_mut(node)?
            .entries
            .insert(name.to_string(), Entry::Attr(value));
        Ok(())
    }

    fn attribute(
        &self,
        node: NodeId,
        name: &str,
    ) -> HgraphResult<&Attr> {
        match self.node(node)?.entries.get(name) {
            Some(Entry::Attr(a)) => Ok(a),
            _ => Err(BackendError::NoSuchEntry {
                node: node.0,
                name: name.to_string(),
            }
            .into()),
        }
    }

    fn create_dataset(
        &mut self,
        node: NodeId,
        name: &str,
        data: Dataset,
    ) -> HgraphResult<()> {
        self.check_writable("create_dataset")?;
        self.check_name(node, name, None)?;
        if let Dataset::References(refs) = &data {
            if let Some(bad) = refs.iter().find(|r| self.dereference(**r).is_err()) {
                return Err(BackendError::NoSuchNode { node: bad.0 }.into());
            }
        }
        self.node_mut(node)?
            .entries
            .insert(name.to_string(), Entry::Dataset(data));
        Ok(())
    }

    fn dataset(
        &self,
        node: NodeId,
        name: &str,
    ) -> HgraphResult<&Dataset> {
        match self.node(node)?.entries.get(name) {
            Some(Entry::Dataset(d)) => Ok(d),
            _ => Err(BackendError::NoSuchEntry {
                node: node.0,
                name: name.to_string(),
            }
            .into()),
        }
    }

    fn make_reference(
        &self,
        node: NodeId,
    ) -> HgraphResult<Reference> {
        self.node(node)?;
        Ok(Reference(node.0))
    }

    fn dereference(
        &self,
        reference: Reference,
    ) -> HgraphResult<NodeId> {
        let id = NodeId(reference.0);
        self.node(id)?;
        Ok(id)
    }

    fn entry(
        &self,
        node: NodeId,
        name: &str,
    ) -> HgraphResult<Option<EntryRef<'_>>> {
        Ok(self.node(node)?.entries.get(name).map(Entry::view))
    }

    fn entries(
        &self,
        node: NodeId,
    ) -> HgraphResult<Vec<(&str, EntryRef<'_>)>> {
        Ok(self
            .node(node)?
            .entries
            .iter()
            .map(|(name, e)| (name.as_str(), e.view()))
            .collect())
    }

    fn remove(
        &mut self,
        node: NodeId,
        name: &str,
    ) -> HgraphResult<()> {
        self.check_writable("remove")?;
        let removed = self
            .node_mut(node)?
            .entries
            .remove(name)
            .ok_or_else(|| BackendError::NoSuchEntry {
                node: node.0,
                name: name.to_string(),
            })?;
        if let Entry::Child(child) = removed {
            self.drop_subtree(child);
        }
        Ok(())
    }

    fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NdArray;

    #[test]
    fn test_create_and_open_child() {
        let mut c = MemContainer::new();
        let a = c.create_child(NodeId::ROOT, "a").unwrap();
        let b = c.create_child(a, "b").unwrap();
        assert_eq!(c.open_child(NodeId::ROOT, "a").unwrap(), a);
        assert_eq!(c.open_child(a, "b").unwrap(), b);
        assert_eq!(c.node_count(), 3);
        assert!(c.open_child(NodeId::ROOT, "missing").is_err());
    }

    /// Тест проверяет, что пространства имён атрибутов, датасетов и узлов
    /// не пересекаются.
    #[test]
    fn test_names_are_disjoint_across_kinds() {
        let mut c = MemContainer::new();
        let root = c.root();
        c.set_attribute(root, "x", Attr::Int(1)).unwrap();

        let err = c
            .create_dataset(root, "x", Dataset::Array(NdArray::from_vec(vec![1i64])))
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::AlreadyExists);
        assert!(c.create_child(root, "x").is_err());

        // Атрибут можно перезаписать атрибутом.
        c.set_attribute(root, "x", Attr::Float(2.0)).unwrap();
        assert_eq!(c.attribute(root, "x").unwrap(), &Attr::Float(2.0));
    }

    #[test]
    fn test_dataset_cannot_be_recreated() {
        let mut c = MemContainer::new();
        let d = Dataset::Array(NdArray::from_vec(vec![1.0f64]));
        c.create_dataset(NodeId::ROOT, "d", d.clone()).unwrap();
        assert!(c.create_dataset(NodeId::ROOT, "d", d).is_err());
    }

    #[test]
    fn test_large_attribute_array_rejected() {
        let mut c = MemContainer::new();
        let big = NdArray::from_vec(vec![0u8; MAX_ATTRIBUTE_ARRAY_LEN + 1]);
        let err = c
            .set_attribute(NodeId::ROOT, "big", Attr::Array(big))
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::SizeLimit);
    }

    /// Тест проверяет, что ссылка на удалённый узел не разрешается.
    #[test]
    fn test_reference_dangles_after_remove() {
        let mut c = MemContainer::new();
        let child = c.create_child(NodeId::ROOT, "child").unwrap();
        let grandchild = c.create_child(child, "inner").unwrap();
        let r = c.make_reference(child).unwrap();
        let r2 = c.make_reference(grandchild).unwrap();
        assert_eq!(c.dereference(r).unwrap(), child);

        c.remove(NodeId::ROOT, "child").unwrap();
        assert!(c.dereference(r).is_err());
        assert!(c.dereference(r2).is_err());
        assert_eq!(c.node_count(), 1);
        assert_eq!(c.slot_count(), 3);

        // Новые узлы не переиспользуют индекс удалённого.
        let fresh = c.create_child(NodeId::ROOT, "child").unwrap();
        assert_ne!(fresh, child);
    }

    #[test]
    fn test_reference_dataset_must_point_to_live_nodes() {
        let mut c = MemContainer::new();
        let child = c.create_child(NodeId::ROOT, "__x_0").unwrap();
        let r = c.make_reference(child).unwrap();
        c.remove(NodeId::ROOT, "__x_0").unwrap();
        let err = c
            .create_dataset(NodeId::ROOT, "x", Dataset::References(vec![r]))
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NotFound);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let mut c = MemContainer::new();
        c.set_read_only(true);
        assert!(!c.is_writable());
        let err = c.create_child(NodeId::ROOT, "a").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::ReadOnly);
        assert!(c.set_attribute(NodeId::ROOT, "a", Attr::Absent).is_err());
    }

    #[test]
    fn test_entries_sorted_by_name() {
        let mut c = MemContainer::new();
        let root = c.root();
        c.set_attribute(root, "b", Attr::Bool(true)).unwrap();
        c.create_child(root, "a").unwrap();
        c.create_dataset(root, "c", Dataset::Array(NdArray::from_vec(vec![1i32])))
            .unwrap();
        let names: Vec<_> = c
            .entries(root)
            .unwrap()
            .into_iter()
            .map(|(n, e)| (n.to_string(), e.kind()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("a".to_string(), EntryKind::Child),
                ("b".to_string(), EntryKind::Attribute),
                ("c".to_string(), EntryKind::Dataset),
            ]
        );
    }
}
