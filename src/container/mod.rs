//! Иерархический контейнер: дерево именованных узлов с атрибутами,
//! датасетами и ссылками на узлы.
//!
//! Движки save/load работают только через трейт [`Container`]. В крейте
//! есть две реализации:
//!
//! - [`MemContainer`]: дерево в памяти (арена узлов);
//! - [`ContainerFile`]: то же дерево, привязанное к файлу формата HGF.

pub mod file;
pub mod hgf;
pub mod memory;

use std::fmt;

use bytes::Bytes;
use hgraph_error::HgraphResult;

pub use file::{ContainerFile, FileOptions, Mode};
pub use memory::MemContainer;

use crate::model::NdArray;

/// Максимальное число элементов массива, который можно записать атрибутом.
/// Более крупные массивы хранятся датасетами.
pub const MAX_ATTRIBUTE_ARRAY_LEN: usize = 1024;

/// Стабильный идентификатор узла внутри одного контейнера.
///
/// Идентификаторы выдаются в порядке создания и никогда не переиспользуются.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

/// Ссылка на узел. Хранится только внутри датасетов-списков ссылок.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reference(pub(crate) u32);

/// Значение атрибута: скаляр, маркер отсутствия или небольшой массив.
#[derive(Debug, Clone, PartialEq)]
pub enum Attr {
    Absent,
    Bool(bool),
    Int(i64),
    Float(f64),
    Bytes(Bytes),
    Array(NdArray),
}

/// Содержимое датасета.
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Array(NdArray),
    References(Vec<Reference>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Attribute,
    Dataset,
    Child,
}

/// Запись узла, доступная только для чтения.
#[derive(Debug, Clone, Copy)]
pub enum EntryRef<'a> {
    Attribute(&'a Attr),
    Dataset(&'a Dataset),
    Child(NodeId),
}

/// Возможности иерархического хранилища, на которых построены движки.
///
/// Имена атрибутов, датасетов и дочерних узлов одного узла не пересекаются:
/// имя, занятое записью одного вида, нельзя использовать для другого.
pub trait Container {
    /// Корневой узел.
    fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    fn is_writable(&self) -> bool;

    /// Создаёт дочерний узел `name` под `parent`.
    fn create_child(
        &mut self,
        parent: NodeId,
        name: &str,
    ) -> HgraphResult<NodeId>;

    fn open_child(
        &self,
        parent: NodeId,
        name: &str,
    ) -> HgraphResult<NodeId>;

    /// Записывает атрибут; существующий атрибут с тем же именем заменяется.
    fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: Attr,
    ) -> HgraphResult<()>;

    fn attribute(
        &self,
        node: NodeId,
        name: &str,
    ) -> HgraphResult<&Attr>;

    fn create_dataset(
        &mut self,
        node: NodeId,
        name: &str,
        data: Dataset,
    ) -> HgraphResult<()>;

    fn dataset(
        &self,
        node: NodeId,
        name: &str,
    ) -> HgraphResult<&Dataset>;

    fn make_reference(
        &self,
        node: NodeId,
    ) -> HgraphResult<Reference>;

    /// Разрешает ссылку. Ссылка на удалённый или несуществующий узел
    /// даёт ошибку `NoSuchNode`.
    fn dereference(
        &self,
        reference: Reference,
    ) -> HgraphResult<NodeId>;

    /// Запись узла по имени, `None` если её нет.
    fn entry(
        &self,
        node: NodeId,
        name: &str,
    ) -> HgraphResult<Option<EntryRef<'_>>>;

    /// Все записи узла в порядке имён.
    fn entries(
        &self,
        node: NodeId,
    ) -> HgraphResult<Vec<(&str, EntryRef<'_>)>>;

    /// Удаляет запись узла; дочерний узел удаляется вместе с поддеревом.
    fn remove(
        &mut self,
        node: NodeId,
        name: &str,
    ) -> HgraphResult<()>;

    /// Количество живых узлов (включая корень).
    fn node_count(&self) -> usize;
}

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Reference {
    /// Индекс узла, на который указывает ссылка.
    pub fn target_index(self) -> u32 {
        self.0
    }
}

impl Attr {
    pub fn kind(&self) -> &'static str {
        match self {
            Attr::Absent => "absent",
            Attr::Bool(_) => "bool",
            Attr::Int(_) => "int",
            Attr::Float(_) => "float",
            Attr::Bytes(_) => "bytes",
            Attr::Array(_) => "array",
        }
    }
}

impl EntryRef<'_> {
    pub fn kind(&self) -> EntryKind {
        match self {
            EntryRef::Attribute(_) => EntryKind::Attribute,
            EntryRef::Dataset(_) => EntryKind::Dataset,
            EntryRef::Child(_) => EntryKind::Child,
        }
    }
}

impl EntryKind {
    pub fn name(self) -> &'static str {
        match self {
            EntryKind::Attribute => "attribute",
            EntryKind::Dataset => "dataset",
            EntryKind::Child => "node",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}
