//! Реестр пользовательских типов.
//!
//! Каждый сохраняемый тип объявляет [`Schema`] (поля и хуки) и регистрируется
//! под уникальным тегом. Тег записывается в узел объекта и при загрузке
//! однозначно выбирает фабрику и схему.

pub mod schema;
pub mod type_registry;

pub use schema::{Field, Getter, LoadHook, PostLoadHook, SaveHook, Schema, Setter};
pub use type_registry::{register_type, RegisteredType, TypeRegistry};

/// Атрибут с тегом типа.
pub const TYPE_TAG_ATTR: &str = "__type__";

/// Маркер отображения, единственная запись которого называется `data`.
pub const MAPPING_MARKER_ATTR: &str = "__mapping__";

/// Имя записи для листового значения в корне или в элементе списка ссылок.
pub const DATA_ENTRY: &str = "data";

/// Префикс служебных имён. Такие записи пропускаются при загрузке.
pub const RESERVED_PREFIX: &str = "__";

pub fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// Имя дочернего узла для `index`-го элемента списка ссылок поля `field`.
///
/// Начинается с `__`, поэтому не пересекается с именами полей.
pub fn element_node_name(
    field: &str,
    index: usize,
) -> String {
    format!("{RESERVED_PREFIX}{field}_{index}")
}
