/// Классификация значений: лист или составное, приведение Sequence → Array.
pub mod classify;
/// Загрузка настроек (умолчания, файл, окружение).
pub mod config;
/// Иерархический контейнер: абстракция, арена в памяти и файлы HGF.
pub mod container;
/// Движки сохранения и загрузки.
pub mod engine;
/// Логирование (форматы, фильтры, приёмники).
pub mod logging;
/// Модель данных: Value, NdArray, Record/Object.
pub mod model;
/// Реестр типов: схемы, теги, хуки.
pub mod registry;

// -----------------------------------------------------------------------------
//  Часто используемые публичные типы
// -----------------------------------------------------------------------------

/// Классификатор.
pub use classify::{classify, classify_with, Class, Classified};
/// Конфигурация.
pub use config::{Settings, StorageConfig};
/// Реализации контейнера.
pub use container::{
    Attr, Container, ContainerFile, Dataset, EntryKind, EntryRef, FileOptions, MemContainer, Mode,
    NodeId, Reference,
};
/// Движки и функции верхнего уровня поверх глобального реестра.
pub use engine::{
    append_dataset, load_file, load_object, save_object, Engine, EngineOptions, LoadSource,
    Loader, SaveTarget, Saver, UnknownTypePolicy,
};
/// Ошибки и тип результата.
pub use hgraph_error::{
    BackendError, DecodeError, EncodeError, ErrorExt, HgraphResult, RegistryError, ResultExt,
    StackError, StatusCode,
};
/// Логирование.
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
/// Модель данных.
pub use model::{ArrayData, Element, ElementType, FromValue, NdArray, Object, Record, Value};
/// Реестр типов.
pub use registry::{register_type, Schema, TypeRegistry};
