//! Движки сохранения и загрузки графа значений.
//!
//! [`Saver`] обходит [`Value`] в глубину и пишет его в [`Container`];
//! [`Loader`] делает обратное. Последовательности, которые не приводятся к
//! массиву, кодируются списком ссылок (модуль `reflist`).
//!
//! ## Раскладка в контейнере
//!
//! - скаляр и Absent: атрибут узла;
//! - массив: датасет;
//! - отображение: дочерний узел, по записи на ключ;
//! - объект: дочерний узел с атрибутом `__type__` и записью на поле
//!   (или тем, что записал save hook);
//! - неприводимая последовательность: датасет ссылок плюс дочерние узлы
//!   `__{field}_{i}` с элементами.
//!
//! Листовое значение в корне хранится под именем `data`.

pub mod load;
mod reflist;
pub mod save;

use std::path::{Path, PathBuf};

use hgraph_error::{BackendError, HgraphResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

pub use load::Loader;
pub use save::Saver;

use crate::{
    container::{Container, ContainerFile, Dataset, FileOptions, MemContainer, Mode},
    model::{NdArray, Value},
    registry::TypeRegistry,
};

/// Максимальная глубина вложенности по умолчанию.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Что делать с тегом типа, которого нет в реестре.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTypePolicy {
    /// Ошибка `DecodeError::UnknownType`.
    #[default]
    Reject,
    /// Загрузить узел как отображение; тег кладётся под ключ `__type__`.
    AsMapping,
}

/// Параметры обхода.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub max_depth: usize,
    /// Приводить однородные последовательности к массивам.
    pub coerce_sequences: bool,
    pub unknown_types: UnknownTypePolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            coerce_sequences: true,
            unknown_types: UnknownTypePolicy::Reject,
        }
    }
}

/// Куда сохранять: путь (файл открывается и закрывается внутри вызова) или
/// уже открытый контейнер (им владеет вызывающий).
pub enum SaveTarget<'c> {
    Path(PathBuf),
    Container(&'c mut dyn Container),
}

/// Откуда загружать, по аналогии с [`SaveTarget`].
pub enum LoadSource<'c> {
    Path(PathBuf),
    Container(&'c dyn Container),
}

/// Движок с явным реестром и параметрами.
///
/// Функции [`save_object`] / [`load_object`] делают то же самое поверх
/// глобального реестра и параметров по умолчанию.
#[derive(Debug, Clone)]
pub struct Engine<'r> {
    registry: &'r TypeRegistry,
    options: EngineOptions,
    file_options: FileOptions,
}

impl<'r> Engine<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            options: EngineOptions::default(),
            file_options: FileOptions::default(),
        }
    }

    pub fn with_options(
        mut self,
        options: EngineOptions,
    ) -> Self {
        self.options = options;
        self
    }

    pub fn with_file_options(
        mut self,
        file_options: FileOptions,
    ) -> Self {
        self.file_options = file_options;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Сохраняет `value` в корень контейнера.
    ///
    /// С путём файл создаётся заново и закрывается в любом случае, в том
    /// числе после ошибки: на диске остаётся частично записанное дерево.
    pub fn save<'c>(
        &self,
        value: &Value,
        target: impl Into<SaveTarget<'c>>,
    ) -> HgraphResult<()> {
        let span = debug_span!("save_object", kind = value.kind());
        let _guard = span.enter();

        match target.into() {
            SaveTarget::Path(path) => {
                let mut file =
                    ContainerFile::open_with(&path, Mode::Write, self.file_options.clone())?;
                let result = self.save_into(value, &mut file);
                let closed = file.close();
                result.and(closed)
            }
            SaveTarget::Container(container) => self.save_into(value, container),
        }
    }

    /// Сохраняет `value` в корень открытого контейнера.
    pub fn save_into(
        &self,
        value: &Value,
        container: &mut dyn Container,
    ) -> HgraphResult<()> {
        let root = container.root();
        let mut saver = Saver::new(container, self.registry, &self.options);
        saver.save_into(root, value)?;
        debug!(nodes = saver.container().node_count(), "Saved value");
        Ok(())
    }

    pub fn load<'c>(
        &self,
        source: impl Into<LoadSource<'c>>,
    ) -> HgraphResult<Value> {
        let span = debug_span!("load_object");
        let _guard = span.enter();

        match source.into() {
            LoadSource::Path(path) => {
                let file = ContainerFile::open_with(&path, Mode::Read, self.file_options.clone())?;
                let result = self.load_from(&file);
                let closed = file.close();
                result.and_then(|value| closed.map(|_| value))
            }
            LoadSource::Container(container) => self.load_from(container),
        }
    }

    /// Загружает значение из корня открытого контейнера.
    pub fn load_from(
        &self,
        container: &dyn Container,
    ) -> HgraphResult<Value> {
        let mut loader = Loader::new(container, self.registry, &self.options);
        let value = loader.load_node(container.root())?;
        debug!(kind = value.kind(), "Loaded value");
        Ok(value)
    }

    /// Загружает граф из файла, предварительно проверив, что путь указывает
    /// на существующий файл.
    pub fn load_file(
        &self,
        path: impl AsRef<Path>,
    ) -> HgraphResult<Value> {
        let path = path.as_ref();
        ensure_file(path)?;
        self.load(path)
    }

    /// Заменяет (или создаёт) датасет `name` в корне существующего
    /// контейнера.
    pub fn append_dataset(
        &self,
        path: impl AsRef<Path>,
        name: &str,
        array: NdArray,
    ) -> HgraphResult<()> {
        let path = path.as_ref();
        ensure_file(path)?;

        let mut file = ContainerFile::open_with(path, Mode::Append, self.file_options.clone())?;
        let root = file.root();
        let result = (|| {
            if file.entry(root, name)?.is_some() {
                file.remove(root, name)?;
            }
            file.create_dataset(root, name, Dataset::Array(array))
        })();
        let closed = file.close();
        debug!(path = %path.display(), name, "Appended dataset");
        result.and(closed)
    }
}

fn ensure_file(path: &Path) -> HgraphResult<()> {
    if path.is_file() {
        return Ok(());
    }
    Err(BackendError::Io {
        kind: std::io::ErrorKind::NotFound,
        path: Some(path.display().to_string()),
        reason: format!("Path to {} is invalid", path.display()),
    }
    .into())
}

/// Сохраняет значение, используя глобальный реестр типов.
///
/// Глобальный реестр заблокирован на чтение на всё время вызова: хуки не
/// должны регистрировать типы.
pub fn save_object<'c>(
    value: &Value,
    target: impl Into<SaveTarget<'c>>,
) -> HgraphResult<()> {
    let registry = TypeRegistry::global().read();
    Engine::new(&registry).save(value, target)
}

/// Загружает значение, используя глобальный реестр типов.
pub fn load_object<'c>(source: impl Into<LoadSource<'c>>) -> HgraphResult<Value> {
    let registry = TypeRegistry::global().read();
    Engine::new(&registry).load(source)
}

/// [`Engine::load_file`] с глобальным реестром.
pub fn load_file(path: impl AsRef<Path>) -> HgraphResult<Value> {
    let registry = TypeRegistry::global().read();
    Engine::new(&registry).load_file(path)
}

/// [`Engine::append_dataset`] с параметрами по умолчанию.
pub fn append_dataset(
    path: impl AsRef<Path>,
    name: &str,
    array: NdArray,
) -> HgraphResult<()> {
    let registry = TypeRegistry::global().read();
    Engine::new(&registry).append_dataset(path, name, array)
}

macro_rules! path_target {
    ($($ty:ty => $conv:expr),* $(,)?) => {
        $(
            impl From<$ty> for SaveTarget<'_> {
                fn from(path: $ty) -> Self {
                    SaveTarget::Path($conv(path))
                }
            }

            impl From<$ty> for LoadSource<'_> {
                fn from(path: $ty) -> Self {
                    LoadSource::Path($conv(path))
                }
            }
        )*
    };
}

path_target! {
    &Path => Path::to_path_buf,
    &PathBuf => |p: &PathBuf| p.clone(),
    PathBuf => |p: PathBuf| p,
    &str => PathBuf::from,
    &String => PathBuf::from,
    String => PathBuf::from,
}

impl<'c> From<&'c mut dyn Container> for SaveTarget<'c> {
    fn from(container: &'c mut dyn Container) -> Self {
        SaveTarget::Container(container)
    }
}

impl<'c> From<&'c mut MemContainer> for SaveTarget<'c> {
    fn from(container: &'c mut MemContainer) -> Self {
        SaveTarget::Container(container)
    }
}

impl<'c> From<&'c mut ContainerFile> for SaveTarget<'c> {
    fn from(container: &'c mut ContainerFile) -> Self {
        SaveTarget::Container(container)
    }
}

impl<'c> From<&'c dyn Container> for LoadSource<'c> {
    fn from(container: &'c dyn Container) -> Self {
        LoadSource::Container(container)
    }
}

impl<'c> From<&'c MemContainer> for LoadSource<'c> {
    fn from(container: &'c MemContainer) -> Self {
        LoadSource::Container(container)
    }
}

impl<'c> From<&'c ContainerFile> for LoadSource<'c> {
    fn from(container: &'c ContainerFile) -> Self {
        LoadSource::Container(container)
    }
}

/// Путь узла для сообщений об ошибках: `/a/b/[3]`.
pub(crate) fn format_path(segments: &[String]) -> String {
    if segments.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for s in segments {
        out.push('/');
        out.push_str(s);
    }
    out
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
