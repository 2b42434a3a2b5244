use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use hgraph_error::{BackendError, HgraphResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    hgf::{decode_container, encode_container, DEFAULT_COMPRESSION_LEVEL, DEFAULT_COMPRESSION_THRESHOLD},
    Attr, Container, Dataset, EntryRef, MemContainer, NodeId, Reference,
};

/// Режим открытия файла-контейнера.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Только чтение; любые изменения отклоняются.
    Read,
    /// Новый пустой контейнер; существующий файл перезаписывается.
    Write,
    /// Существующий контейнер, открытый на изменение.
    Append,
}

/// Параметры формата, применяемые при записи и чтении файла.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOptions {
    /// Блоки массивов от этого размера (в байтах) сжимаются.
    pub compression_threshold: usize,
    pub compression_level: i32,
    /// Проверять CRC32 при открытии.
    pub verify_checksum: bool,
}

/// Контейнер, привязанный к файлу формата HGF.
///
/// Всё дерево держится в памяти; файл читается целиком при открытии и
/// записывается целиком в [`ContainerFile::flush`] / [`ContainerFile::close`].
/// Хэндл, брошенный без `close()`, теряет несохранённые изменения.
#[derive(Debug)]
pub struct ContainerFile {
    path: PathBuf,
    mode: Mode,
    inner: MemContainer,
    options: FileOptions,
    dirty: bool,
    closed: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            verify_checksum: true,
        }
    }
}

impl ContainerFile {
    pub fn open(
        path: impl AsRef<Path>,
        mode: Mode,
    ) -> HgraphResult<Self> {
        Self::open_with(path, mode, FileOptions::default())
    }

    pub fn open_with(
        path: impl AsRef<Path>,
        mode: Mode,
        options: FileOptions,
    ) -> HgraphResult<Self> {
        let path = path.as_ref().to_path_buf();

        let (inner, dirty) = match mode {
            Mode::Read | Mode::Append => {
                let bytes = fs::read(&path).map_err(|e| BackendError::io(&e, path.display().to_string()))?;
                let mut inner = decode_container(&bytes, options.verify_checksum)?;
                inner.set_read_only(mode == Mode::Read);
                debug!(
                    path = %path.display(),
                    ?mode,
                    nodes = inner.node_count(),
                    bytes = bytes.len(),
                    "Opened container"
                );
                (inner, false)
            }
            Mode::Write => {
                // Создаём файл сразу, чтобы ошибки доступа всплыли до записи
                // дерева.
                File::create(&path).map_err(|e| BackendError::io(&e, path.display().to_string()))?;
                debug!(path = %path.display(), ?mode, "Created container");
                (MemContainer::new(), true)
            }
        };

        Ok(Self {
            path,
            mode,
            inner,
            options,
            dirty,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Есть ли изменения, не записанные на диск.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Записывает дерево на диск. Для хэндла только на чтение ничего не
    /// делает.
    pub fn flush(&mut self) -> HgraphResult<()> {
        if self.mode == Mode::Read || !self.dirty {
            return Ok(());
        }
        let bytes = encode_container(&self.inner, &self.options)?;
        let file = File::create(&self.path).map_err(|e| BackendError::io(&e, self.path.display().to_string()))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&bytes)
            .and_then(|_| writer.flush())
            .map_err(|e| BackendError::io(&e, self.path.display().to_string()))?;
        self.dirty = false;
        debug!(
            path = %self.path.display(),
            nodes = self.inner.node_count(),
            bytes = bytes.len(),
            "Flushed container"
        );
        Ok(())
    }

    /// Сбрасывает изменения на диск и освобождает хэндл.
    pub fn close(mut self) -> HgraphResult<()> {
        let result = self.flush();
        self.closed = true;
        debug!(path = %self.path.display(), mode = ?self.mode, "Closed container");
        result
    }

    /// Дерево в памяти за этим хэндлом.
    pub fn as_mem(&self) -> &MemContainer {
        &self.inner
    }

    fn touch<T>(
        &mut self,
        result: HgraphResult<T>,
    ) -> HgraphResult<T> {
        if result.is_ok() {
            self.dirty = true;
        }
        result
    }
}

impl Drop for ContainerFile {
    fn drop(&mut self) {
        if !self.closed && self.mode != Mode::Read && self.dirty {
            warn!(
                path = %self.path.display(),
                "Container dropped without close(), unsaved changes are lost"
            );
        }
    }
}

impl Container for ContainerFile {
    fn is_writable(&self) -> bool {
        self.inner.is_writable()
    }

    fn create_child(
        &mut self,
        parent: NodeId,
        name: &str,
    ) -> HgraphResult<NodeId> {
        let result = self.inner.create_child(parent, name);
        self.touch(result)
    }

    fn open_child(
        &self,
        parent: NodeId,
        name: &str,
    ) -> HgraphResult<NodeId> {
        self.inner.open_child(parent, name)
    }

    fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: Attr,
    ) -> HgraphResult<()> {
        let result = self.inner.set_attribute(node, name, value);
        self.touch(result)
    }

    fn attribute(
        &self,
        node: NodeId,
        name: &str,
    ) -> HgraphResult<&Attr> {
        self.inner.attribute(node, name)
    }

    fn create_dataset(
        &mut self,
        node: NodeId,
        name: &str,
        data: Dataset,
    ) -> HgraphResult<()> {
        let result = self.inner.create_dataset(node, name, data);
        self.touch(result)
    }

    fn dataset(
        &self,
        node: NodeId,
        name: &str,
    ) -> HgraphResult<&Dataset> {
        self.inner.dataset(node, name)
    }

    fn make_reference(
        &self,
        node: NodeId,
    ) -> HgraphResult<Reference> {
        self.inner.make_reference(node)
    }

    fn dereference(
        &self,
        reference: Reference,
    ) -> HgraphResult<NodeId> {
        self.inner.dereference(reference)
    }

    fn entry(
        &self,
        node: NodeId,
        name: &str,
    ) -> HgraphResult<Option<EntryRef<'_>>> {
        self.inner.entry(node, name)
    }

    fn entries(
        &self,
        node: NodeId,
    ) -> HgraphResult<Vec<(&str, EntryRef<'_>)>> {
        self.inner.entries(node)
    }

    fn remove(
        &mut self,
        node: NodeId,
        name: &str,
    ) -> HgraphResult<()> {
        let result = self.inner.remove(node, name);
        self.touch(result)
    }

    fn node_count(&self) -> usize {
        self.inner.node_count()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
