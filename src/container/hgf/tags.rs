//! Константы формата HGF.
//!
//! Каждая запись узла помечается однобайтовым тегом. Используется в модулях
//! `decode` и `encode`.

/// «Магическое» начало файла: ASCII-буквы «HGF».
pub const FILE_MAGIC: &[u8; 3] = b"HGF";

/// Поддерживаемые версии формата.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    V1 = 1,
}

/// Текущая версия формата, как число.
pub const FORMAT_VERSION: u8 = FormatVersion::V1 as u8;

/// Слот удалённого узла
pub const NODE_REMOVED: u8 = 0x00;
/// Слот живого узла
pub const NODE_LIVE: u8 = 0x01;

/// Атрибут: Absent
pub const TAG_ATTR_ABSENT: u8 = 0x01;
/// Атрибут: bool (u8)
pub const TAG_ATTR_BOOL: u8 = 0x02;
/// Атрибут: i64 BE
pub const TAG_ATTR_INT: u8 = 0x03;
/// Атрибут: f64 BE
pub const TAG_ATTR_FLOAT: u8 = 0x04;
/// Атрибут: байтовая строка
pub const TAG_ATTR_BYTES: u8 = 0x05;
/// Атрибут: небольшой массив
pub const TAG_ATTR_ARRAY: u8 = 0x06;
/// Датасет-массив
pub const TAG_DATASET_ARRAY: u8 = 0x10;
/// Датасет-список ссылок
pub const TAG_DATASET_REFS: u8 = 0x11;
/// Дочерний узел (varint индекс слота)
pub const TAG_CHILD: u8 = 0x20;

/// Несжатый блок элементов массива
pub const BLOCK_RAW: u8 = 0x30;
/// Сжатый блок данных (zstd)
pub const BLOCK_COMPRESSED: u8 = 0x31;

impl TryFrom<u8> for FormatVersion {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            1 => Ok(FormatVersion::V1),
            other => Err(other),
        }
    }
}

/// Все версии, которые умеет читать декодер.
pub fn supported_versions() -> Vec<u8> {
    vec![FormatVersion::V1 as u8]
}
