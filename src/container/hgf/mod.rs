//! Бинарный формат HGF: сериализация контейнера целиком.
//!
//! ## Раскладка
//!
//! ```text
//! [magic "HGF"][version u8][slot count varint]
//! [slot]*          NODE_LIVE + записи узла | NODE_REMOVED
//! [crc32 u32 BE]   по всем предыдущим байтам
//! ```
//!
//! Слоты идут в порядке индексов узлов, поэтому ссылки (индекс слота)
//! переживают запись и чтение без перенумерации. Массивы хранятся блоками
//! big-endian элементов; блоки от порога и больше сжимаются zstd.
//!
//! ## Модули
//!
//! - [`encode`]: контейнер в байты
//! - [`decode`]: байты в контейнер с проверкой целостности
//! - [`compression`]: сжатие блоков массивов
//! - [`tags`]: константы тегов
//! - [`varint`]: LEB128 для длин и индексов

pub mod compression;
pub mod decode;
pub mod encode;
pub mod tags;
pub mod varint;

pub use compression::*;
pub use decode::*;
pub use encode::*;
pub use tags::*;
