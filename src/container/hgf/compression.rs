//! Сжатие блоков полезной нагрузки массивов с помощью ZSTD.

use std::io::Read;

use hgraph_error::{BackendError, HgraphResult};
use zstd::stream::{encode_all, read::Decoder};

/// Порог по умолчанию: блоки короче не сжимаются.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 64;

/// Уровень по умолчанию: баланс между скоростью и размером.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Предел степени сжатия zstd: RLE-блок из 4 байт описывает не больше
/// 128 KiB. Блок, заявляющий больше, заведомо испорчен.
pub const MAX_COMPRESSION_RATIO: usize = 32 * 1024;

/// Нужно ли пытаться сжать блок заданного размера.
pub fn should_compress(
    size: usize,
    threshold: usize,
) -> bool {
    size >= threshold
}

pub fn compress_block(
    data: &[u8],
    level: i32,
) -> HgraphResult<Vec<u8>> {
    encode_all(data, level).map_err(|e| {
        BackendError::Compression {
            reason: e.to_string(),
        }
        .into()
    })
}

/// Распаковывает блок; результат длиннее `max_len` считается ошибкой.
///
/// Буфер растёт по мере чтения, поэтому заявленный в файле размер не
/// приводит к большой аллокации заранее. `max_len` больше, чем допускает
/// [`MAX_COMPRESSION_RATIO`] для данного блока, отвергается сразу.
pub fn decompress_block(
    data: &[u8],
    max_len: usize,
) -> HgraphResult<Vec<u8>> {
    let ceiling = data.len().saturating_mul(MAX_COMPRESSION_RATIO);
    if max_len > ceiling {
        return Err(BackendError::SizeLimit {
            what: "Compressed array block".to_string(),
            size: max_len as u64,
            limit: ceiling as u64,
        }
        .into());
    }
    let mut out = Vec::new();
    let limit = (max_len as u64).saturating_add(1);
    Decoder::new(data)
        .and_then(|decoder| decoder.take(limit).read_to_end(&mut out))
        .map_err(|e| BackendError::Compression {
            reason: e.to_string(),
        })?;
    if out.len() > max_len {
        return Err(BackendError::Compression {
            reason: format!("Decompressed block exceeds {max_len} bytes"),
        }
        .into());
    }
    Ok(out)
}
