//! Variable-length integer encoding (LEB128-style).
//!
//! Имена, длины и индексы узлов в HGF почти всегда маленькие:
//! - 0-127: 1 байт
//! - 128-16383: 2 байта
//! - до u32::MAX: 5 байт максимум

use std::io::{Read, Write};

use hgraph_error::{BackendError, HgraphResult, ResultExt};

/// Максимальное кол-во байт для u32 в varint encoding (5 байт)
pub const MAX_VARINT_LEN: usize = 5;

/// Записывает u32 в varint формате, возвращает число записанных байт.
///
/// # Examples
/// ```
/// use hgraph::container::hgf::varint::write_varint;
///
/// let mut buf = Vec::new();
/// write_varint(&mut buf, 128).unwrap();
/// assert_eq!(buf, vec![0x80, 0x01]);
/// ```
pub fn write_varint<W: Write>(
    w: &mut W,
    mut value: u32,
) -> HgraphResult<usize> {
    let mut bytes_written = 0;

    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;

        if value != 0 {
            byte |= 0x80; // Continuation bit
        }

        w.write_all(&[byte])
            .context("Failed to write varint byte")?;
        bytes_written += 1;

        if value == 0 {
            break;
        }
    }

    Ok(bytes_written)
}

/// Записывает длину (`usize`) как varint; длины больше `u32::MAX` не
/// представимы в формате.
pub fn write_len<W: Write>(
    w: &mut W,
    len: usize,
    what: &str,
) -> HgraphResult<usize> {
    let value = u32::try_from(len).map_err(|_| BackendError::SizeLimit {
        what: what.to_string(),
        size: len as u64,
        limit: u32::MAX as u64,
    })?;
    write_varint(w, value)
}

/// Читает u32 из varint формата.
///
/// Ошибка, если поток кончился раньше времени или varint длиннее 5 байт.
pub fn read_varint<R: Read>(r: &mut R) -> HgraphResult<u32> {
    let mut result: u32 = 0;
    let mut shift = 0;

    for _ in 0..MAX_VARINT_LEN {
        let mut buf = [0u8; 1];
        r.read_exact(&mut buf)
            .context("Failed to read varint byte")?;

        let byte = buf[0];
        // Пятый байт может нести только 4 старших бита u32.
        if shift == 28 && byte & 0x70 != 0 {
            break;
        }
        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 == 0 {
            return Ok(result);
        }

        shift += 7;
    }

    Err(BackendError::Corrupted {
        reason: format!("Varint too long (>{MAX_VARINT_LEN} bytes), possible corruption"),
        offset: None,
    }
    .into())
}

/// Вычисляет размер varint для числа (без записи).
pub fn varint_size(mut value: u32) -> usize {
    if value == 0 {
        return 1;
    }

    let mut size = 0;
    while value != 0 {
        value >>= 7;
        size += 1;
    }
    size
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_varint_size() {
        assert_eq!(varint_size(0), 1);
        assert_eq!(varint_size(127), 1);
        assert_eq!(varint_size(128), 2);
        assert_eq!(varint_size(16383), 2);
        assert_eq!(varint_size(16384), 3);
        assert_eq!(varint_size(u32::MAX), 5);
    }

    #[test]
    fn test_varint_roundtrip() {
        for value in [0, 1, 127, 128, 255, 16383, 16384, 1_000_000, u32::MAX] {
            let mut buf = Vec::new();
            let written = write_varint(&mut buf, value).unwrap();

            let mut cursor = Cursor::new(&buf);
            assert_eq!(read_varint(&mut cursor).unwrap(), value);
            assert_eq!(written, buf.len(), "Size mismatch for {value}");
            assert_eq!(written, varint_size(value));
        }
    }

    #[test]
    fn test_known_encodings() {
        // 300 => 0xAC, 0x02
        let mut buf = Vec::new();
        write_varint(&mut buf, 300).unwrap();
        assert_eq!(buf, vec![0xAC, 0x02]);

        // u32::MAX => 0xFF,0xFF,0xFF,0xFF,0x0F
        let mut buf = Vec::new();
        write_varint(&mut buf, u32::MAX).unwrap();
        assert_eq!(buf, vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    /// Тест проверяет, что слишком длинный varint считается повреждением.
    #[test]
    fn test_varint_invalid_long() {
        let bad = vec![0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        let err = read_varint(&mut Cursor::new(bad)).unwrap_err();
        assert!(err.to_string().contains("too long"), "got: {err}");

        // Пятый байт с битами за пределами u32.
        let overflow = vec![0xFF, 0xFF, 0xFF, 0xFF, 0x1F];
        assert!(read_varint(&mut Cursor::new(overflow)).is_err());
    }

    #[test]
    fn test_varint_unexpected_eof() {
        for case in [vec![0x80], vec![0x80, 0x80], vec![0x80, 0x80, 0x80, 0x80]] {
            let err = read_varint(&mut Cursor::new(case)).unwrap_err();
            assert!(err.to_string().contains("Failed"), "got: {err}");
        }
    }

    #[test]
    fn test_write_len_limit() {
        let mut buf = Vec::new();
        assert_eq!(write_len(&mut buf, 300, "name").unwrap(), 2);
        #[cfg(target_pointer_width = "64")]
        {
            let err = write_len(&mut buf, u32::MAX as usize + 1, "dataset").unwrap_err();
            assert_eq!(err.status_code(), hgraph_error::StatusCode::SizeLimit);
        }
    }
}
