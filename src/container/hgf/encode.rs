use byteorder::{BigEndian, WriteBytesExt};
use crc32fast::Hasher;
use hgraph_error::HgraphResult;

use super::{
    compression::{compress_block, should_compress},
    tags::*,
    varint::{write_len, write_varint},
};
use crate::{
    container::{
        memory::{Entry, Node},
        Attr, Dataset, FileOptions, MemContainer,
    },
    model::{ArrayData, NdArray},
};

/// Сериализует контейнер в байты формата HGF.
///
/// Формат:
///   [magic "HGF"][version u8][slot count varint]
///   ... слоты узлов: [NODE_LIVE][entry count varint][entries] | [NODE_REMOVED] ...
///   [crc32: u32 BE]
///
/// Записи узла идут в порядке имён, поэтому одинаковые деревья дают
/// побайтно одинаковый результат.
pub fn encode_container(
    container: &MemContainer,
    options: &FileOptions,
) -> HgraphResult<Vec<u8>> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(FILE_MAGIC);
    out.write_u8(FORMAT_VERSION)?;
    write_len(&mut out, container.nodes.len(), "Node table")?;

    for slot in &container.nodes {
        match slot {
            Some(node) => {
                out.write_u8(NODE_LIVE)?;
                write_node(&mut out, node, options)?;
            }
            None => out.write_u8(NODE_REMOVED)?,
        }
    }

    let mut hasher = Hasher::new();
    hasher.update(&out);
    let crc = hasher.finalize();
    out.write_u32::<BigEndian>(crc)?;
    Ok(out)
}

fn write_node(
    out: &mut Vec<u8>,
    node: &Node,
    options: &FileOptions,
) -> HgraphResult<()> {
    write_len(out, node.entries.len(), "Node entry count")?;
    for (name, entry) in &node.entries {
        write_len(out, name.len(), "Entry name")?;
        out.extend_from_slice(name.as_bytes());
        write_entry(out, entry, options)?;
    }
    Ok(())
}

fn write_entry(
    out: &mut Vec<u8>,
    entry: &Entry,
    options: &FileOptions,
) -> HgraphResult<()> {
    match entry {
        Entry::Attr(attr) => match attr {
            Attr::Absent => out.write_u8(TAG_ATTR_ABSENT)?,
            Attr::Bool(b) => {
                out.write_u8(TAG_ATTR_BOOL)?;
                out.write_u8(*b as u8)?;
            }
            Attr::Int(i) => {
                out.write_u8(TAG_ATTR_INT)?;
                out.write_i64::<BigEndian>(*i)?;
            }
            Attr::Float(f) => {
                out.write_u8(TAG_ATTR_FLOAT)?;
                out.write_f64::<BigEndian>(*f)?;
            }
            Attr::Bytes(b) => {
                out.write_u8(TAG_ATTR_BYTES)?;
                write_len(out, b.len(), "Byte string")?;
                out.extend_from_slice(b);
            }
            Attr::Array(a) => {
                out.write_u8(TAG_ATTR_ARRAY)?;
                write_array(out, a, options)?;
            }
        },
        Entry::Dataset(Dataset::Array(a)) => {
            out.write_u8(TAG_DATASET_ARRAY)?;
            write_array(out, a, options)?;
        }
        Entry::Dataset(Dataset::References(refs)) => {
            out.write_u8(TAG_DATASET_REFS)?;
            write_len(out, refs.len(), "Reference list")?;
            for r in refs {
                write_varint(out, r.target_index())?;
            }
        }
        Entry::Child(id) => {
            out.write_u8(TAG_CHILD)?;
            write_varint(out, id.index())?;
        }
    }
    Ok(())
}

/// Массив: [element type u8][rank varint][dims varint...][block].
fn write_array(
    out: &mut Vec<u8>,
    array: &NdArray,
    options: &FileOptions,
) -> HgraphResult<()> {
    out.write_u8(array.element_type() as u8)?;
    write_len(out, array.rank(), "Array rank")?;
    for &dim in array.shape() {
        write_len(out, dim, "Array dimension")?;
    }

    let mut raw = Vec::with_capacity(array.byte_len());
    write_elements(&mut raw, array.data())?;

    if should_compress(raw.len(), options.compression_threshold) {
        let compressed = compress_block(&raw, options.compression_level)?;
        // Несжимаемые данные пишем как есть.
        if compressed.len() < raw.len() {
            out.write_u8(BLOCK_COMPRESSED)?;
            write_len(out, compressed.len(), "Compressed block")?;
            out.extend_from_slice(&compressed);
            return Ok(());
        }
    }
    out.write_u8(BLOCK_RAW)?;
    write_len(out, raw.len(), "Array block")?;
    out.extend_from_slice(&raw);
    Ok(())
}

fn write_elements(
    out: &mut Vec<u8>,
    data: &ArrayData,
) -> HgraphResult<()> {
    match data {
        ArrayData::Bool(v) => out.extend(v.iter().map(|&b| b as u8)),
        ArrayData::U8(v) => out.extend_from_slice(v),
        ArrayData::I32(v) => {
            for &x in v {
                out.write_i32::<BigEndian>(x)?;
            }
        }
        ArrayData::I64(v) => {
            for &x in v {
                out.write_i64::<BigEndian>(x)?;
            }
        }
        ArrayData::F32(v) => {
            for &x in v {
                out.write_f32::<BigEndian>(x)?;
            }
        }
        ArrayData::F64(v) => {
            for &x in v {
                out.write_f64::<BigEndian>(x)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Container, NodeId};

    #[test]
    fn test_empty_container_layout() {
        let bytes = encode_container(&MemContainer::new(), &FileOptions::default()).unwrap();
        // magic + version + slot count + [live, 0 entries] + crc
        assert_eq!(&bytes[..3], FILE_MAGIC);
        assert_eq!(bytes[3], FORMAT_VERSION);
        assert_eq!(&bytes[4..7], &[1, NODE_LIVE, 0]);
        assert_eq!(bytes.len(), 7 + 4);
    }

    #[test]
    fn test_scalar_attribute_bytes() {
        let mut c = MemContainer::new();
        c.set_attribute(NodeId::ROOT, "n", Attr::Int(1)).unwrap();
        let bytes = encode_container(&c, &FileOptions::default()).unwrap();
        let body = &bytes[4..bytes.len() - 4];
        assert_eq!(
            body,
            &[1, NODE_LIVE, 1, 1, b'n', TAG_ATTR_INT, 0, 0, 0, 0, 0, 0, 0, 1]
        );
    }

    /// Тест проверяет, что большие массивы сжимаются, а маленькие: нет.
    #[test]
    fn test_large_array_is_compressed() {
        let mut small = MemContainer::new();
        small
            .create_dataset(
                NodeId::ROOT,
                "d",
                Dataset::Array(NdArray::from_vec(vec![1u8, 2, 3])),
            )
            .unwrap();
        let bytes = encode_container(&small, &FileOptions::default()).unwrap();
        assert!(bytes.contains(&BLOCK_RAW));

        let mut big = MemContainer::new();
        big.create_dataset(
            NodeId::ROOT,
            "d",
            Dataset::Array(NdArray::from_vec(vec![0.0f64; 4096])),
        )
        .unwrap();
        let bytes = encode_container(&big, &FileOptions::default()).unwrap();
        assert!(bytes.len() < 4096 * 8);
    }

    #[test]
    fn test_deterministic_output() {
        let build = || {
            let mut c = MemContainer::new();
            let child = c.create_child(NodeId::ROOT, "b").unwrap();
            c.set_attribute(child, "x", Attr::Float(0.5)).unwrap();
            c.set_attribute(NodeId::ROOT, "a", Attr::Bytes("t".into()))
                .unwrap();
            c
        };
        let opts = FileOptions::default();
        assert_eq!(
            encode_container(&build(), &opts).unwrap(),
            encode_container(&build(), &opts).unwrap()
        );
    }
}
