use std::collections::BTreeMap;

use byteorder::{BigEndian, ByteOrder};
use crc32fast::Hasher;
use hgraph_error::{BackendError, HgraphResult, StackError};

use super::{compression::decompress_block, tags::*, varint::read_varint};
use crate::{
    container::{
        memory::{Entry, Node},
        Attr, Dataset, MemContainer, NodeId, Reference,
    },
    model::{array::shape_len, ArrayData, ElementType, NdArray},
};

/// Минимальный размер файла: magic + version + slot count + live root
/// (маркер и ноль записей) + crc.
pub const MIN_FILE_SIZE: usize = 3 + 1 + 1 + 2 + 4;

/// Ранг массива, больше которого файл считается повреждённым.
const MAX_RANK: usize = 32;

/// Курсор по телу файла; ошибки разбора несут смещение.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(
        data: &'a [u8],
        pos: usize,
    ) -> Self {
        Self { data, pos }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn corrupted(
        &self,
        reason: impl Into<String>,
    ) -> StackError {
        BackendError::Corrupted {
            reason: reason.into(),
            offset: Some(self.pos as u64),
        }
        .into()
    }

    fn invalid_tag(
        &self,
        tag: u8,
        context: &'static str,
    ) -> StackError {
        BackendError::InvalidTag {
            tag,
            context,
            offset: Some(self.pos.saturating_sub(1) as u64),
        }
        .into()
    }

    fn take(
        &mut self,
        n: usize,
    ) -> HgraphResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(self.corrupted(format!(
                "Unexpected end of data: need {n} bytes, {} left",
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> HgraphResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn i64(&mut self) -> HgraphResult<i64> {
        Ok(BigEndian::read_i64(self.take(8)?))
    }

    fn f64(&mut self) -> HgraphResult<f64> {
        Ok(BigEndian::read_f64(self.take(8)?))
    }

    fn varint(&mut self) -> HgraphResult<u32> {
        let data = self.data;
        let mut slice = &data[self.pos.min(data.len())..];
        let before = slice.len();
        let value = read_varint(&mut slice).map_err(|_| self.corrupted("Invalid varint"))?;
        self.pos += before - slice.len();
        Ok(value)
    }

    /// Счётчик элементов, каждый из которых занимает хотя бы один байт.
    fn count(
        &mut self,
        what: &str,
    ) -> HgraphResult<usize> {
        let n = self.varint()? as usize;
        if n > self.remaining() {
            return Err(self.corrupted(format!(
                "{what} count {n} exceeds remaining {} bytes",
                self.remaining()
            )));
        }
        Ok(n)
    }

    fn bytes(&mut self) -> HgraphResult<&'a [u8]> {
        let len = self.varint()? as usize;
        self.take(len)
    }
}

/// Разбирает байты формата HGF в контейнер в памяти.
///
/// Проверяет magic, версию, CRC (если `verify_checksum`) и структурную
/// целостность дерева: каждый дочерний узел существует и имеет ровно одного
/// родителя. Ссылки в датасетах не проверяются, висячая ссылка даёт ошибку
/// загрузки, а не открытия файла.
pub fn decode_container(
    data: &[u8],
    verify_checksum: bool,
) -> HgraphResult<MemContainer> {
    if data.len() < MIN_FILE_SIZE {
        return Err(BackendError::Corrupted {
            reason: format!("Container too small: {} bytes", data.len()),
            offset: None,
        }
        .into());
    }

    let (body, crc_bytes) = data.split_at(data.len() - 4);

    let mut magic = [0u8; 3];
    magic.copy_from_slice(&body[..3]);
    if &magic != FILE_MAGIC {
        return Err(BackendError::InvalidMagic {
            expected: *FILE_MAGIC,
            got: magic,
        }
        .into());
    }
    FormatVersion::try_from(body[3]).map_err(|found| BackendError::UnsupportedVersion {
        found,
        supported: supported_versions(),
    })?;

    if verify_checksum {
        let recorded = BigEndian::read_u32(crc_bytes);
        let mut hasher = Hasher::new();
        hasher.update(body);
        let computed = hasher.finalize();
        if computed != recorded {
            return Err(BackendError::CrcMismatch { computed, recorded }.into());
        }
    }

    let mut r = Reader::new(body, 4);
    let slots = r.count("Node table")?;
    if slots == 0 {
        return Err(r.corrupted("Container has no root node"));
    }

    let mut nodes = Vec::with_capacity(slots);
    for _ in 0..slots {
        match r.u8()? {
            NODE_LIVE => nodes.push(Some(read_node(&mut r)?)),
            NODE_REMOVED => nodes.push(None),
            other => return Err(r.invalid_tag(other, "node slot")),
        }
    }
    if r.remaining() != 0 {
        return Err(r.corrupted(format!("{} trailing bytes after node table", r.remaining())));
    }

    validate_tree(&nodes)?;
    Ok(MemContainer::from_nodes(nodes))
}

fn read_node(r: &mut Reader<'_>) -> HgraphResult<Node> {
    let count = r.count("Entry")?;
    let mut entries = BTreeMap::new();
    for _ in 0..count {
        let name = std::str::from_utf8(r.bytes()?)
            .map_err(|_| r.corrupted("Entry name is not valid UTF-8"))?
            .to_string();
        if name.is_empty() {
            return Err(r.corrupted("Empty entry name"));
        }
        let entry = read_entry(r)?;
        if entries.insert(name.clone(), entry).is_some() {
            return Err(r.corrupted(format!("Duplicate entry name '{name}'")));
        }
    }
    Ok(Node { entries })
}

fn read_entry(r: &mut Reader<'_>) -> HgraphResult<Entry> {
    let tag = r.u8()?;
    let entry = match tag {
        TAG_ATTR_ABSENT => Entry::Attr(Attr::Absent),
        TAG_ATTR_BOOL => match r.u8()? {
            0 => Entry::Attr(Attr::Bool(false)),
            1 => Entry::Attr(Attr::Bool(true)),
            other => return Err(r.corrupted(format!("Invalid bool byte {other}"))),
        },
        TAG_ATTR_INT => Entry::Attr(Attr::Int(r.i64()?)),
        TAG_ATTR_FLOAT => Entry::Attr(Attr::Float(r.f64()?)),
        TAG_ATTR_BYTES => Entry::Attr(Attr::Bytes(r.bytes()?.to_vec().into())),
        TAG_ATTR_ARRAY => Entry::Attr(Attr::Array(read_array(r)?)),
        TAG_DATASET_ARRAY => Entry::Dataset(Dataset::Array(read_array(r)?)),
        TAG_DATASET_REFS => {
            let n = r.count("Reference")?;
            let mut refs = Vec::with_capacity(n);
            for _ in 0..n {
                refs.push(Reference(r.varint()?));
            }
            Entry::Dataset(Dataset::References(refs))
        }
        TAG_CHILD => Entry::Child(NodeId(r.varint()?)),
        other => return Err(r.invalid_tag(other, "node entry")),
    };
    Ok(entry)
}

fn read_array(r: &mut Reader<'_>) -> HgraphResult<NdArray> {
    let element_byte = r.u8()?;
    let element =
        ElementType::from_byte(element_byte).ok_or_else(|| r.invalid_tag(element_byte, "array element type"))?;

    let rank = r.varint()? as usize;
    if rank > MAX_RANK {
        return Err(r.corrupted(format!("Array rank {rank} exceeds {MAX_RANK}")));
    }
    let mut shape = Vec::with_capacity(rank);
    for _ in 0..rank {
        shape.push(r.varint()? as usize);
    }
    let expected_bytes = shape_len(&shape)
        .and_then(|n| n.checked_mul(element.size()))
        .ok_or_else(|| r.corrupted(format!("Array shape {shape:?} overflows")))?;

    let block = r.u8()?;
    let payload = r.bytes()?;
    let raw = match block {
        BLOCK_RAW => payload.to_vec(),
        BLOCK_COMPRESSED => decompress_block(payload, expected_bytes)?,
        other => return Err(r.invalid_tag(other, "array block")),
    };
    if raw.len() != expected_bytes {
        return Err(r.corrupted(format!(
            "Array block holds {} bytes, shape {shape:?} of {element} needs {expected_bytes}",
            raw.len()
        )));
    }

    let data = read_elements(element, &raw).map_err(|e| r.corrupted(e))?;
    NdArray::new(shape, data).map_err(|e| r.corrupted(e.to_string()))
}

fn read_elements(
    element: ElementType,
    raw: &[u8],
) -> Result<ArrayData, String> {
    let n = raw.len() / element.size();
    Ok(match element {
        ElementType::Bool => ArrayData::Bool(
            raw.iter()
                .map(|&b| match b {
                    0 => Ok(false),
                    1 => Ok(true),
                    other => Err(format!("Invalid bool element {other}")),
                })
                .collect::<Result<_, _>>()?,
        ),
        ElementType::U8 => ArrayData::U8(raw.to_vec()),
        ElementType::I32 => {
            let mut v = vec![0i32; n];
            BigEndian::read_i32_into(raw, &mut v);
            ArrayData::I32(v)
        }
        ElementType::I64 => {
            let mut v = vec![0i64; n];
            BigEndian::read_i64_into(raw, &mut v);
            ArrayData::I64(v)
        }
        ElementType::F32 => {
            let mut v = vec![0f32; n];
            BigEndian::read_f32_into(raw, &mut v);
            ArrayData::F32(v)
        }
        ElementType::F64 => {
            let mut v = vec![0f64; n];
            BigEndian::read_f64_into(raw, &mut v);
            ArrayData::F64(v)
        }
    })
}

/// Каждый дочерний узел существует, не является корнем и имеет ровно одного
/// родителя.
fn validate_tree(nodes: &[Option<Node>]) -> HgraphResult<()> {
    if !matches!(nodes.first(), Some(Some(_))) {
        return Err(BackendError::Corrupted {
            reason: "Root node is missing".to_string(),
            offset: None,
        }
        .into());
    }

    let mut has_parent = vec![false; nodes.len()];
    for (parent, node) in nodes.iter().enumerate() {
        let Some(node) = node else { continue };
        for (name, entry) in &node.entries {
            let Entry::Child(child) = entry else { continue };
            let idx = child.0 as usize;
            let live = nodes.get(idx).is_some_and(Option::is_some);
            if idx == 0 || !live {
                return Err(BackendError::Corrupted {
                    reason: format!("Child '{name}' of node #{parent} points to missing node #{idx}"),
                    offset: None,
                }
                .into());
            }
            if std::mem::replace(&mut has_parent[idx], true) {
                return Err(BackendError::Corrupted {
                    reason: format!("Node #{idx} has more than one parent"),
                    offset: None,
                }
                .into());
            }
        }
    }
    Ok(())
}
