//! Списки ссылок: кодирование последовательностей, которые не приводятся к
//! массиву.
//!
//! Элемент `i` поля `field` пишется в собственный дочерний узел
//! `__{field}_{i}`, а само поле становится датасетом ссылок на эти узлы в
//! исходном порядке. Длина датасета всегда равна длине последовательности.

use hgraph_error::{DecodeError, HgraphResult};
use tracing::trace;

use super::{Loader, Saver};
use crate::{
    container::{Dataset, NodeId, Reference},
    model::Value,
    registry::element_node_name,
};

pub(crate) fn write_list(
    saver: &mut Saver<'_>,
    node: NodeId,
    name: &str,
    items: &[Value],
) -> HgraphResult<()> {
    let mut refs = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let child = saver.create_child(node, &element_node_name(name, i))?;
        saver.enter(format!("[{i}]"))?;
        let result = saver.save_into(child, item);
        saver.leave();
        result?;
        refs.push(saver.container().make_reference(child)?);
    }
    trace!(field = name, elements = refs.len(), "Wrote reference list");
    saver.create_dataset(node, name, Dataset::References(refs))
}

pub(crate) fn read_list(
    loader: &mut Loader<'_>,
    refs: &[Reference],
) -> HgraphResult<Value> {
    let container = loader.container();
    let mut items = Vec::with_capacity(refs.len());
    for (i, reference) in refs.iter().enumerate() {
        let target = container
            .dereference(*reference)
            .map_err(|_| DecodeError::DanglingReference {
                target: reference.target_index(),
                path: loader.path(),
            })?;
        loader.enter(format!("[{i}]"))?;
        let result = loader.load_node(target);
        loader.leave();
        items.push(result?);
    }
    trace!(elements = items.len(), path = %loader.path(), "Read reference list");
    Ok(Value::Sequence(items))
}
