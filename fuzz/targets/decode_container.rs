#![no_main]

use arbitrary::Arbitrary;
use hgraph::{
    container::hgf::{decode_container, encode_container},
    Engine, EngineOptions, FileOptions, TypeRegistry, UnknownTypePolicy,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    data: Vec<u8>,
    verify_checksum: bool,
}

fuzz_target!(|input: FuzzInput| {
    // Декодер не должен паниковать ни на каких данных.
    let Ok(container) = decode_container(&input.data, input.verify_checksum) else {
        return;
    };

    // Всё, что декодировалось, кодируется обратно.
    let bytes = encode_container(&container, &FileOptions::default())
        .unwrap_or_else(|err| panic!("re-encode failed: {err}"));
    if let Err(err) = decode_container(&bytes, true) {
        panic!("re-decode failed: {err}");
    }

    // Загрузка произвольного дерева либо успешна, либо даёт ошибку.
    let registry = TypeRegistry::new();
    let engine = Engine::new(&registry).with_options(EngineOptions {
        unknown_types: UnknownTypePolicy::AsMapping,
        ..Default::default()
    });
    let _ = engine.load(&container);
});
