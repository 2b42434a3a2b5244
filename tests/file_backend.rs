//! Сохранение и загрузка через файлы HGF.

use std::{collections::BTreeMap, fs};

use hgraph::{
    BackendError, Container, ContainerFile, Engine, FileOptions, Mode, NdArray, StatusCode,
    TypeRegistry, Value,
};
use tempfile::tempdir;

mod records;
use records::*;

/// Тест проверяет сохранение по пути и загрузку по пути.
#[test]
fn test_save_and_load_by_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scene.hgf");
    let registry = registry();
    let engine = Engine::new(&registry);

    engine.save(&Value::object(scene()), &path).unwrap();
    assert!(path.is_file());

    let loaded = engine.load_file(&path).unwrap();
    assert_eq!(loaded.into_record::<Scene>().unwrap(), scene());
}

/// Тест проверяет работу с уже открытым контейнером: вызывающий владеет
/// файлом и закрывает его сам.
#[test]
fn test_save_into_open_handle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("open.hgf");
    let registry = registry();
    let engine = Engine::new(&registry);

    let mut file = ContainerFile::open(&path, Mode::Write).unwrap();
    engine.save(&Value::object(unit(4, "dock")), &mut file).unwrap();
    assert!(file.is_dirty());
    file.close().unwrap();

    let file = ContainerFile::open(&path, Mode::Read).unwrap();
    let loaded = engine.load(&file).unwrap();
    assert_eq!(loaded.into_record::<Unit>().unwrap(), unit(4, "dock"));
    file.close().unwrap();
}

/// Тест проверяет, что load_file сообщает о несуществующем пути.
#[test]
fn test_load_file_missing_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.hgf");
    let registry = TypeRegistry::new();

    let err = Engine::new(&registry).load_file(&path).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NotFound);
    assert!(err.to_string().contains("absent.hgf"), "{err}");

    // Каталог тоже не файл.
    let err = Engine::new(&registry).load_file(dir.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BackendError>(),
        Some(BackendError::Io { .. })
    ));
}

/// Тест проверяет, что неудачный save по пути оставляет на диске частично
/// записанное дерево и закрытый файл.
#[test]
fn test_failed_save_leaves_partial_tree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("partial.hgf");
    let registry = TypeRegistry::new();
    let engine = Engine::new(&registry);

    let value = Value::Mapping(BTreeMap::from([
        ("a".to_string(), Value::Int(1)),
        ("b".to_string(), Value::object(unit(1, "unregistered"))),
    ]));
    let err = engine.save(&value, &path).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::EncodingError);

    let loaded = engine.load_file(&path).unwrap();
    assert_eq!(loaded.as_mapping().unwrap()["a"], Value::Int(1));
}

/// Тест проверяет append_dataset: замена существующего датасета и
/// добавление нового без потери остальных записей.
#[test]
fn test_append_dataset() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("append.hgf");
    let registry = TypeRegistry::new();
    let engine = Engine::new(&registry);

    let value = Value::Mapping(BTreeMap::from([
        ("keep".to_string(), Value::text("me")),
        ("signal".to_string(), Value::from(vec![1.0f64, 2.0])),
    ]));
    engine.save(&value, &path).unwrap();

    engine
        .append_dataset(&path, "signal", NdArray::from_vec(vec![9i64, 8, 7]))
        .unwrap();
    engine
        .append_dataset(&path, "extra", NdArray::from_vec(vec![true]))
        .unwrap();

    let loaded = engine.load_file(&path).unwrap();
    let map = loaded.as_mapping().unwrap();
    assert_eq!(map["keep"], Value::text("me"));
    assert_eq!(map["signal"], Value::from(vec![9i64, 8, 7]));
    assert_eq!(map["extra"], Value::from(vec![true]));
}

#[test]
fn test_append_dataset_requires_existing_file() {
    let dir = tempdir().unwrap();
    let registry = TypeRegistry::new();
    let err = Engine::new(&registry)
        .append_dataset(dir.path().join("nope.hgf"), "x", NdArray::from_vec(vec![1i64]))
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NotFound);
}

/// Тест проверяет, что большой массив сжимается и читается обратно без
/// изменений, а файл получается меньше исходных данных.
#[test]
fn test_large_array_is_compressed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("big.hgf");
    let registry = TypeRegistry::new();
    let engine = Engine::new(&registry);

    let samples: Vec<f64> = (0..10_000).map(|i| (i % 16) as f64).collect();
    let value = Value::from(samples.clone());
    engine.save(&value, &path).unwrap();

    let size = fs::metadata(&path).unwrap().len() as usize;
    assert!(size < samples.len() * 8 / 4, "file size {size}");

    let loaded = engine.load_file(&path).unwrap();
    assert_eq!(loaded, value);
}

/// Тест проверяет, что порча байта в файле обнаруживается при открытии,
/// а с отключённой проверкой CRC файл открывается.
#[test]
fn test_corrupted_file_detected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.hgf");
    let registry = TypeRegistry::new();
    let engine = Engine::new(&registry);

    let value = Value::Mapping(BTreeMap::from([("n".to_string(), Value::Int(0x0102_0304))]));
    engine.save(&value, &path).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    let last_int_byte = bytes.len() - 5;
    bytes[last_int_byte] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let err = engine.load_file(&path).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::CorruptedData);

    let lenient = FileOptions {
        verify_checksum: false,
        ..Default::default()
    };
    let loaded = Engine::new(&registry)
        .with_file_options(lenient)
        .load_file(&path)
        .unwrap();
    assert_ne!(loaded.as_mapping().unwrap()["n"], Value::Int(0x0102_0304));
}

/// Тест проверяет, что файл, открытый на чтение, не принимает записи.
#[test]
fn test_read_mode_rejects_writes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ro.hgf");
    let registry = TypeRegistry::new();
    let engine = Engine::new(&registry);
    engine.save(&Value::Int(1), &path).unwrap();

    let mut file = ContainerFile::open(&path, Mode::Read).unwrap();
    assert!(!file.is_writable());
    let root = file.root();
    let err = file.create_child(root, "x").unwrap_err();
    assert_eq!(err.status_code(), StatusCode::ReadOnly);
}
