//! CLI hgraph
//!
//! Просмотр и правка контейнеров HGF: дерево узлов, выгрузка графа в JSON,
//! замена датасета в корне.

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hgraph::{
    init_logging, Attr, Container, ContainerFile, Dataset, Engine, EntryRef, Mode,
    NdArray, NodeId, Settings, StackError, TypeRegistry, UnknownTypePolicy,
};
use hgraph_error::LogLevel;
use tracing::{debug, error, info, warn};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT"),
    ", built ",
    env!("BUILD_TIME"),
    ")"
);

#[derive(Parser)]
#[command(name = "hgraph")]
#[command(author = "hgraph contributors")]
#[command(version = VERSION)]
#[command(about = "Inspect and edit hgraph containers", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Файл конфигурации (TOML или JSON)
    #[arg(short, long, global = true, env = "HGRAPH_CONFIG")]
    config: Option<PathBuf>,
    /// Подробный вывод (debug)
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Только ошибки
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Печатает дерево узлов с видами записей и формами массивов
    Tree {
        file: PathBuf,
    },
    /// Загружает граф и печатает его как JSON; объекты становятся
    /// отображениями с ключом `__type__`
    Dump {
        file: PathBuf,
        /// JSON в одну строку
        #[arg(long)]
        compact: bool,
    },
    /// Заменяет (или создаёт) датасет в корне контейнера
    Append {
        file: PathBuf,
        name: String,
        /// Массив JSON, например `[[1, 2], [3, 4]]`
        array: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut settings = match Settings::load_from(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Error: failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    if cli.quiet {
        settings.logging.level = "error".into();
    } else if cli.verbose {
        settings.logging.level = "debug".into();
    }
    let logging = match init_logging(settings.logging.clone()) {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("Error: failed to init logging: {err}");
            return ExitCode::FAILURE;
        }
    };

    let code = match run(&cli, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            report(&err);
            ExitCode::from(exit_status(&err))
        }
    };
    logging.shutdown();
    code
}

/// Логирует ошибку команды на уровне, который задаёт её статус.
fn report(err: &anyhow::Error) {
    let message = format!("{err:#}");
    let Some(stack) = err.downcast_ref::<StackError>() else {
        error!(error = %message, "Command failed");
        return;
    };
    let status = stack.status_code();
    let codec = status.is_codec_error();
    match stack.log_level() {
        LogLevel::Trace | LogLevel::Debug => {
            debug!(%status, codec, error = %message, "Command failed")
        }
        LogLevel::Info => info!(%status, codec, error = %message, "Command failed"),
        LogLevel::Warn => warn!(%status, codec, error = %message, "Command failed"),
        LogLevel::Error => error!(
            %status,
            codec,
            critical = stack.is_critical(),
            error = %message,
            "Command failed"
        ),
    }
}

/// Код выхода: 2 для ошибок во входных данных или аргументах, 1 для
/// остальных.
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<StackError>() {
        Some(stack) if stack.status_code().is_client_error() => 2,
        _ => 1,
    }
}

fn run(
    cli: &Cli,
    settings: &Settings,
) -> Result<()> {
    match &cli.command {
        Commands::Tree { file } => {
            let container = ContainerFile::open_with(file, Mode::Read, settings.storage.clone())
                .with_context(|| format!("Cannot open {}", file.display()))?;
            let mut out = String::new();
            render_tree(&container, container.root(), "/", 0, &mut out)?;
            print!("{out}");
            container.close()?;
        }
        Commands::Dump { file, compact } => {
            let registry = TypeRegistry::global().read();
            let mut options = settings.engine.clone();
            options.unknown_types = UnknownTypePolicy::AsMapping;
            let value = Engine::new(&registry)
                .with_options(options)
                .with_file_options(settings.storage.clone())
                .load_file(file)
                .with_context(|| format!("Cannot load {}", file.display()))?;
            let json = if *compact {
                serde_json::to_string(&value)?
            } else {
                serde_json::to_string_pretty(&value)?
            };
            println!("{json}");
        }
        Commands::Append { file, name, array } => {
            let json: serde_json::Value =
                serde_json::from_str(array).context("Array argument is not valid JSON")?;
            let array = json_to_array(&json)?;
            debug!(shape = ?array.shape(), element = array.element_type().name(), "Parsed array");
            append(file, name, array, settings)?;
        }
    }
    Ok(())
}

fn append(
    file: &Path,
    name: &str,
    array: NdArray,
    settings: &Settings,
) -> Result<()> {
    let registry = TypeRegistry::global().read();
    Engine::new(&registry)
        .with_options(settings.engine.clone())
        .with_file_options(settings.storage.clone())
        .append_dataset(file, name, array)
        .with_context(|| format!("Cannot append '{name}' to {}", file.display()))?;
    Ok(())
}

/// Печатает поддерево `node` с отступом по глубине.
fn render_tree(
    container: &dyn Container,
    node: NodeId,
    name: &str,
    depth: usize,
    out: &mut String,
) -> Result<()> {
    let indent = "  ".repeat(depth);
    out.push_str(&format!("{indent}{name}\n"));
    for (entry_name, entry) in container.entries(node)? {
        match entry {
            EntryRef::Attribute(attr) => {
                out.push_str(&format!("{indent}  @{entry_name} = {}\n", describe_attr(attr)));
            }
            EntryRef::Dataset(dataset) => {
                out.push_str(&format!("{indent}  {entry_name}: {}\n", describe_dataset(dataset)));
            }
            EntryRef::Child(child) => {
                render_tree(container, child, &format!("{entry_name}/"), depth + 1, out)?;
            }
        }
    }
    Ok(())
}

fn describe_attr(attr: &Attr) -> String {
    match attr {
        Attr::Absent => "absent".to_string(),
        Attr::Bool(b) => b.to_string(),
        Attr::Int(i) => i.to_string(),
        Attr::Float(f) => f.to_string(),
        Attr::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => format!("{s:?}"),
            Err(_) => format!("<{} bytes>", b.len()),
        },
        Attr::Array(a) => describe_array(a),
    }
}

fn describe_dataset(dataset: &Dataset) -> String {
    match dataset {
        Dataset::Array(a) => describe_array(a),
        Dataset::References(refs) => format!("references[{}]", refs.len()),
    }
}

fn describe_array(array: &NdArray) -> String {
    format!("{} {:?}", array.element_type().name(), array.shape())
}

/// Строит массив из вложенных JSON-массивов. Все строки одного уровня
/// должны иметь одинаковую длину; тип элемента: bool, если все значения
/// логические, i64 для целых, иначе f64.
fn json_to_array(json: &serde_json::Value) -> Result<NdArray> {
    let mut shape = Vec::new();
    let mut level = json;
    while let serde_json::Value::Array(items) = level {
        shape.push(items.len());
        match items.first() {
            Some(first) => level = first,
            None => break,
        }
    }
    if shape.is_empty() {
        bail!("Expected a JSON array, got {json}");
    }

    let mut leaves = Vec::new();
    collect_leaves(json, &shape, &mut leaves)?;

    let array = if leaves.iter().all(|v| v.is_boolean()) && !leaves.is_empty() {
        let values = leaves.iter().filter_map(|v| v.as_bool()).collect();
        NdArray::new(shape, hgraph::ArrayData::Bool(values))?
    } else if leaves.iter().all(|v| v.is_i64()) {
        let values = leaves.iter().filter_map(|v| v.as_i64()).collect();
        NdArray::new(shape, hgraph::ArrayData::I64(values))?
    } else if leaves.iter().all(|v| v.is_number()) {
        let values = leaves.iter().filter_map(|v| v.as_f64()).collect();
        NdArray::new(shape, hgraph::ArrayData::F64(values))?
    } else {
        bail!("Array elements must all be numbers or all be booleans");
    };
    Ok(array)
}

fn collect_leaves<'a>(
    json: &'a serde_json::Value,
    shape: &[usize],
    out: &mut Vec<&'a serde_json::Value>,
) -> Result<()> {
    let Some((&len, rest)) = shape.split_first() else {
        if json.is_array() {
            bail!("Array is not rectangular");
        }
        out.push(json);
        return Ok(());
    };
    match json {
        serde_json::Value::Array(items) if items.len() == len => {
            for item in items {
                collect_leaves(item, rest, out)?;
            }
            Ok(())
        }
        _ => bail!("Array is not rectangular"),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
