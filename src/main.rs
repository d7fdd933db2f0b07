mod config;

/// Version injected at compile time via DYNCLIENT_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("DYNCLIENT_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config::Config;
use dynclient::{
    Connection, ConnectionFactory, Error, JsonResourceLoader, ResourceFactory, Session,
    StaticService, StaticSession,
};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Inspect and call runtime-generated service bindings
#[derive(Parser, Debug)]
#[command(name = "dynclient", version = VERSION, about, long_about = None)]
struct Args {
    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every generated method with its docstring
    Describe {
        /// Service model file (or a service name found in the configured model dirs)
        #[arg(short, long)]
        model: PathBuf,

        /// Directory searched for resource descriptors (repeatable)
        #[arg(long = "resource-dir")]
        resource_dirs: Vec<PathBuf>,

        /// Describe this resource instead of the connection
        #[arg(short, long)]
        resource: Option<String>,
    },
    /// Invoke a generated connection method against the model's canned responses
    Call {
        #[arg(short, long)]
        model: PathBuf,

        /// Region to resolve the endpoint for
        #[arg(long)]
        region: Option<String>,

        /// Generated method name, e.g. create_queue
        method: String,

        /// Parameter as key=json (plain strings need no quoting)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
    },
    /// Update the saved configuration
    Configure {
        /// Default region for `call`
        #[arg(long)]
        region: Option<String>,

        /// Add a resource descriptor directory
        #[arg(long = "resource-dir")]
        resource_dirs: Vec<PathBuf>,

        /// Add a service model directory
        #[arg(long = "model-dir")]
        model_dirs: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> Option<&'static str> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some("error"),
            LogLevel::Warn => Some("warn"),
            LogLevel::Info => Some("info"),
            LogLevel::Debug => Some("debug"),
            LogLevel::Trace => Some("trace"),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(filter) = level.as_filter() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("dynclient {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("dynclient").join("dynclient.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".dynclient").join("dynclient.log");
    }
    PathBuf::from("dynclient.log")
}

fn parse_param(raw: &str) -> std::result::Result<(String, Value), String> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(format!("expected key=value, got '{}'", raw));
    };
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Resolve `--model`: an existing file, or `<name>.json` in a model dir
fn resolve_model(model: &Path, config: &Config) -> Result<PathBuf> {
    if model.is_file() {
        return Ok(model.to_path_buf());
    }

    config
        .model_dirs
        .iter()
        .map(|dir| dir.join(model).with_extension("json"))
        .find(|path| path.is_file())
        .with_context(|| format!("No service model found for {:?}", model))
}

/// Build a session holding the single service described by `model`
fn open_model(model: &Path, config: &Config) -> Result<(Session, String)> {
    let path = resolve_model(model, config)?;
    let service_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .context("Model file name is not valid UTF-8")?
        .to_string();

    let service = StaticService::from_file(&path)
        .with_context(|| format!("Failed to load service model {:?}", path))?;
    tracing::info!("Loaded model for {} from {:?}", service_name, path);

    let core = StaticSession::new().with_service(&service_name, service);
    Ok((Session::new(Arc::new(core)), service_name))
}

fn describe(
    config: &Config,
    model: &Path,
    resource_dirs: &[PathBuf],
    resource: Option<&str>,
) -> Result<()> {
    let (session, service_name) = open_model(model, config)?;
    let connection_class = ConnectionFactory::new(session.clone()).construct_for(&service_name)?;

    let Some(resource_name) = resource else {
        println!("{} (connection)", service_name);
        for name in connection_class.method_names() {
            let docstring = connection_class.docstring(name).unwrap_or_default();
            println!("\n{}()\n{}", name, docstring);
        }
        return Ok(());
    };

    let loader = Arc::new(JsonResourceLoader::new(
        config.effective_resource_dirs(resource_dirs),
    ));
    let resource_class = ResourceFactory::new(session, loader).construct_for(&service_name, resource_name)?;

    println!("{}.{} (resource)", service_name, resource_name);
    for name in resource_class.method_names() {
        if let Some(method) = resource_class.method(name) {
            println!("\n{}() -> {}\n{}", name, method.connection_method, method.docstring);
        }
    }
    Ok(())
}

fn call(
    config: &Config,
    model: &Path,
    region: Option<&str>,
    method: &str,
    params: Vec<(String, Value)>,
) -> Result<Value> {
    let (session, service_name) = open_model(model, config)?;
    let region = config.effective_region(region);

    let connection = ConnectionFactory::new(session)
        .construct_for(&service_name)?
        .connect(Some(&region))?;
    let params: Map<String, Value> = params.into_iter().collect();

    Ok(connection.call(method, params)?)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level)?;
    let mut config = Config::load();

    match args.command {
        Command::Describe {
            model,
            resource_dirs,
            resource,
        } => describe(&config, &model, &resource_dirs, resource.as_deref()),
        Command::Call {
            model,
            region,
            method,
            params,
        } => match call(&config, &model, region.as_deref(), &method, params) {
            Ok(result) => {
                println!("{}", serde_json::to_string_pretty(&result)?);
                Ok(())
            }
            Err(err) => match err.downcast_ref::<Error>() {
                Some(server_error @ Error::ServerError { .. }) => {
                    eprintln!("{}", server_error);
                    std::process::exit(1);
                }
                _ => Err(err),
            },
        },
        Command::Configure {
            region,
            resource_dirs,
            model_dirs,
        } => {
            if region.is_some() {
                config.region = region;
            }
            config.resource_dirs.extend(resource_dirs);
            config.model_dirs.extend(model_dirs);
            config.save()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
