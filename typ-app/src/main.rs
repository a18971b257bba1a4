use std::path::{Path, PathBuf};

use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use typ_config::{AppConfig, CodecConfig, CommentMode, ConfigError};
use typ_io::{
    CommentStyle, DocumentLoader, DocumentSaver, IoError, ParseOptions, TypFacade, WriteOptions,
    write_str,
};

mod report;

const USAGE: &str = "用法：typ-app [--config PATH] <check|show|format> FILE [OUT]";

enum Command {
    Check(PathBuf),
    Show(PathBuf),
    Format { input: PathBuf, output: Option<PathBuf> },
}

fn main() {
    let mut args = std::env::args().skip(1);
    let mut config_override: Option<PathBuf> = None;
    let mut positional: Vec<String> = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                return;
            }
            other if other.starts_with("--") => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
            other => positional.push(other.to_string()),
        }
    }

    let command = match parse_command(positional) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    let explicit_config = config_override.is_some();
    let (config, config_error) = match load_configuration(config_override) {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    };
    init_logging(&config);
    if let Some(err) = config_error {
        report_config_error(&err, explicit_config);
    }
    let facade = facade_from_config(&config.codec);

    let result = match command {
        Command::Check(path) => run_check(&facade, &path),
        Command::Show(path) => run_show(&facade, &path),
        Command::Format { input, output } => run_format(&facade, &config.codec, &input, output),
    };
    if let Err(err) = result {
        error!(error = %err, "命令执行失败");
        std::process::exit(1);
    }
}

fn parse_command(positional: Vec<String>) -> Result<Command, String> {
    let mut iter = positional.into_iter();
    let Some(name) = iter.next() else {
        return Err("缺少子命令".to_string());
    };
    let Some(file) = iter.next().map(PathBuf::from) else {
        return Err(format!("`{name}` 需要提供 TYP 文件路径"));
    };
    let output = iter.next().map(PathBuf::from);
    if let Some(extra) = iter.next() {
        return Err(format!("多余的参数：{extra}"));
    }

    match name.as_str() {
        "check" | "show" if output.is_some() => Err(format!("`{name}` 只接受一个文件参数")),
        "check" => Ok(Command::Check(file)),
        "show" => Ok(Command::Show(file)),
        "format" => Ok(Command::Format {
            input: file,
            output,
        }),
        other => Err(format!("未知子命令：{other}")),
    }
}

fn facade_from_config(codec: &CodecConfig) -> TypFacade {
    let comment_style = match codec.comment_style {
        CommentMode::QuoteAware => CommentStyle::QuoteAware,
        CommentMode::Legacy => CommentStyle::Legacy,
    };
    TypFacade::with_options(ParseOptions { comment_style }, write_options(codec))
}

fn write_options(codec: &CodecConfig) -> WriteOptions {
    WriteOptions {
        primary_language: codec.primary_language.clone(),
        include_draw_order: codec.write_draw_order,
    }
}

fn run_check(facade: &TypFacade, path: &Path) -> Result<(), IoError> {
    let parsed = facade.load_with_diagnostics(path)?;
    let mut out = String::new();
    let issues = report::render_check(&parsed.document, &parsed.diagnostics, &mut out)?;
    print!("{out}");
    println!(
        "{}：{} 条记录，{} 个问题",
        path.display(),
        parsed.document.record_count(),
        issues
    );
    info!(path = %path.display(), issues, "检查完成");
    Ok(())
}

fn run_show(facade: &TypFacade, path: &Path) -> Result<(), IoError> {
    let document = facade.load(path)?;
    print!("{}", report::render_overview(&document)?);
    Ok(())
}

/// 未指定输出路径时将规范化文本打印到标准输出。
fn run_format(
    facade: &TypFacade,
    codec: &CodecConfig,
    input: &Path,
    output: Option<PathBuf>,
) -> Result<(), IoError> {
    let document = facade.load(input)?;
    match output {
        Some(output) => {
            facade.save(&document, &output)?;
            info!(input = %input.display(), output = %output.display(), "格式化完成");
        }
        None => print!("{}", write_str(&document, &write_options(codec))?),
    }
    Ok(())
}

/// 读取配置；失败时交由调用方在日志初始化之后报告并回退到默认配置。
fn load_configuration(override_path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    match override_path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::discover(),
    }
}

fn report_config_error(err: &ConfigError, explicit: bool) {
    let message = if explicit {
        "加载指定配置失败，使用默认配置"
    } else {
        "加载默认配置失败，使用内建默认值"
    };
    match err {
        ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
            warn!(path = %path.display(), error = %err, "{message}");
        }
        ConfigError::Context { .. } => {
            warn!(error = %err, "{message}");
        }
    }
}

/// 日志写入标准错误，避免与 `show` / `format` 的标准输出混在一起。
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
