use std::io::Write;

use anyhow::{bail, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use colored::Colorize;
use s3nb_contents::{ContentsConfig, ContentsManager, GetOptions, S3ContentsManager};
use s3nb_types::{ContentKind, Contents, ContentsModel, FileContent, Notebook};
use serde_json::json;

use crate::cli::*;

/// Configuration from the file named by `--config`, then the flags.
pub fn load_config(cli: &Cli) -> anyhow::Result<ContentsConfig> {
    let mut config = match &cli.config {
        Some(path) => ContentsConfig::load(path)?,
        None => ContentsConfig::default(),
    };
    if let Some(base_uri) = &cli.base_uri {
        config.base_uri = base_uri.clone();
    }
    if let Some(delimiter) = &cli.delimiter {
        config.key_delimiter = delimiter.clone();
    }
    if let Some(endpoint) = &cli.endpoint_url {
        config.s3.endpoint_url = Some(endpoint.clone());
    }
    if let Some(region) = &cli.region {
        config.s3.region = Some(region.clone());
    }
    if config.base_uri.is_empty() {
        bail!("no content root: pass --base-uri or set base_uri in the config file");
    }
    Ok(config)
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let manager = S3ContentsManager::connect(&config).await?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&manager, cli.command, cli.format, &mut out).await
}

pub async fn execute(
    manager: &dyn ContentsManager,
    command: Command,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Command::Ls(args) => cmd_ls(manager, args, format, out).await,
        Command::Get(args) => cmd_get(manager, args, format, out).await,
        Command::Put(args) => cmd_put(manager, args, format, out).await,
        Command::Rm(args) => {
            manager.delete(&args.path).await?;
            writeln!(out, "{} Deleted {}", "✓".green(), args.path.bold())?;
            Ok(())
        }
        Command::Mv(args) => {
            manager.rename(&args.from, &args.to).await?;
            writeln!(out, "{} Renamed {} to {}", "✓".green(), args.from.bold(), args.to.bold())?;
            Ok(())
        }
        Command::Exists(args) => cmd_exists(manager, args, format, out).await,
        Command::New(args) => cmd_new(manager, args, format, out).await,
    }
}

async fn cmd_ls(
    manager: &dyn ContentsManager,
    args: LsArgs,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let listing = manager
        .get(&args.path, GetOptions::default().kind(ContentKind::Directory))
        .await
        .with_context(|| format!("cannot list '{}'", args.path))?;
    match (format, listing) {
        (OutputFormat::Json, listing) => write_json(out, listing),
        (OutputFormat::Text, Contents::Directory(dir)) => {
            for child in dir.content.unwrap_or_default() {
                writeln!(out, "{}", describe(&child))?;
            }
            Ok(())
        }
        (OutputFormat::Text, other) => bail!("'{}' is a {}, not a directory", args.path, other.kind()),
    }
}

async fn cmd_get(
    manager: &dyn ContentsManager,
    args: GetArgs,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut options = if args.no_content {
        GetOptions::metadata()
    } else {
        GetOptions::default()
    };
    options.kind = args.kind.map(ContentKind::from);
    options.format = args.encoding.map(Into::into);

    let item = manager.get(&args.path, options).await?;
    if format == OutputFormat::Json {
        return write_json(out, item);
    }
    warn_on_message(&item);
    match item {
        Contents::File(file) if file.content.is_some() => {
            if let Some(content) = file.content {
                write!(out, "{}", content.as_str())?;
            }
        }
        Contents::Notebook(nb) if nb.content.is_some() => {
            if let Some(notebook) = nb.content {
                out.write_all(&notebook.to_bytes()?)?;
            }
        }
        Contents::Directory(dir) if dir.content.is_some() => {
            for child in dir.content.unwrap_or_default() {
                writeln!(out, "{}", describe(&child))?;
            }
        }
        other => writeln!(out, "{}", describe(&other))?,
    }
    Ok(())
}

async fn cmd_put(
    manager: &dyn ContentsManager,
    args: PutArgs,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.local)
        .with_context(|| format!("cannot read {}", args.local.display()))?;
    let kind = match args.kind {
        Some(kind) => kind.into(),
        None if args.path.ends_with(manager.notebook_extension()) => ContentKind::Notebook,
        None => ContentKind::File,
    };
    let model = match kind {
        ContentKind::Notebook => {
            let notebook = Notebook::from_slice(&bytes)
                .with_context(|| format!("{} is not a notebook", args.local.display()))?;
            ContentsModel::notebook(&notebook)?
        }
        ContentKind::File => ContentsModel::file(match String::from_utf8(bytes) {
            Ok(text) => FileContent::Text(text),
            Err(err) => FileContent::Base64(STANDARD.encode(err.into_bytes())),
        }),
        ContentKind::Directory => ContentsModel::directory(),
    };

    let saved = manager.save(model, &args.path).await?;
    if format == OutputFormat::Json {
        return write_json(out, saved);
    }
    warn_on_message(&saved);
    writeln!(out, "{} Saved {} {}", "✓".green(), saved.kind(), saved.path().bold())?;
    Ok(())
}

async fn cmd_exists(
    manager: &dyn ContentsManager,
    args: ExistsArgs,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let kind = if manager.file_exists(&args.path).await? {
        Some(ContentKind::File)
    } else if manager.dir_exists(&args.path).await? {
        Some(ContentKind::Directory)
    } else {
        None
    };
    match format {
        OutputFormat::Json => {
            let report = json!({
                "path": args.path,
                "exists": kind.is_some(),
                "type": kind.map(|k| k.as_str()),
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        }
        OutputFormat::Text => match kind {
            Some(kind) => writeln!(out, "{} {}", args.path.bold(), kind.as_str().green())?,
            None => writeln!(out, "{} {}", args.path.bold(), "missing".red())?,
        },
    }
    Ok(())
}

async fn cmd_new(
    manager: &dyn ContentsManager,
    args: NewArgs,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let created = manager
        .new_untitled(&args.path, args.kind.map(ContentKind::from), &args.ext)
        .await?;
    if format == OutputFormat::Json {
        return write_json(out, created);
    }
    writeln!(out, "{} Created {} {}", "✓".green(), created.kind(), created.path().bold())?;
    Ok(())
}

fn write_json(out: &mut impl Write, item: Contents) -> anyhow::Result<()> {
    let wire = item.into_wire()?;
    serde_json::to_writer_pretty(&mut *out, &wire)?;
    writeln!(out)?;
    Ok(())
}

fn warn_on_message(item: &Contents) {
    if let Some(message) = item.message() {
        eprintln!("{} {}", "warning:".yellow().bold(), message);
    }
}

/// One listing line: kind, modification time, name.
fn describe(item: &Contents) -> String {
    let modified = item
        .entry()
        .last_modified
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into());
    let name = match item.kind() {
        ContentKind::Directory => format!("{}/", item.name()).blue().bold().to_string(),
        ContentKind::Notebook => item.name().yellow().to_string(),
        ContentKind::File => item.name().to_string(),
    };
    format!("{:<9} {:>16}  {}", item.kind().as_str(), modified, name)
}
