use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use s3nb_types::{ContentKind, FileFormat};

#[derive(Parser)]
#[command(
    name = "s3nb",
    about = "Browse and edit notebooks stored in S3",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Content root, s3://bucket[/prefix]
    #[arg(long, global = true)]
    pub base_uri: Option<String>,

    /// Key delimiter used to emulate directories
    #[arg(long, global = true)]
    pub delimiter: Option<String>,

    /// S3-compatible endpoint
    #[arg(long, global = true)]
    pub endpoint_url: Option<String>,

    #[arg(long, global = true)]
    pub region: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum KindArg {
    Directory,
    File,
    Notebook,
}

impl From<KindArg> for ContentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Directory => ContentKind::Directory,
            KindArg::File => ContentKind::File,
            KindArg::Notebook => ContentKind::Notebook,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum EncodingArg {
    Text,
    Base64,
}

impl From<EncodingArg> for FileFormat {
    fn from(encoding: EncodingArg) -> Self {
        match encoding {
            EncodingArg::Text => FileFormat::Text,
            EncodingArg::Base64 => FileFormat::Base64,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// List a directory
    Ls(LsArgs),
    /// Print a notebook, file or directory
    Get(GetArgs),
    /// Upload a local file
    Put(PutArgs),
    /// Delete a file or directory
    Rm(RmArgs),
    /// Rename a file or directory
    Mv(MvArgs),
    /// Report whether a path is a file, a directory or missing
    Exists(ExistsArgs),
    /// Create an untitled notebook, file or directory
    New(NewArgs),
}

#[derive(Args)]
pub struct LsArgs {
    #[arg(default_value = "")]
    pub path: String,
}

#[derive(Args)]
pub struct GetArgs {
    pub path: String,
    #[arg(long = "type")]
    pub kind: Option<KindArg>,
    #[arg(long)]
    pub encoding: Option<EncodingArg>,
    /// Only fetch metadata
    #[arg(long)]
    pub no_content: bool,
}

#[derive(Args)]
pub struct PutArgs {
    pub local: PathBuf,
    pub path: String,
    #[arg(long = "type")]
    pub kind: Option<KindArg>,
}

#[derive(Args)]
pub struct RmArgs {
    pub path: String,
}

#[derive(Args)]
pub struct MvArgs {
    pub from: String,
    pub to: String,
}

#[derive(Args)]
pub struct ExistsArgs {
    pub path: String,
}

#[derive(Args)]
pub struct NewArgs {
    #[arg(default_value = "")]
    pub path: String,
    #[arg(long = "type")]
    pub kind: Option<KindArg>,
    #[arg(long, default_value = ".ipynb")]
    pub ext: String,
}
