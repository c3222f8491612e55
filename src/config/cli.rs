use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the glossa binary.
#[derive(Debug, Parser)]
#[command(
    name = "glossa",
    version,
    about = "Content-tree backed translation provider"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "GLOSSA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the site whose translation root is used.
    #[arg(long = "site", value_name = "ID", global = true)]
    pub site_id: Option<String>,

    /// Override the master language code.
    #[arg(long = "master-language", value_name = "CODE", global = true)]
    pub master_language: Option<String>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the translation document rendered from a tree snapshot.
    Render(TreeArgs),
    /// Look up one translation; exits with 1 on a miss.
    Lookup(LookupArgs),
    /// List every lookup key loaded from a tree snapshot.
    Keys(KeysArgs),
    /// Merge a classic translation XML file into a tree snapshot.
    Import(ImportArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct TreeArgs {
    /// TOML tree snapshot; defaults to `tree.snapshot` from configuration.
    #[arg(long = "tree", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub tree: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct LookupArgs {
    #[command(flatten)]
    pub tree: TreeArgs,

    /// Language to translate into.
    #[arg(long = "language", value_name = "CODE")]
    pub language: String,

    /// Lookup key, e.g. `/common/hello`.
    #[arg(value_name = "KEY")]
    pub key: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct KeysArgs {
    #[command(flatten)]
    pub tree: TreeArgs,

    /// Language to list keys for; defaults to the master language.
    #[arg(long = "language", value_name = "CODE")]
    pub language: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ImportArgs {
    #[command(flatten)]
    pub tree: TreeArgs,

    /// Node to import below.
    #[arg(long = "parent", value_name = "ID")]
    pub parent: u64,

    /// Translation XML file to import.
    #[arg(value_name = "XML", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

impl Command {
    pub fn tree_args(&self) -> &TreeArgs {
        match self {
            Command::Render(args) => args,
            Command::Lookup(args) => &args.tree,
            Command::Keys(args) => &args.tree,
            Command::Import(args) => &args.tree,
        }
    }
}
