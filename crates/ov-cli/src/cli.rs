use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "ov")]
#[command(about = "OpenViking context database", version)]
pub struct Cli {
    /// Local root for the AGFS content store. Defaults to `.openviking`.
    #[arg(long, default_value = ".openviking")]
    pub root: String,
    /// Explicit config file path, ahead of `OPENVIKING_CLI_CONFIG_FILE`
    /// and `~/.openviking/ov.conf`.
    #[arg(long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    AddResource(AddArgs),
    AddSkill(AddArgs),
    Find(FindArgs),
    Search(SearchArgs),
    Ls(UriArg),
    Read(UriArg),
    Abstract(UriArg),
    Overview(UriArg),
    Rm(RemoveArgs),
    Mv(MoveArgs),
    Link(LinkArgs),
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Local file path to ingest.
    pub source: String,
    /// Title for the staged document; defaults to the source file stem.
    #[arg(long)]
    pub title: Option<String>,
    /// Drain the semantic queue synchronously before returning.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub wait: bool,
}

#[derive(Debug, Args)]
pub struct FindArgs {
    #[arg(allow_hyphen_values = true)]
    pub query: String,
    #[arg(long, default_value = "resource")]
    pub context_type: String,
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(allow_hyphen_values = true)]
    pub query: String,
    /// Prior session summary, if any.
    #[arg(long, default_value = "")]
    pub session_summary: String,
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct UriArg {
    pub uri: String,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    pub uri: String,
    #[arg(long, default_value_t = false)]
    pub recursive: bool,
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    pub from_uri: String,
    pub to_uri: String,
}

#[derive(Debug, Args)]
pub struct LinkArgs {
    pub from_uri: String,
    pub to_uri: String,
    #[arg(long, default_value = "")]
    pub reason: String,
}
