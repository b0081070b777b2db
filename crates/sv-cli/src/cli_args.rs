use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "svars")]
#[command(about = "Scoped script variables: apply command tags and resolve macros")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    /// Create a scope from a JSON config and persist it.
    Init(InitArgs),
    /// Apply the command tags found in a text.
    Apply(ApplyArgs),
    /// Expand `${...}` macros in a text.
    Resolve(ResolveArgs),
    /// Print variables of a scope.
    Show(ShowArgs),
}

#[derive(Debug, Args)]
pub(crate) struct ScopeArgs {
    #[arg(long = "state-dir")]
    pub(crate) state_dir: String,
    /// Character scope; omitted means the global scope.
    #[arg(long = "character")]
    pub(crate) character: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct InitArgs {
    #[command(flatten)]
    pub(crate) scope: ScopeArgs,
    #[arg(long = "config")]
    pub(crate) config: Option<String>,
    #[arg(long = "force")]
    pub(crate) force: bool,
}

#[derive(Debug, Args)]
pub(crate) struct ApplyArgs {
    #[command(flatten)]
    pub(crate) scope: ScopeArgs,
    #[arg(long = "text")]
    pub(crate) text: String,
    /// Also print the text with command tags removed.
    #[arg(long = "strip")]
    pub(crate) strip: bool,
    /// Let `registerVar` replace existing variables.
    #[arg(long = "overwrite")]
    pub(crate) overwrite: bool,
}

#[derive(Debug, Args)]
pub(crate) struct ResolveArgs {
    #[command(flatten)]
    pub(crate) scope: ScopeArgs,
    #[arg(long = "text")]
    pub(crate) text: String,
    #[arg(long = "max-passes")]
    pub(crate) max_passes: Option<usize>,
}

#[derive(Debug, Args)]
pub(crate) struct ShowArgs {
    #[command(flatten)]
    pub(crate) scope: ScopeArgs,
    #[arg(long = "path")]
    pub(crate) path: Option<String>,
}
