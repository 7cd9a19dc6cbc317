use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "prowlarr-sync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative configuration for Prowlarr instances", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge Prowlarr instances to the configuration file
    Apply(ApplyArgs),

    /// Print the configuration of a running instance
    DumpConfig(DumpConfigArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Apply
// ============================================================================

#[derive(Parser)]
pub struct ApplyArgs {
    /// Config file (default: <config dir>/prowlarr-sync/config.toml)
    #[arg(short, long, env = "PROWLARR_SYNC_CONFIG")]
    pub config: Option<String>,

    /// Only apply to these instances
    #[arg(short, long = "instance", value_name = "NAME")]
    pub instances: Vec<String>,

    /// Number of instances to apply in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: u16,

    /// Warn about remote resources missing from the configuration
    #[arg(long)]
    pub check_unmanaged: bool,
}

// ============================================================================
// Dump Config
// ============================================================================

#[derive(Parser)]
pub struct DumpConfigArgs {
    /// Instance URL, e.g. http://localhost:9696
    pub url: String,

    /// API key (prompted for when omitted, leave empty to discover it)
    #[arg(short = 'k', long)]
    pub api_key: Option<String>,

    /// Output notation
    #[arg(short, long, value_enum, default_value = "toml")]
    pub format: DumpFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DumpFormat {
    Toml,
    Yaml,
}
