use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tagwarden")]
#[command(version)]
#[command(about = "Rule-driven tag governance for Azure resources", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Subscription to operate on
    #[arg(long, global = true, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription: Option<String>,

    /// Config file (default: ~/.config/tagwarden/config.toml)
    #[arg(long, global = true, env = "TAGWARDEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Work against a local inventory file instead of Azure
    #[arg(long, global = true, env = "TAGWARDEN_INVENTORY")]
    pub inventory: Option<PathBuf>,

    /// Number of resource groups scanned in parallel
    #[arg(short, long, global = true)]
    pub jobs: Option<usize>,

    /// Overall time limit in seconds (0 disables)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List every resource with its tags
    Scan(ScanArgs),

    /// List resource groups
    Groups {
        /// Also show each group's own tags
        #[arg(long)]
        tags: bool,
    },

    /// Show which rules match which resources, without changing anything
    Evaluate(EvaluateArgs),

    /// Apply the actions of matching rules
    Apply(ApplyArgs),

    /// Back up the current tags of every resource a rule set matches
    Backup(BackupArgs),

    /// Restore tags from a backup file
    Restore(RestoreArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ScanOutputArgs {
    /// Print JSON instead of a listing
    #[arg(long)]
    pub json: bool,

    /// Succeed even if some resource groups could not be scanned
    #[arg(long)]
    pub allow_partial: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub output: ScanOutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    /// Rules file (JSON, or TOML with a .toml extension)
    #[arg(short, long)]
    pub rules: PathBuf,

    #[command(flatten)]
    pub output: ScanOutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
    /// Rules file (JSON, or TOML with a .toml extension)
    #[arg(short, long)]
    pub rules: PathBuf,

    /// Dry run - show what would be done
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Back up current tags before applying
    #[arg(short, long)]
    pub backup: bool,

    /// Backup directory (default: config backup_dir, then ~/.local/state/tagwarden/backups)
    #[arg(long)]
    pub backup_dir: Option<PathBuf>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    #[command(flatten)]
    pub output: ScanOutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct BackupArgs {
    /// Rules file selecting the resources to back up
    #[arg(short, long)]
    pub rules: PathBuf,

    /// Backup directory
    #[arg(long)]
    pub backup_dir: Option<PathBuf>,

    /// Succeed even if some resource groups could not be scanned
    #[arg(long)]
    pub allow_partial: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RestoreArgs {
    /// Backup file written by `apply --backup` or `backup`
    pub file: PathBuf,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}
