use std::path::PathBuf;

use clap::{ArgAction, Parser};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
#[command(group(
    clap::ArgGroup::new("source")
        .required(true)
        .args(["config", "env"]),
))]
pub struct Args {
    /// Read configuration from a TOML file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Read configuration from YUMSYNC_* environment variables
    #[arg(short, long)]
    pub env: bool,

    /// Bootstrap a bucket: transfer everything, skip files already
    /// stored, publish the index without writing a manifest
    #[arg(long)]
    pub seed: bool,

    /// Only sync repositories whose URL contains this fragment
    #[arg(short, long, value_name = "FRAGMENT")]
    pub repo: Option<String>,

    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long)]
    pub quiet: bool,

    /// Output logs as json
    #[arg(short, long)]
    pub json: bool,
}
