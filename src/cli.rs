use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// File containing the rules
    pub file: PathBuf,

    /// Show one rule instead of the summary
    #[arg(short, long, value_name = "NAME")]
    pub rule: Option<String>,
}
