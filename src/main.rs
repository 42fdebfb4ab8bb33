use anyhow::Result;
use clap::Parser;

use treescan::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run()
}
