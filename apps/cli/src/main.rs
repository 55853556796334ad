//! feedgen CLI: probe market-data providers and generate feed configuration.
//!
//! Exit codes: 0 when every feed is supported and every artifact written,
//! 2 when the run completed with dropped feeds or errors, 1 when it aborted.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);

    let code = commands::run(cli).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
