//! otelhub CLI entry point.

use otelhub_lib::cli::{self, Cli};
use otelhub_lib::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Execute the command
    cli::execute(cli).await
}
