//! Valuation Engine - operator binary
//!
//! Validates, rebuilds and inspects per-asset calibrations.

use anyhow::Result;

use valuation_engine::adapters::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (path overrides go here, not in the config)
    dotenvy::dotenv().ok();

    let app = cli::init();
    cli::execute(app).await
}
