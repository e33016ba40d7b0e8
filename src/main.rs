use clap::Parser;
use dotenv::dotenv;

use crate::cmd::Cmd;
use crate::logging::init_logging;

mod cmd;
mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RLSTATS_API_KEY and friends may live in .env
    dotenv().ok();
    init_logging();

    Cmd::parse().run().await
}
