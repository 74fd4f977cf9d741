use clap::Parser;
use log::error;

use tiny_raster::app;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let params = app::Params::parse();
    if let Err(e) = app::run(params) {
        error!("{}", e);
        return Err(e);
    }

    return Ok(());
}
