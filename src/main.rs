use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;

fn main() -> Result<()> {
    let cfg = sine_player::config::Config::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cfg.default_log_filter()));
    if let Some(path) = cfg.log_file.as_deref() {
        let file = File::create(path).with_context(|| format!("create log file {}", path.display()))?;
        logger.target(env_logger::Target::Pipe(Box::new(file)));
    }
    logger.init();

    if cfg.list_devices {
        sine_player::audio::list_output_devices()?;
        return Ok(());
    }

    sine_player::app::run(cfg)
}
