use std::path::{Path, PathBuf};
use std::process;

use mio::Poll;
use weblog::{LogLevel, Logger};
use webserv::{config, error::Result, server::Server, signals};

fn main() {
    if let Err(e) = run() {
        eprintln!("Fatal error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default.conf".to_string());

    let content = std::fs::read_to_string(&config_path)
        .map_err(|e| format!("cannot read config '{}': {}", config_path, e))?;
    let configs = config::parse_config(&content)?;
    if let Err(errors) = config::validate_configs(&configs) {
        for error in &errors {
            eprintln!("Config Error: {}", error);
        }
        return Err("configuration validation failed".into());
    }

    let logger = Logger::new(LogLevel::Info).with_file(Path::new("logs/server.log"))?;
    signals::install()?;

    let poll = Poll::new()?;
    let mut server =
        Server::new(configs, logger, &poll)?.with_config_path(PathBuf::from(config_path));
    server.run(poll)
}
