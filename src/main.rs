use clap::Parser;
use larch::cli::commands::Cli;
use larch::cli::handlers;
use larch::io::{config_io, logging};

fn main() {
    let cli = Cli::parse();

    let config = match config_io::read_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };
    logging::init_logging(cli.verbose, &config.logging.level);

    if let Err(e) = handlers::dispatch(cli, &config) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
