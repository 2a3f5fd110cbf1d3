use clap::Parser;

use preview_pane::cli::{self, Args, CliError, Command};

fn main() {
    let args = Args::parse();
    let config = args.config.as_deref();

    let result = match args.command {
        None => cli::run_toggle(config, &args.toggle),
        Some(Command::Toggle(toggle)) => cli::run_toggle(config, &toggle),
        Some(Command::Render { path }) => cli::run_render(path).map_err(CliError::from),
        Some(Command::Job { class, path }) => cli::run_job(class, &path).map_err(CliError::from),
        Some(Command::Cache { action }) => cli::handle_cache_action(config, action).map_err(CliError::from),
        Some(Command::Config { action }) => cli::handle_config_action(config, action).map_err(CliError::from),
    };

    if let Err(e) = result {
        if e.needs_report() {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}
