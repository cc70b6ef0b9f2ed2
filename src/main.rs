use clap::Parser;
use color_eyre::Result;
use meshplot::{run_reports, AppConfig, Args, ConfigManager, RunOptions};
use tracing_subscriber::EnvFilter;

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        let config_manager = ConfigManager::new(meshplot::APP_NAME)?;
        let path = config_manager.write_default_config(args.force)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(Some(()));
    }

    Ok(None)
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    let config = AppConfig::load(meshplot::APP_NAME)?;
    let options = RunOptions::from_args_and_config(&args, &config)?;
    init_tracing(options.debug);
    tracing::debug!(?options, "resolved run options");

    let written = run_reports(&args.selected_reports(), &options)?;
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}
