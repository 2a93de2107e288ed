use clap::Parser;
use log::LevelFilter;
use snafu::ErrorCompat;

mod app;
mod args;

fn main() {
    let args = args::Args::parse();
    let mut log_builder = env_logger::Builder::from_default_env();
    if args.verbose {
        log_builder.filter_level(LevelFilter::Debug);
    }
    log_builder.init();

    if let Err(e) = app::run_analysis(&args) {
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
