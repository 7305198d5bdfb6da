use clap::Parser;
use colored::Colorize;
use log::LevelFilter;
use mergebin::cli::{Args, run_cli};

fn main() {
    let args = Args::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.quiet {
        logger.filter_level(LevelFilter::Warn);
    } else if args.verbose == 1 {
        logger.filter_level(LevelFilter::Debug);
    } else if args.verbose > 1 {
        logger.filter_level(LevelFilter::Trace);
    }
    logger.format_timestamp(None).init();

    match run_cli(args) {
        Ok(status) => std::process::exit(status),
        Err(e) => {
            eprintln!("{}", format!("error: {e:#}").red());
            std::process::exit(1);
        }
    }
}
