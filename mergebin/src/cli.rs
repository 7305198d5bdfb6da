//! Command line interface for mergebin

use std::path::{Path, PathBuf};

use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use colored::Colorize;

use crate::{
    action::{MergeAction, PROGRAM_BIN},
    config::{CONFIG_FILE_NAME, ProjectConfig},
    env::BuildEnv,
    hooks::PostActions,
};

#[derive(Parser, Debug)]
#[command(name = "mergebin", version)]
#[command(
    about = "Merge bootloader, partition table and application into one flashable ESP32 image",
    long_about = None
)]
pub struct Args {
    /// Project directory (`$PROJECT_DIR`), defaults to the current directory
    #[arg(short, long, global = true)]
    pub workdir: Option<PathBuf>,

    /// Configuration file, defaults to `<workdir>/.mergebin.toml`
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// More output, repeat for trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the merge step for the built application image
    Merge(TargetArgs),
    /// Print the merge command without running it
    Show(TargetArgs),
    /// Write a default configuration file
    Defconfig(DefconfigArgs),
}

#[derive(ClapArgs, Debug, Default)]
pub struct TargetArgs {
    /// Application image, defaults to `$BUILD_DIR/${PROGNAME}.bin`
    #[arg(short, long)]
    pub target: Option<String>,
}

#[derive(ClapArgs, Debug, Default)]
pub struct DefconfigArgs {
    /// Overwrite an existing configuration
    #[arg(short, long)]
    pub force: bool,
}

/// Runs the parsed command and returns the process exit status.
pub fn run_cli(args: Args) -> anyhow::Result<i32> {
    let workdir = match args.workdir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let workdir = std::path::absolute(&workdir)?;
    let config_path = args
        .config
        .unwrap_or_else(|| workdir.join(CONFIG_FILE_NAME));

    match args.command {
        Commands::Merge(target) => {
            let env = load_env(workdir, &config_path)?;
            let hook = target.target.as_deref().unwrap_or(PROGRAM_BIN);

            let mut actions = PostActions::new();
            actions.register(&env, hook, MergeAction::new_boxed());
            actions.fire(&env.path(hook), &env)
        }
        Commands::Show(target) => {
            let env = load_env(workdir, &config_path)?;
            let hook = target.target.as_deref().unwrap_or(PROGRAM_BIN);
            let cmd = MergeAction::new().command(&env.path(hook), &env)?;
            println!("{cmd}");
            Ok(0)
        }
        Commands::Defconfig(opts) => {
            defconfig(&config_path, opts.force)?;
            Ok(0)
        }
    }
}

fn load_env(workdir: PathBuf, config_path: &Path) -> anyhow::Result<BuildEnv> {
    let config = ProjectConfig::load(config_path)?;
    BuildEnv::new(workdir, config)
}

fn defconfig(config_path: &Path, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists, use --force to overwrite",
            config_path.display()
        );
    }

    ProjectConfig::template().save(config_path)?;
    let schema_path = ProjectConfig::write_schema(config_path)?;

    println!(
        "{}",
        format!("config saved at {}", config_path.display()).green()
    );
    info!("schema written to {}", schema_path.display());
    Ok(())
}
