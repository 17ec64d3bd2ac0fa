use clap::{Parser, Subcommand};
use simple_press::cache::{self, BuildCache};
use simple_press::config::{self, BuildConfig};
use simple_press::manager::Manager;
use simple_press::{output, plugins};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that run a build.
#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Disable the build cache; every post is rebuilt
    #[arg(long)]
    no_cache: bool,

    /// Maximum parallel workers (default: all cores)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Parser)]
#[command(name = "simple-press")]
#[command(about = "Plugin-driven static site generator with incremental builds")]
#[command(long_about = "\
Plugin-driven static site generator with incremental builds

Markdown files under the content directory become pages. A build runs
seven stages in order:

  discover → load → transform → render → collect → write → cleanup

Posts whose source, declared dependencies and feed membership are
unchanged since the last build are served from the cache.

Front matter (optional, TOML between +++ lines):

  +++
  title = \"Hello\"
  tags = [\"rust\"]
  template = \"post\"          # or \"page\"
  private = false
  dependencies = [\"about.md\"]
  +++

Run 'simple-press gen-config' to generate a documented simple-press.toml.")]
#[command(version)]
struct Cli {
    /// Config file; relative directories in it resolve against its folder
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Content directory (overrides content_dir)
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    /// Output directory (overrides output_dir)
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Log plugin invocations and cache decisions
    #[arg(long, short, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline and write the site
    Build(BuildArgs),
    /// Discover and load content, reporting problems without writing
    Check,
    /// Print a stock simple-press.toml with all options documented
    GenConfig,
    /// Delete the build cache so the next build runs cold
    CleanCache,
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<BuildConfig, Box<dyn std::error::Error>> {
    let mut config = config::load_config_from(&cli.config)?;
    if let Some(source) = &cli.source {
        config.content_dir = source.clone();
    }
    if let Some(output) = &cli.output {
        config.output_dir = output.clone();
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Command::Build(args) => {
            let mut config = load_config(&cli)?;
            if args.no_cache {
                config.build.no_cache = true;
            }
            if args.workers.is_some() {
                config.build.workers = args.workers;
            }
            config.validate()?;

            let cache = if config.build.no_cache {
                BuildCache::disabled()
            } else {
                BuildCache::load(&config.cache_dir)
            };
            let output_dir = config.output_dir.clone();
            let mut manager = Manager::new(config, cache);
            for plugin in plugins::defaults() {
                manager.register_boxed(plugin);
            }
            let result = manager.run().map(|_| ());
            output::print_build_report(manager.report());
            result?;
            println!("==> Build complete: {}", output_dir.display());
        }
        Command::Check => {
            let config = load_config(&cli)?;
            config.validate()?;
            // A check must not advance the cache: nothing was written.
            let mut manager = Manager::new(config, BuildCache::disabled());
            for plugin in plugins::check_set() {
                manager.register_boxed(plugin);
            }
            let result = manager.run().map(|_| ());
            output::print_check_report(manager.report());
            result?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::CleanCache => {
            let config = load_config(&cli)?;
            if cache::clear(&config.cache_dir)? {
                println!("Removed {}", cache::manifest_path(&config.cache_dir).display());
            } else {
                println!("No cache at {}", config.cache_dir.display());
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
