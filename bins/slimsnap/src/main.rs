//! slimsnap: freemium image compression from the command line.

mod commands;
mod context;

use clap::{Parser, Subcommand};
use slimsnap_cli::output::Status;
use slimsnap_core::config::Config;
use slimsnap_core::error::exit_codes;
use slimsnap_core::ErrorCode;
use slimsnap_image::UseCase;
use slimsnap_telemetry::TelemetryConfig;
use std::path::PathBuf;

use context::Context;

#[derive(Parser)]
#[command(name = "slimsnap")]
#[command(about = "Compress images locally, within freemium limits")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a slimsnap.toml
    #[arg(long, global = true, env = "SLIMSNAP_CONFIG")]
    config: Option<String>,

    /// Treat the user as premium
    #[arg(long, global = true)]
    premium: bool,

    /// Track usage for this user id instead of the anonymous scope
    #[arg(long, global = true)]
    user: Option<String>,

    /// Usage file to read and update
    #[arg(long, global = true, env = "SLIMSNAP_USAGE_FILE")]
    usage_file: Option<PathBuf>,

    /// Keep usage in memory only
    #[arg(long, global = true)]
    no_persist: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress images or directories of images
    Compress {
        /// Files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Quality percentage
        #[arg(short, long, default_value_t = 80)]
        quality: u8,

        /// Maximum output width in pixels (0 = no cap)
        #[arg(long, default_value_t = 0)]
        max_width: u32,

        /// Maximum output height in pixels (0 = no cap)
        #[arg(long, default_value_t = 0)]
        max_height: u32,

        /// Directory for compressed files (defaults to next to each original)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Compress images in parallel
        #[arg(long)]
        parallel: bool,

        /// Print collected metrics after the run
        #[arg(long)]
        metrics: bool,
    },

    /// Show usage counters and remaining quota
    Usage,

    /// Check whether a batch would be allowed, without compressing
    Check {
        /// Number of images in the batch
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Quality percentage
        #[arg(short, long, default_value_t = 80)]
        quality: u8,

        /// Maximum output width in pixels (0 = no cap)
        #[arg(long, default_value_t = 0)]
        max_width: u32,

        /// Maximum output height in pixels (0 = no cap)
        #[arg(long, default_value_t = 0)]
        max_height: u32,
    },

    /// Recommend settings for an image
    Recommend {
        /// Image file
        path: PathBuf,

        /// What the image is for: web, email, storage or print
        #[arg(short, long, default_value = "web")]
        use_case: UseCase,
    },

    /// Detect the format and dimensions of an image
    Detect {
        /// Image file
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            Status::error(&e.to_string());
            std::process::exit(exit_codes::CONFIG_ERROR);
        }
    };

    let telemetry = TelemetryConfig::from(&config.schema.telemetry).with_verbosity(cli.verbose);
    if let Err(e) = slimsnap_telemetry::init_with_config(telemetry) {
        Status::warning(&format!("Logging disabled: {e}"));
    }

    let ctx = Context::new(config, &cli);
    let json = cli.json;

    let result = match cli.command {
        Commands::Compress {
            paths,
            quality,
            max_width,
            max_height,
            out_dir,
            parallel,
            metrics,
        } => commands::compress(
            &ctx,
            &commands::CompressArgs {
                paths,
                quality,
                max_width,
                max_height,
                out_dir,
                parallel,
                metrics,
                json,
            },
        ),
        Commands::Usage => commands::usage(&ctx, json),
        Commands::Check {
            count,
            quality,
            max_width,
            max_height,
        } => commands::check(&ctx, count, quality, max_width, max_height, json),
        Commands::Recommend { path, use_case } => commands::recommend(&path, use_case, json),
        Commands::Detect { path } => commands::detect(&path, json),
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => report_error(&e),
    };
    std::process::exit(code);
}

fn report_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<slimsnap_core::Error>() {
        Some(e) => {
            Status::error(&e.message);
            if let Some(context) = &e.context {
                eprintln!("  {context}");
            }
            if let Some(suggestion) = &e.suggestion {
                eprintln!("  {suggestion}");
            }
            match e.code {
                ErrorCode::PolicyDenied => exit_codes::POLICY_DENIED,
                code if code.category() == "Configuration" => exit_codes::CONFIG_ERROR,
                _ => exit_codes::FAILURE,
            }
        }
        None => {
            Status::error(&format!("{err:#}"));
            exit_codes::FAILURE
        }
    }
}
