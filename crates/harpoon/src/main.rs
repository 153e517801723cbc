//! Harpoon CLI - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::GlobalArgs;

#[derive(Parser)]
#[command(name = "harpoon")]
#[command(version)]
#[command(about = "Collect image configuration and write reproducible build contexts", long_about = None)]
struct Cli {
    /// Root configuration document
    #[arg(short, long, global = true, default_value = "harpoon.yml")]
    config: PathBuf,

    /// Harpoon option (KEY=VALUE, dotted keys nest)
    #[arg(long = "harpoon", value_name = "KEY=VALUE", global = true)]
    overrides: Vec<String>,

    /// Value exposed to the configuration as `bash`
    #[arg(long, global = true)]
    bash: Option<String>,

    /// Value exposed to the configuration as `command`
    #[arg(long = "command", global = true)]
    shell_command: Option<String>,

    #[command(subcommand)]
    action: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List images, their build order and any invalid definitions
    Show {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Extra arguments, available to the configuration as `$@`
        #[arg(last = true)]
        extra: Vec<String>,
    },

    /// Write the build context of an image as a tar stream
    Context {
        /// Image to write the context for
        image: String,

        /// Write the archive to FILE instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Timestamp for the Dockerfile and generated entries (seconds since the epoch)
        #[arg(long)]
        mtime: Option<i64>,

        /// Extra arguments, available to the configuration as `$@`
        #[arg(last = true)]
        extra: Vec<String>,
    },

    /// Print image names in dependency order
    Order {
        /// Extra arguments, available to the configuration as `$@`
        #[arg(last = true)]
        extra: Vec<String>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harpoon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli {
        config,
        overrides,
        bash,
        shell_command,
        action,
    } = Cli::parse();
    let global = |extra| GlobalArgs {
        config,
        overrides,
        bash,
        command: shell_command,
        extra,
    };

    match action {
        Commands::Show { json, extra } => {
            commands::show::execute(&global(extra), commands::show::ShowArgs { json })
        }
        Commands::Context {
            image,
            output,
            mtime,
            extra,
        } => commands::context::execute(
            &global(extra),
            commands::context::ContextArgs {
                image,
                output,
                mtime,
            },
        ),
        Commands::Order { extra } => commands::order::execute(&global(extra)),
    }
}
