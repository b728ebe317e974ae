//! Chartcheck CLI - lint application bundles before publishing

use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod display;
mod error;
mod exit_codes;

use commands::lint::LintFlags;

#[derive(Parser)]
#[command(name = "chartcheck")]
#[command(author = "Chartcheck Contributors")]
#[command(version)]
#[command(about = "Lint application bundles before they are published", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

/// Who the bundle is rendered for
#[derive(Args, Debug, Clone, Default)]
struct IdentityArgs {
    /// Owner injected as `bfl.username`
    #[arg(long, env = "CHARTCHECK_OWNER")]
    owner: Option<String>,

    /// Admin injected as `admin`
    #[arg(long, env = "CHARTCHECK_ADMIN")]
    admin: Option<String>,
}

impl IdentityArgs {
    fn flags(self) -> LintFlags {
        LintFlags {
            owner: self.owner,
            admin: self.admin,
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Lint a bundle directory
    Lint {
        /// Bundle path
        #[arg(default_value = ".")]
        path: PathBuf,

        #[command(flatten)]
        identity: IdentityArgs,

        /// Skip manifest field, architecture and entrance checks
        #[arg(long)]
        skip_manifest: bool,

        /// Skip rendering templates and the resource checks
        #[arg(long)]
        skip_resources: bool,

        /// Skip bundle layout and identity checks
        #[arg(long)]
        skip_folder: bool,

        /// Fail on templates that use app data without permission
        #[arg(long)]
        check_appdata: bool,

        /// Output the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a single OlaresManifest.yaml
    Manifest {
        /// Manifest file
        file: PathBuf,

        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Run the chart submission checks
    Check {
        /// Chart folder
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Submission title, e.g. "[NEW][firefox][1.0.10]Add firefox"
        #[arg(long)]
        title: Option<String>,

        #[command(flatten)]
        identity: IdentityArgs,
    },
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn run(cli: Cli) -> error::Result<()> {
    match cli.command {
        Commands::Lint {
            path,
            identity,
            skip_manifest,
            skip_resources,
            skip_folder,
            check_appdata,
            json,
        } => {
            let flags = LintFlags {
                skip_manifest,
                skip_resources,
                skip_folder,
                check_appdata,
                ..identity.flags()
            };
            commands::lint::run(&path, &flags, json)
        }

        Commands::Manifest { file, identity } => commands::manifest::run(&file, &identity.flags()),

        Commands::Check {
            path,
            title,
            identity,
        } => commands::check::run(&path, title.as_deref(), &identity.flags()),
    }
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_codes::SUCCESS,
                _ => exit_codes::USAGE_ERROR,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.debug);

    if let Err(err) = run(cli) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
