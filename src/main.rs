//! CLI entry point for nightlog

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nightlog::{commands, server, Site};

#[derive(Parser)]
#[command(name = "nightlog")]
#[command(version)]
#[command(about = "A static blog generator with category collections", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new site
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        folder: PathBuf,
    },

    /// Create a new post or draft
    New {
        /// Title of the new post
        title: String,

        /// Category of the new post
        #[arg(short = 'C', long)]
        category: Option<String>,

        /// Create the post under source/_drafts
        #[arg(long)]
        draft: bool,

        /// File name relative to the posts directory, without extension
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Generate static files
    #[command(alias = "g")]
    Generate {
        /// Watch for file changes
        #[arg(short, long)]
        watch: bool,
    },

    /// Start a local server
    #[command(alias = "s")]
    Server {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Open browser automatically
        #[arg(short, long)]
        open: bool,

        /// Enable static mode (no file watching)
        #[arg(long)]
        r#static: bool,
    },

    /// Remove the public folder
    Clean,

    /// List site information
    List {
        /// Type of content to list (post, draft, category, helper)
        #[arg(default_value = "post")]
        r#type: String,
    },

    /// Print the derived collections as JSON
    Derive {
        /// Read items from a JSON array instead of the site sources
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        "nightlog=debug,info"
    } else {
        "nightlog=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Init { folder } => {
            let target_dir = if folder.is_absolute() {
                folder
            } else {
                base_dir.join(folder)
            };
            tracing::info!("Initializing site in {:?}", target_dir);
            commands::init::init_site(&target_dir)?;
            println!("Initialized empty site in {:?}", target_dir);
        }

        Commands::New {
            title,
            category,
            draft,
            path,
        } => {
            let site = Site::new(&base_dir)?;
            let file = commands::new::create_post(
                &site,
                &title,
                category.as_deref(),
                draft,
                path.as_deref(),
            )?;
            println!("Created {:?}", file);
        }

        Commands::Generate { watch } => {
            let site = Site::new(&base_dir)?;
            tracing::info!("Generating static files...");

            let report = site.generate()?;
            println!(
                "Generated {} files ({} posts, {} drafts skipped, {} categories)",
                report.files, report.posts, report.drafts, report.categories
            );

            if watch {
                tokio::task::spawn_blocking(move || commands::generate::watch(&base_dir, |_| {}))
                    .await??;
            }
        }

        Commands::Server {
            port,
            ip,
            open,
            r#static,
        } => {
            let site = Site::new(&base_dir)?;

            tracing::info!("Generating static files...");
            site.generate()?;

            server::start(&site, &ip, port, !r#static, open).await?;
        }

        Commands::Clean => {
            let site = Site::new(&base_dir)?;
            site.clean()?;
            println!("Cleaned successfully!");
        }

        Commands::List { r#type } => {
            let site = Site::new(&base_dir)?;
            commands::list::run(&site, &r#type)?;
        }

        Commands::Derive { input } => {
            let site = Site::new(&base_dir)?;
            println!("{}", commands::derive::run(&site, input.as_deref())?);
        }

        Commands::Version => {
            println!("nightlog version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
