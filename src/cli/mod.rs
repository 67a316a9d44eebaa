pub mod command;
pub mod history;
pub mod output;
pub mod track;

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand};
use history::print_history;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use track::run_tracker;

use crate::{
    store::rest::{RestConfig, RestSessionStore, DEFAULT_BASE_URL},
    tracker::SessionTracker,
    utils::{
        clock::DefaultClock,
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, CLI_PREFIX, TRACKER_PREFIX},
        shutdown::detect_shutdown,
    },
};

#[derive(Parser, Debug)]
#[command(name = "worktimer", version, long_about = None)]
#[command(about = "Track work time against a remote workSessions store", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Option<Commands>,
    #[arg(
        long,
        global = true,
        env = "WORKTIMER_URL",
        default_value = DEFAULT_BASE_URL,
        help = "Base url of the store serving the workSessions collection"
    )]
    url: String,
    #[arg(long, global = true, default_value_t = 10, help = "Request timeout in seconds")]
    timeout: u64,
    #[arg(
        long,
        global = true,
        default_value_t = 3,
        help = "How many times listing sessions is attempted before giving up"
    )]
    retries: u32,
    #[arg(
        long,
        global = true,
        help = "Application directory used for logs. By default tries $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Enable trace logging")]
    log: bool,
    #[arg(long = "log-filter", global = true)]
    log_filter: Option<LevelFilter>,
    /// Logs are written to files only, unless this is set. Mostly useful with `history`.
    #[arg(long = "log-console", global = true)]
    log_console: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    #[command(about = "Interactive timer. This is the default")]
    Track,
    #[command(about = "Print total work time of every recorded day")]
    History,
}

impl Args {
    fn log_level(&self) -> Option<LevelFilter> {
        if self.log {
            Some(LevelFilter::TRACE)
        } else {
            self.log_filter
        }
    }

    fn rest_config(&self) -> RestConfig {
        RestConfig {
            base_url: self.url.clone(),
            timeout: Duration::from_secs(self.timeout),
            list_attempts: self.retries,
            ..Default::default()
        }
    }
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();
    let command = args.commands.unwrap_or(Commands::Track);

    let app_dir = match &args.dir {
        Some(dir) => {
            ensure_dir(dir)?;
            dir.clone()
        }
        None => create_application_default_path()?,
    };
    let prefix = match command {
        Commands::Track => TRACKER_PREFIX,
        Commands::History => CLI_PREFIX,
    };
    enable_logging(prefix, &app_dir, args.log_level(), args.log_console)?;

    let store = RestSessionStore::new(args.rest_config())?;
    info!("Using store at {}", args.url);

    match command {
        Commands::History => print_history(store, std::io::stdout()).await,
        Commands::Track => {
            let tracker = SessionTracker::new(store, Box::new(DefaultClock));
            let shutdown = CancellationToken::new();
            let (_, result) = tokio::join!(detect_shutdown(shutdown.clone()), async {
                let result = run_tracker(
                    tracker,
                    BufReader::new(tokio::io::stdin()),
                    std::io::stdout(),
                    shutdown.clone(),
                )
                .await;
                shutdown.cancel();
                result
            });
            result
        }
    }
}
