use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use feedwatch::config::Config;
use feedwatch::engine::Engine;
use feedwatch::store::StateChange;
use feedwatch::util::truncate_to_width;

/// Width used when printing post and feed titles.
const TITLE_WIDTH: usize = 96;

/// Get the default config file path (~/.config/feedwatch/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("feedwatch")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedwatch",
    about = "Subscribe to RSS/Atom feeds and print new posts as they appear",
    after_help = "While running, type a feed URL to subscribe or `read <post-id>` to open a post."
)]
struct Args {
    /// Feed URLs to subscribe to at startup
    #[arg(value_name = "URL")]
    urls: Vec<String>,

    /// Config file (default: ~/.config/feedwatch/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Poll interval in milliseconds
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Fetch feeds through a CORS relay (e.g. https://allorigins.hexlet.app/get)
    #[arg(long, value_name = "URL")]
    relay: Option<String>,

    /// Allow feeds on localhost and private networks
    #[arg(long)]
    allow_private_hosts: bool,
}

/// Command typed on stdin.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Subscribe(&'a str),
    Read(&'a str),
}

fn parse_command(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match line.strip_prefix("read ") {
        Some(id) => Some(Command::Read(id.trim())),
        None => Some(Command::Subscribe(line)),
    }
}

fn print_change(change: &StateChange) {
    match change {
        StateChange::SubscriptionAdded { url } => println!("subscribed  {url}"),
        StateChange::FeedAdded(feed) => {
            println!("feed #{}  {}", feed.id, truncate_to_width(&feed.title, TITLE_WIDTH));
            if !feed.description.is_empty() {
                println!("    {}", truncate_to_width(&feed.description, TITLE_WIDTH));
            }
        }
        StateChange::PostsAdded(posts) => {
            for post in posts {
                println!(
                    "  + {}  [{}]",
                    truncate_to_width(&post.title, TITLE_WIDTH),
                    post.id
                );
            }
        }
        StateChange::PostOpened { post, .. } => {
            println!("> {}", post.title);
            if let Some(link) = &post.link {
                println!("  {link}");
            }
            if let Some(description) = &post.description {
                println!("  {}", truncate_to_width(description, TITLE_WIDTH * 3));
            }
        }
        StateChange::ErrorChanged(Some(status)) => {
            eprintln!("error [{}]: {}", status.kind, status.message);
        }
        StateChange::ErrorChanged(None) => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    if let Some(ms) = args.interval_ms {
        config.poll_interval_ms = ms;
    }
    if args.relay.is_some() {
        config.relay_url = args.relay.clone();
    }
    if args.allow_private_hosts {
        config.allow_private_hosts = true;
    }

    let engine = Engine::new(&config).context("Failed to create HTTP client")?;

    let mut changes = engine.observe();
    let printer = tokio::spawn(async move {
        while let Some(change) = changes.recv().await {
            print_change(&change);
        }
    });

    for url in &args.urls {
        // Failures are printed through the observer
        let _ = engine.subscribe(url).await;
    }

    let poller = engine.start_polling();

    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        #[cfg(unix)]
        let sigterm_fut = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        tokio::select! {
            biased;

            _ = sigterm_fut => {
                tracing::info!("Received SIGTERM, shutting down gracefully");
                break;
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT, shutting down gracefully");
                break;
            }

            line = lines.next_line(), if stdin_open => {
                match line.context("Failed to read stdin")? {
                    Some(line) => match parse_command(&line) {
                        Some(Command::Subscribe(url)) => {
                            let _ = engine.subscribe(url).await;
                        }
                        Some(Command::Read(id)) => {
                            if let Err(e) = engine.mark_read(id) {
                                eprintln!("{e}");
                            }
                        }
                        None => {}
                    },
                    // Keep polling after stdin closes
                    None => stdin_open = false,
                }
            }
        }
    }

    poller.abort();
    printer.abort();
    Ok(())
}
