use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{info, warn};
use nowplaying::auth::TokenManager;
use nowplaying::clients::entities::{ListKind, TopRange};
use nowplaying::clients::errors::Result;
use nowplaying::clients::{SpotifyAuth, SpotifyClient};
use nowplaying::config::{self, ConfigBuilder, Settings};
use nowplaying::feed::{FeedConfig, TrackFeed};
use nowplaying::panel::Panel;
use nowplaying::server::{self, AppState};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "nowplaying")]
#[command(version, about = "Spotify \"currently playing\" panel", long_about = None)]
struct Cli {
    /// Seconds between "currently playing" polls
    #[arg(long, global = true)]
    poll_interval: Option<u64>,

    /// Seconds recently played and top tracks are cached
    #[arg(long, global = true)]
    cache_ttl: Option<u64>,

    /// Time window of the top tracks list
    #[arg(long, global = true, value_enum)]
    top_range: Option<TopRange>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch everything once and print the panel
    Now {
        #[arg(long, value_enum, default_value_t = ListKind::Recent)]
        tab: ListKind,
        /// Print the panel as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep the panel up to date in the terminal (r/t switch tabs, f refreshes, q quits)
    Watch {
        #[arg(long, value_enum, default_value_t = ListKind::Recent)]
        tab: ListKind,
    },
    /// Serve the panel as JSON over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    info!("Building config ...");
    config::load_dotenv();
    let mut builder = ConfigBuilder::new();
    if let Some(secs) = cli.poll_interval {
        builder = builder.poll_interval(Duration::from_secs(secs));
    }
    if let Some(secs) = cli.cache_ttl {
        builder = builder.cache_ttl(Duration::from_secs(secs));
    }
    if let Some(range) = cli.top_range {
        builder = builder.top_range(range);
    }
    let settings = builder.build()?;

    match cli.command {
        Commands::Now { tab, json } => now(&settings, tab, json).await,
        Commands::Watch { tab } => watch(&settings, tab).await,
        Commands::Serve { addr } => serve(&settings, &addr).await,
    }
}

fn build_clients(settings: &Settings) -> Result<(TokenManager<SpotifyAuth>, Arc<TrackFeed<SpotifyClient>>)> {
    let auth = Arc::new(SpotifyAuth::try_from_settings(settings)?);
    let tokens = TokenManager::from_settings(auth, settings);
    let client = Arc::new(SpotifyClient::try_default()?);
    let feed = Arc::new(TrackFeed::new(client, FeedConfig::from(settings)));
    Ok((tokens, feed))
}

async fn now(settings: &Settings, tab: ListKind, json: bool) -> Result<()> {
    let (tokens, feed) = build_clients(settings)?;
    let token = tokens.refresh().await?;
    feed.refresh_all(&token.access_token).await;

    let view = Panel::new(tab, settings.display_len).view(&feed.snapshot());
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{view}");
    }
    Ok(())
}

async fn watch(settings: &Settings, tab: ListKind) -> Result<()> {
    let (tokens, feed) = build_clients(settings)?;
    let tokens = tokens.spawn();
    let _feed_handle = feed.clone().spawn(tokens.subscribe());

    let mut panel = Panel::new(tab, settings.display_len);
    let mut states = feed.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = panel.view(&states.borrow_and_update());
                println!("{view}");
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.trim() {
                    "r" => {
                        if panel.switch_tab(ListKind::Recent) {
                            println!("{}", panel.view(&feed.snapshot()));
                        }
                    }
                    "t" => {
                        if panel.switch_tab(ListKind::Top) {
                            println!("{}", panel.view(&feed.snapshot()));
                        }
                    }
                    "f" => match tokens.current() {
                        Some(token) => panel.refresh(&*feed, &token).await,
                        None => warn!("No usable access token yet"),
                    },
                    "q" => break,
                    "" => {}
                    other => warn!("Unknown command {other:?}, expected r, t, f or q"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    info!("Stopping ...");
    Ok(())
}

async fn serve(settings: &Settings, addr: &str) -> Result<()> {
    let (tokens, feed) = build_clients(settings)?;
    let tokens = tokens.spawn();
    let _feed_handle = feed.clone().spawn(tokens.subscribe());
    server::serve(addr, AppState::new(feed, tokens.subscribe(), settings.display_len)).await
}
