#![forbid(unsafe_code)]
//! Kalon block explorer for the terminal

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use kalon_explorer::cli;
use kalon_explorer::client::{ApiClient, Backend};
use kalon_explorer::config::{load_config, load_config_from, Config};
use kalon_explorer::error::{ExplorerError, SearchError};
use kalon_explorer::pagination::{build_request, Filters};
use kalon_explorer::resource::{ResourceKey, ResourceKind};
use kalon_explorer::scheduler::{PollingScheduler, SharedState, Subscription};
use kalon_explorer::search::{Navigation, SearchResolver};
use kalon_explorer::view::{Dashboard, ListingView};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to explorer.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Explorer API base URL (overrides config and KALON_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Network summary with the latest blocks and transactions
    Home,
    /// List blocks
    Blocks {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        limit: Option<u32>,
        /// Filter by block hash or height
        #[arg(long)]
        search: Option<String>,
    },
    /// List transactions
    Txs {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Look up a block height, block or transaction hash, or address
    Search { query: String },
    /// Address balance and transactions
    Address {
        address: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Treasury balance and fee income
    Treasury,
    /// Aggregate chain statistics
    Stats,
    /// Connected peers
    Peers,
    /// Pending transactions
    Mempool,
    /// Check that the explorer API is reachable
    Health,
    /// Keep a view on screen and refresh it until Ctrl-C
    Watch {
        #[arg(value_enum, default_value_t = WatchTarget::Home)]
        target: WatchTarget,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum WatchTarget {
    Home,
    Blocks,
    Txs,
    Network,
    Treasury,
    Mempool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("kalon_explorer=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    if let Err(e) = run(args).await {
        eprintln!("{} {}", "✗".red().bold(), e.to_string().red());
        std::process::exit(1);
    }
}

fn resolve_config(args: &Cli) -> Result<Config, ExplorerError> {
    let mut config = match &args.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(url) = &args.api_url {
        config.api.base_url = url.clone();
        config.validate()?;
    }
    Ok(config)
}

async fn run(args: Cli) -> Result<(), ExplorerError> {
    let config = resolve_config(&args)?;
    let client = Arc::new(ApiClient::from_config(&config.api)?);
    tracing::debug!(base_url = %client.base_url(), "explorer client ready");

    let scheduler = PollingScheduler::new(client.clone(), config.polling.clone());
    let symbol = config.display.currency_symbol.as_str();
    let page_size = config.display.page_size;
    // Long enough for one full request plus scheduling slack.
    let settle = config.api.timeout() + Duration::from_secs(1);

    match args.command {
        Commands::Home => {
            let mut dashboard = Dashboard::open(&scheduler);
            let bar = cli::spinner("Loading dashboard...");
            let _ = tokio::time::timeout(settle, async {
                while !dashboard_settled(&dashboard) {
                    if !dashboard.changed().await {
                        break;
                    }
                }
            })
            .await;
            bar.finish_and_clear();
            print_dashboard(&dashboard, symbol);
        }
        Commands::Blocks { page, limit, search } => {
            let mut view = ListingView::open(&scheduler, ResourceKind::Blocks, limit.unwrap_or(page_size));
            if let Some(term) = search.as_deref() {
                view.set_search(term);
            }
            view.go_to(page);
            print_listing(&mut view, "Blocks", symbol, settle).await;
        }
        Commands::Txs { page, limit } => {
            let mut view =
                ListingView::open(&scheduler, ResourceKind::Transactions, limit.unwrap_or(page_size));
            view.go_to(page);
            print_listing(&mut view, "Transactions", symbol, settle).await;
        }
        Commands::Search { query } => {
            let resolver = SearchResolver::new(client.clone());
            let bar = cli::spinner(&format!("Searching for {}...", query.trim()));
            let result = resolver.search(&query).await;
            bar.finish_and_clear();
            let now = Utc::now();
            match result {
                Ok(Navigation::Block(block)) => {
                    println!("{}", "Block".bright_cyan().bold());
                    println!("{}", cli::block_detail(&block, now));
                }
                Ok(Navigation::Transaction(tx)) => {
                    println!("{}", "Transaction".bright_cyan().bold());
                    println!("{}", cli::transaction_detail(&tx, symbol, now));
                }
                Ok(Navigation::Address(info)) => {
                    println!("{}", "Address".bright_cyan().bold());
                    println!("{}", cli::address_detail(&info, None, symbol));
                }
                Err(SearchError::NotFound(what)) => {
                    println!("{}", format!("Nothing found for '{}'", what).yellow());
                    match client.search(&what).await {
                        Ok(hint) if hint.is_match() => println!(
                            "{}",
                            format!("The explorer API classifies it as a {}", hint.kind).bright_black()
                        ),
                        Ok(_) => {}
                        Err(e) => tracing::debug!(query = %what, error = %e, "server search hint failed"),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Address { address, page, limit } => {
            let bar = cli::spinner("Loading address...");
            let params = build_request(page, limit.unwrap_or(page_size), &Filters::none());
            let (info, balance, txs) = tokio::join!(
                client.address(&address),
                client.address_balance(&address),
                client.address_transactions(&address, &params),
            );
            bar.finish_and_clear();
            let info = info?;
            let txs = txs?;
            if let Err(e) = &balance {
                tracing::warn!(address = %address, error = %e, "balance lookup failed");
            }
            println!("{}", cli::address_detail(&info, balance.as_ref().ok(), symbol));
            println!("{}", cli::transactions_table(&txs.items, symbol, Utc::now()));
            let window = kalon_explorer::pagination::derive_window(
                txs.total_or_len(),
                limit.unwrap_or(page_size),
                page,
            );
            println!("{}", cli::pagination_footer(&window));
        }
        Commands::Treasury => {
            let treasury = client.treasury().await?;
            println!("{}", "Treasury".bright_cyan().bold());
            println!("{}", cli::treasury_table(&treasury, symbol));
        }
        Commands::Stats => {
            let stats = client.stats().await?;
            println!("{}", "Chain statistics".bright_cyan().bold());
            println!("{}", cli::stats_table(&stats, symbol));
        }
        Commands::Peers => {
            let peers = client.peers().await?;
            println!("{}", format!("Peers ({})", peers.len()).bright_cyan().bold());
            println!("{}", cli::peers_table(&peers));
        }
        Commands::Mempool => {
            let txs = client.pending_transactions().await?;
            println!("{}", format!("Pending transactions ({})", txs.len()).bright_cyan().bold());
            println!("{}", cli::mempool_table(&txs, symbol, Utc::now()));
        }
        Commands::Health => {
            let health = client.health().await?;
            println!("{}", cli::health_table(&health, client.base_url().as_str(), Utc::now()));
        }
        Commands::Watch { target } => watch(&scheduler, target, symbol, page_size).await,
    }

    Ok(())
}

fn settled(state: &SharedState) -> bool {
    state.value.is_some() || state.is_degraded()
}

fn dashboard_settled(dashboard: &Dashboard) -> bool {
    let snapshot = dashboard.snapshot();
    settled(&snapshot.network) && settled(&snapshot.blocks) && settled(&snapshot.transactions)
}

fn print_dashboard(dashboard: &Dashboard, symbol: &str) {
    let now = Utc::now();
    let snapshot = dashboard.snapshot();
    println!(
        "{}",
        cli::render_state("Network", ResourceKind::NetworkStats, &snapshot.network, symbol, now)
    );
    println!(
        "{}",
        cli::render_state("Latest blocks", ResourceKind::Blocks, &snapshot.blocks, symbol, now)
    );
    println!(
        "{}",
        cli::render_state(
            "Latest transactions",
            ResourceKind::Transactions,
            &snapshot.transactions,
            symbol,
            now
        )
    );
}

async fn print_listing(view: &mut ListingView, title: &str, symbol: &str, settle: Duration) {
    let bar = cli::spinner(&format!("Loading {}...", title.to_lowercase()));
    let _ = tokio::time::timeout(settle, async {
        // A page past the end moves the view to the last page, which is a
        // new key with its own first load.
        while !settled(&view.snapshot()) {
            if !view.changed().await {
                break;
            }
        }
    })
    .await;
    bar.finish_and_clear();

    println!(
        "{}",
        cli::render_state(title, view.listing().kind(), &view.snapshot(), symbol, Utc::now())
    );
    if let Some(window) = view.window() {
        println!("{}", cli::pagination_footer(&window));
    }
}

async fn watch(scheduler: &PollingScheduler, target: WatchTarget, symbol: &str, page_size: u32) {
    let mut redraw = tokio::time::interval(Duration::from_secs(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    match target {
        WatchTarget::Home => {
            let mut dashboard = Dashboard::open(scheduler);
            loop {
                clear_screen();
                print_dashboard(&dashboard, symbol);
                tokio::select! {
                    _ = &mut ctrl_c => break,
                    ok = dashboard.changed() => if !ok { break },
                    _ = redraw.tick() => {}
                }
            }
        }
        WatchTarget::Blocks | WatchTarget::Txs => {
            let (kind, title) = match target {
                WatchTarget::Blocks => (ResourceKind::Blocks, "Blocks"),
                _ => (ResourceKind::Transactions, "Transactions"),
            };
            let mut view = ListingView::open(scheduler, kind, page_size);
            loop {
                clear_screen();
                println!(
                    "{}",
                    cli::render_state(title, kind, &view.snapshot(), symbol, Utc::now())
                );
                if let Some(window) = view.window() {
                    println!("{}", cli::pagination_footer(&window));
                }
                tokio::select! {
                    _ = &mut ctrl_c => break,
                    ok = view.changed() => if !ok { break },
                    _ = redraw.tick() => {}
                }
            }
        }
        WatchTarget::Network | WatchTarget::Treasury | WatchTarget::Mempool => {
            let (kind, title) = match target {
                WatchTarget::Network => (ResourceKind::NetworkStats, "Network"),
                WatchTarget::Treasury => (ResourceKind::Treasury, "Treasury"),
                _ => (ResourceKind::PendingTransactions, "Mempool"),
            };
            let mut subscription: Subscription = scheduler.subscribe(ResourceKey::plain(kind));
            loop {
                clear_screen();
                println!(
                    "{}",
                    cli::render_state(title, kind, &subscription.state(), symbol, Utc::now())
                );
                tokio::select! {
                    _ = &mut ctrl_c => break,
                    ok = subscription.changed() => if !ok { break },
                    _ = redraw.tick() => {}
                }
            }
        }
    }
    println!("{}", "Stopped watching.".bright_black());
}

fn clear_screen() {
    print!("\x1B[2J\x1B[H");
}
