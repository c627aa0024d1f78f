//! Terminal rendering for the explorer binary
//!
//! Tables are built with comfy-table, status markers with colored. Every
//! renderer takes `now` explicitly so output is reproducible.

use crate::cache::{Presentation, ResourceStatus};
use crate::format::{
    format_age, format_balance, format_block_time, format_denom, format_hash, format_hash_rate,
    format_micro, format_number, format_share, format_size, format_timestamp, short_hash,
};
use crate::models::{
    AddressBalance, AddressInfo, Block, ChainStats, Health, MempoolTx, NetworkStats, PeerInfo,
    Transaction, TreasuryInfo,
};
use crate::pagination::PaginationWindow;
use crate::resource::{ResourceKind, ResourceValue};
use crate::scheduler::SharedState;
use chrono::{DateTime, Utc};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

fn header(cells: &[&str]) -> Vec<Cell> {
    cells
        .iter()
        .map(|c| Cell::new(c).fg(TableColor::Cyan).add_attribute(Attribute::Bold))
        .collect()
}

fn new_table(columns: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(columns));
    table
}

fn kv_table(rows: Vec<(&str, String)>) -> Table {
    let mut table = new_table(&["Field", "Value"]);
    for (field, value) in rows {
        table.add_row(vec![
            Cell::new(field).fg(TableColor::Grey),
            Cell::new(value).fg(TableColor::White),
        ]);
    }
    table
}

fn opt_text(value: Option<&str>) -> String {
    value.unwrap_or("N/A").to_string()
}

pub fn blocks_table(blocks: &[Block], now: DateTime<Utc>) -> Table {
    let mut table = new_table(&["Height", "Hash", "Age", "Txs", "Miner", "Size", "Difficulty"]);
    for block in blocks {
        table.add_row(vec![
            Cell::new(format!("#{}", block.number)).fg(TableColor::Green),
            Cell::new(short_hash(&block.hash)).fg(TableColor::White),
            Cell::new(format_age(Some(block.timestamp), now)).fg(TableColor::Grey),
            Cell::new(block.tx_count),
            Cell::new(if block.miner.is_empty() {
                "N/A".to_string()
            } else {
                short_hash(&block.miner)
            }),
            Cell::new(format_size(block.size)),
            Cell::new(format_number(Some(block.difficulty))),
        ]);
    }
    table
}

pub fn transactions_table(txs: &[Transaction], symbol: &str, now: DateTime<Utc>) -> Table {
    let mut table = new_table(&["Hash", "Block", "From", "To", "Amount", "Age"]);
    for tx in txs {
        table.add_row(vec![
            Cell::new(short_hash(&tx.hash)).fg(TableColor::White),
            Cell::new(
                tx.block_number
                    .map(|n| format!("#{}", n))
                    .unwrap_or_else(|| "pending".to_string()),
            ),
            Cell::new(tx.from.as_deref().map(short_hash).unwrap_or_else(|| "N/A".into())),
            Cell::new(tx.to.as_deref().map(short_hash).unwrap_or_else(|| "N/A".into())),
            Cell::new(format_balance(Some(tx.amount), symbol)).fg(TableColor::Green),
            Cell::new(format_age(Some(tx.timestamp), now)).fg(TableColor::Grey),
        ]);
    }
    table
}

pub fn mempool_table(txs: &[MempoolTx], symbol: &str, now: DateTime<Utc>) -> Table {
    let mut table = new_table(&["Hash", "From", "To", "Amount", "Fee", "Age"]);
    for tx in txs {
        table.add_row(vec![
            Cell::new(short_hash(&tx.hash)).fg(TableColor::Yellow),
            Cell::new(tx.from.as_deref().map(short_hash).unwrap_or_else(|| "N/A".into())),
            Cell::new(tx.to.as_deref().map(short_hash).unwrap_or_else(|| "N/A".into())),
            Cell::new(format_balance(Some(tx.amount), symbol)),
            Cell::new(format_balance(tx.fee, symbol)),
            Cell::new(format_age(Some(tx.timestamp), now)).fg(TableColor::Grey),
        ]);
    }
    table
}

pub fn peers_table(peers: &[PeerInfo]) -> Table {
    let mut table = new_table(&["ID", "Address", "Version", "Height", "Latency"]);
    for peer in peers {
        table.add_row(vec![
            Cell::new(&peer.id),
            Cell::new(&peer.address),
            Cell::new(opt_text(peer.version.as_deref())),
            Cell::new(format_number(peer.height)),
            Cell::new(
                peer.latency
                    .map(|ms| format!("{} ms", ms))
                    .unwrap_or_else(|| "N/A".to_string()),
            ),
        ]);
    }
    table
}

pub fn network_table(stats: &NetworkStats, now: DateTime<Utc>) -> Table {
    kv_table(vec![
        ("Block height", format_number(stats.block_height)),
        ("Total blocks", format_number(stats.total_blocks)),
        ("Total transactions", format_number(stats.total_txs)),
        ("Addresses", format_number(stats.total_addresses)),
        ("Hash rate", format_hash_rate(stats.network_hash_rate)),
        ("Difficulty", format_number(stats.difficulty)),
        ("Block time", format_block_time(stats.block_time)),
        ("Last block", format_age(stats.last_block_time, now)),
        ("Peers", format_number(stats.peers)),
        ("Mempool", format_number(stats.mempool_size)),
    ])
}

pub fn treasury_table(treasury: &TreasuryInfo, symbol: &str) -> Table {
    let denom = |v: Option<u64>| format!("{} {}", format_denom(v.unwrap_or(0)), symbol);
    kv_table(vec![
        ("Address", opt_text(Some(treasury.address.as_str()).filter(|a| !a.is_empty()))),
        ("Balance", denom(treasury.balance)),
        ("Balance (micro)", format_micro(treasury.balance.unwrap_or(0))),
        (
            "Block fees",
            format!(
                "{} ({})",
                denom(treasury.block_fees),
                format_share(treasury.block_fees, treasury.total_income)
            ),
        ),
        (
            "Tx fees",
            format!(
                "{} ({})",
                denom(treasury.tx_fees),
                format_share(treasury.tx_fees, treasury.total_income)
            ),
        ),
        ("Total income", denom(treasury.total_income)),
        ("Last update", format_timestamp(treasury.last_update)),
    ])
}

pub fn stats_table(stats: &ChainStats, symbol: &str) -> Table {
    kv_table(vec![
        ("Blocks", format_number(stats.blocks.total)),
        ("Latest block", format_number(stats.blocks.latest)),
        ("Transactions", format_number(stats.transactions.total)),
        ("Pending", format_number(stats.transactions.pending)),
        ("Confirmed", format_number(stats.transactions.confirmed)),
        ("Addresses", format_number(stats.addresses.total)),
        ("Active addresses", format_number(stats.addresses.active)),
        ("Hash rate", format_hash_rate(stats.network.hash_rate)),
        ("Difficulty", format_number(stats.network.difficulty)),
        ("Block time", format_block_time(stats.network.block_time)),
        ("Peers", format_number(stats.network.peers)),
        ("Treasury", format_balance(stats.treasury.balance, symbol)),
    ])
}

pub fn block_detail(block: &Block, now: DateTime<Utc>) -> Table {
    kv_table(vec![
        ("Height", block.number.to_string()),
        ("Hash", format_hash(Some(&block.hash))),
        ("Parent", format_hash(block.parent_hash.as_deref())),
        ("Time", format!("{} ({} ago)", format_timestamp(Some(block.timestamp)), format_age(Some(block.timestamp), now))),
        ("Miner", opt_text(Some(block.miner.as_str()).filter(|m| !m.is_empty()))),
        ("Transactions", block.tx_count.to_string()),
        ("Size", format_size(block.size)),
        ("Difficulty", format_number(Some(block.difficulty))),
        ("Nonce", block.nonce.map(|n| n.to_string()).unwrap_or_else(|| "N/A".into())),
        ("Merkle root", format_hash(block.merkle_root.as_deref())),
    ])
}

pub fn transaction_detail(tx: &Transaction, symbol: &str, now: DateTime<Utc>) -> Table {
    kv_table(vec![
        ("Hash", format_hash(Some(&tx.hash))),
        ("Status", opt_text(tx.status.as_deref())),
        ("Block", tx.block_number.map(|n| format!("#{}", n)).unwrap_or_else(|| "pending".into())),
        ("From", opt_text(tx.from.as_deref())),
        ("To", opt_text(tx.to.as_deref())),
        ("Amount", format_balance(Some(tx.amount), symbol)),
        ("Fee", format_balance(tx.fee, symbol)),
        ("Time", format!("{} ({} ago)", format_timestamp(Some(tx.timestamp)), format_age(Some(tx.timestamp), now))),
    ])
}

pub fn address_detail(info: &AddressInfo, balance: Option<&AddressBalance>, symbol: &str) -> Table {
    let balance = balance.map(|b| b.balance).or(info.balance);
    kv_table(vec![
        ("Address", info.address.clone()),
        ("Balance", format_balance(balance, symbol)),
        ("Transactions", format_number(info.tx_count)),
        ("First seen", format_timestamp(info.first_seen)),
        ("Last seen", format_timestamp(info.last_seen)),
        ("Contract", if info.is_contract { "yes" } else { "no" }.to_string()),
    ])
}

pub fn health_table(health: &Health, base_url: &str, now: DateTime<Utc>) -> Table {
    let status = if health.status.eq_ignore_ascii_case("healthy") {
        Cell::new(&health.status).fg(TableColor::Green)
    } else {
        Cell::new(&health.status).fg(TableColor::Red)
    };
    let mut table = kv_table(vec![("Endpoint", base_url.to_string())]);
    table.add_row(vec![Cell::new("Status").fg(TableColor::Grey), status]);
    table.add_row(vec![
        Cell::new("Version").fg(TableColor::Grey),
        Cell::new(opt_text(health.version.as_deref())),
    ]);
    table.add_row(vec![
        Cell::new("Server time").fg(TableColor::Grey),
        Cell::new(match health.timestamp {
            Some(t) => format!("{} ({} ago)", format_timestamp(Some(t)), format_age(Some(t), now)),
            None => "N/A".to_string(),
        }),
    ]);
    table
}

/// Table for any pollable payload.
pub fn resource_table(value: &ResourceValue, symbol: &str, now: DateTime<Utc>) -> Table {
    match value {
        ResourceValue::Blocks(listing) => blocks_table(&listing.items, now),
        ResourceValue::Transactions(listing) => transactions_table(&listing.items, symbol, now),
        ResourceValue::PendingTransactions(txs) => mempool_table(txs, symbol, now),
        ResourceValue::LatestBlock(block) => block_detail(block, now),
        ResourceValue::NetworkStats(stats) => network_table(stats, now),
        ResourceValue::Peers(peers) => peers_table(peers),
        ResourceValue::Treasury(treasury) => treasury_table(treasury, symbol),
        ResourceValue::Stats(stats) => stats_table(stats, symbol),
    }
}

/// One-line freshness marker for a resource.
pub fn status_line(state: &SharedState, now: DateTime<Utc>) -> String {
    match state.status {
        ResourceStatus::Idle | ResourceStatus::Loading if state.value.is_none() => {
            "… loading".bright_black().to_string()
        }
        ResourceStatus::Degraded => {
            let reason = state
                .last_error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            match state.last_success_at {
                Some(at) => format!(
                    "⚠ stale, last updated {} ago ({})",
                    format_age(Some(at), now),
                    reason
                )
                .yellow()
                .to_string(),
                None => format!("⚠ backend unreachable, showing placeholder ({})", reason)
                    .red()
                    .to_string(),
            }
        }
        _ => format!(
            "● live, updated {} ago",
            format_age(state.last_success_at, now)
        )
        .green()
        .to_string(),
    }
}

/// Status line plus table (or an explicit "unavailable" notice). Never empty.
pub fn render_state(
    title: &str,
    kind: ResourceKind,
    state: &SharedState,
    symbol: &str,
    now: DateTime<Utc>,
) -> String {
    let placeholder = ResourceValue::placeholder(kind);
    let shown = state.display(placeholder.as_ref());
    let body = match (&shown, shown.value()) {
        (Presentation::Loading, _) => "waiting for first response".bright_black().to_string(),
        (_, Some(value)) => resource_table(value, symbol, now).to_string(),
        (_, None) => "no data available".red().to_string(),
    };
    format!(
        "{}  {}\n{}",
        title.bright_cyan().bold(),
        status_line(state, now),
        body
    )
}

pub fn pagination_footer(window: &PaginationWindow) -> String {
    let range = window
        .item_range()
        .map(|(first, last)| format!("items {}-{} of {}", first, last, window.total_items))
        .unwrap_or_else(|| "no items".to_string());
    format!(
        "Page {} of {}  ({})",
        window.page,
        window.total_pages.max(1),
        range
    )
    .bright_blue()
    .to_string()
}

pub fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::models::fallback_blocks;
    use crate::resource::Listing;

    #[test]
    fn test_blocks_table_rows() {
        colored::control::set_override(false);
        let now = Utc::now();
        let table = blocks_table(&fallback_blocks(), now).to_string();
        assert!(table.contains("#1"));
        assert!(table.contains("#3"));
        assert!(table.contains("0x1234567890abcd..."));
    }

    #[test]
    fn test_render_state_never_blank() {
        colored::control::set_override(false);
        let now = Utc::now();

        let mut state = SharedState::new();
        let loading = render_state("Blocks", ResourceKind::Blocks, &state, "KALON", now);
        assert!(loading.contains("loading"));

        state.apply_failure(FetchError::Network("connection refused".into()));
        let placeholder = render_state("Blocks", ResourceKind::Blocks, &state, "KALON", now);
        assert!(placeholder.contains("placeholder"));
        assert!(placeholder.contains("#2"));

        let latest = render_state("Latest", ResourceKind::LatestBlock, &state, "KALON", now);
        assert!(latest.contains("no data available"));

        state.apply_success(
            ResourceValue::Blocks(Listing::new(fallback_blocks(), Some(3))),
            now,
        );
        state.apply_failure(FetchError::Server(502));
        let stale = render_state("Blocks", ResourceKind::Blocks, &state, "KALON", now);
        assert!(stale.contains("stale"));
        assert!(stale.contains("HTTP 502"));
    }

    #[test]
    fn test_health_table() {
        colored::control::set_override(false);
        let now = Utc::now();
        let health = Health {
            status: "healthy".to_string(),
            timestamp: Some(now - chrono::Duration::seconds(5)),
            version: Some("1.0.0".to_string()),
        };
        let table = health_table(&health, "http://localhost:8081/", now).to_string();
        assert!(table.contains("healthy"));
        assert!(table.contains("1.0.0"));
        assert!(table.contains("5s ago"));
    }

    #[test]
    fn test_footer() {
        colored::control::set_override(false);
        let window = crate::pagination::derive_window(47, 20, 3);
        assert_eq!(pagination_footer(&window), "Page 3 of 3  (items 41-47 of 47)");
    }
}
