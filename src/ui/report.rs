//! What each CLI command prints

use std::net::SocketAddr;
use std::path::Path;
use std::sync::OnceLock;
use owo_colors::{OwoColorize, Style};
use crate::auth::IssuedToken;
use crate::import::ImportStats;
use crate::storage::{ApiToken, DbStats};
use super::table::{stats_table, tokens_table};

/// Colors only when stdout is a terminal and NO_COLOR is unset
fn colored() -> bool {
    static COLORED: OnceLock<bool> = OnceLock::new();
    *COLORED.get_or_init(|| console::Term::stdout().is_term() && std::env::var_os("NO_COLOR").is_none())
}

fn paint(color: fn(Style) -> Style) -> Style {
    if colored() { color(Style::new()) } else { Style::new() }
}

fn heading() -> Style {
    paint(|s| s.cyan().bold())
}

fn good() -> Style {
    paint(|s| s.green().bold())
}

fn bad() -> Style {
    paint(|s| s.red().bold())
}

fn muted() -> Style {
    paint(|s| s.white().dimmed())
}

fn field(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", format!("{}:", label).style(muted()), value);
}

pub fn serving(addr: SocketAddr, database: &Path) {
    println!("🚀 {}", format!("zipcodes API on http://{}", addr).style(heading()));
    field("database", database.display());
}

pub fn config_written(path: &Path) {
    println!("✅ {}", format!("Wrote {}", path.display()).style(good()));
}

pub fn import_started(file: &Path, database: &Path) {
    println!("📄 {}", format!("Importing {}", file.display()).style(heading()));
    field("database", database.display());
}

pub fn import_finished(stats: &ImportStats) {
    field("rows read", stats.rows);
    field("postal codes", stats.postal_codes);
    field("counties created", stats.counties_created);
    field("places created", stats.places_created);
    if stats.skipped > 0 {
        eprintln!("⚠️  {}", format!("{} malformed rows skipped", stats.skipped).style(bad()));
    }
}

pub fn token_issued(issued: &IssuedToken) {
    println!(
        "✅ {}",
        format!("Issued token {} for '{}'", issued.token.id, issued.token.name).style(good())
    );
    println!("🔑 {}", issued.plain_text);
    println!("{}", "Store it now; it cannot be shown again.".style(muted()));
}

pub fn token_list(tokens: &[ApiToken]) {
    if tokens.is_empty() {
        println!("∅ No tokens issued.");
    } else {
        println!("{}", tokens_table(tokens));
    }
}

/// Prints the outcome of `token revoke`; false when nothing was revoked
pub fn token_revoked(id: i64, revoked: bool) -> bool {
    if revoked {
        println!("✅ {}", format!("Revoked token {}", id).style(good()));
    } else {
        eprintln!("❌ {}", format!("No active token with id {}", id).style(bad()));
    }
    revoked
}

pub fn db_stats(database: &Path, stats: &DbStats) {
    println!("📊 {}", format!("Zipcodes statistics ({})", database.display()).style(heading()));
    println!("{}", stats_table(stats));
    field("places per county", format!("{:.2}", ratio(stats.places, stats.counties)));
    field("postal codes per place", format!("{:.2}", ratio(stats.postal_codes, stats.places)));
}

fn ratio(count: usize, per: usize) -> f64 {
    count as f64 / per.max(1) as f64
}
