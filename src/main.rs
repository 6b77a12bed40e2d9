use anyhow::Context;
use chrono::{Local, Utc};
use clap::Parser;
use immonitor::cache::{CacheStore, FileCacheStore};
use immonitor::config::Cli;
use immonitor::crawler::progress::CrawlProgress;
use immonitor::crawler::Crawler;
use immonitor::enrich::reference::ReferenceTable;
use immonitor::enrich::EnrichmentStage;
use immonitor::models::{CacheEntry, EnrichedRecord};
use immonitor::scrapers::{KleinanzeigenClient, SearchQuery};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    info!("🏠 IMMOnitor - Kleinanzeigen listing scout");
    info!("==========================================");

    let query = SearchQuery::new(&cli.location, cli.radius);

    // Reference data is loaded before crawling so a bad file fails fast
    let reference = match &cli.reference {
        Some(path) => ReferenceTable::from_path(path)
            .with_context(|| format!("Failed to load reference prices from {}", path.display()))?,
        None => {
            warn!("No reference price table given, deal scores will be empty");
            ReferenceTable::default()
        }
    };

    let store = FileCacheStore::new(&cli.cache_dir);
    let entry = load_or_crawl(&cli, &query, &store).await?;

    let stage = EnrichmentStage {
        reference: &reference,
        filters: cli.filters(),
        sort_key: cli.sort,
        order: cli.sort_order(),
    };
    let ranked = stage.run(&entry.records);

    info!(
        "🕒 Data captured at {}",
        entry.captured_at.with_timezone(&Local).format("%d.%m.%Y %H:%M:%S")
    );
    info!(
        "✅ {} of {} listings match, sorted by {}\n",
        ranked.len(),
        entry.records.len(),
        cli.sort
    );

    for (i, record) in ranked.iter().enumerate() {
        print_record(i + 1, record);
    }

    if let Some(path) = &cli.output {
        let json = serde_json::to_string_pretty(&ranked)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("💾 Saved {} listings to {}", ranked.len(), path.display());
    }

    Ok(())
}

/// Serve fresh cached listings, or crawl and cache them
async fn load_or_crawl(
    cli: &Cli,
    query: &SearchQuery,
    store: &dyn CacheStore,
) -> anyhow::Result<CacheEntry> {
    let radius = query.radius.selector();

    if !cli.refresh {
        match store.get(&query.location, radius, cli.max_age()).await {
            Ok(Some(entry)) => return Ok(entry),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Cache lookup failed, crawling instead"),
        }
    }

    let client = KleinanzeigenClient::with_timeout(cli.timeout())?;

    // Ctrl-C stops the crawl after the current request
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current request");
                cancel.cancel();
            }
        }
    });

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let progress = tokio::spawn(log_progress(rx));

    info!("Searching {} ({})", query.location, query.radius);
    let crawler = Crawler::new(client, cli.crawl_options())
        .with_progress(tx)
        .with_cancellation(cancel);
    let report = crawler.crawl(&query.origin_url()).await?;
    drop(crawler);
    let _ = progress.await;

    if report.failure_count() > 0 {
        warn!(
            failed_listings = report.failures.len(),
            failed_pages = report.failed_pages.len(),
            "Some pages could not be fetched"
        );
    }

    let captured_at = Utc::now();
    if report.cancelled {
        warn!("Crawl was interrupted, not caching partial results");
    } else if let Err(e) = store
        .put(&query.location, radius, &report.records, captured_at)
        .await
    {
        warn!(error = %e, "Failed to cache listings");
    }

    Ok(CacheEntry {
        captured_at,
        records: report.records,
    })
}

async fn log_progress(mut rx: UnboundedReceiver<CrawlProgress>) {
    while let Some(progress) = rx.recv().await {
        info!(
            "⏳ [{}/{}] {:.0}% - {} left",
            progress.processed,
            progress.total,
            progress.fraction() * 100.0,
            progress.remaining_label()
        );
    }
}

/// Whole euros with spaces as thousands separators
fn format_euros(amount: f64) -> String {
    let digits = format!("{:.0}", amount.abs());
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}{grouped} €")
}

fn or_dash<T>(value: Option<T>, render: impl Fn(T) -> String) -> String {
    value.map(render).unwrap_or_else(|| "-".to_string())
}

fn print_record(position: usize, record: &EnrichedRecord) {
    let listing = &record.listing;

    let price = match listing.price {
        Some(price) if listing.negotiable && price == 0.0 => "VB".to_string(),
        Some(price) if listing.negotiable => format!("{} VB", format_euros(price)),
        other => or_dash(other, format_euros),
    };

    println!("{}. {}", position, listing.title);
    println!(
        "   💰 {} ({})",
        price,
        or_dash(record.price_per_area, |p| format!("{p:.2} €/m²"))
    );
    println!(
        "   📐 {} | {} Zi | Baujahr {}",
        or_dash(listing.area, |a| format!("{a:.0} m²")),
        or_dash(listing.rooms, |r| format!("{r:.1}").replace('.', ",")),
        or_dash(listing.year_built, |y| y.to_string())
    );
    println!(
        "   📊 Ortsüblich: {} - {} (Ø {})",
        or_dash(record.min_reference_price, format_euros),
        or_dash(record.max_reference_price, format_euros),
        or_dash(record.avg_reference_price, format_euros)
    );
    println!("   🏆 Faktor: {}", or_dash(record.deal_score, |d| format!("{d:.2}")));
    println!(
        "   💶 Hausgeld: {} | Kaltmiete: {}",
        or_dash(listing.monthly_fee, format_euros),
        or_dash(listing.net_rent_equivalent, format_euros)
    );
    println!("   📍 {}", listing.locality().unwrap_or("-"));
    if let Some(date) = listing.date_posted {
        println!("   📅 {}", date.format("%d.%m.%Y"));
    }
    println!("   URL: {}", listing.url);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_euros() {
        assert_eq!(format_euros(250_000.0), "250 000 €");
        assert_eq!(format_euros(1_234_567.4), "1 234 567 €");
        assert_eq!(format_euros(999.0), "999 €");
        assert_eq!(format_euros(0.0), "0 €");
    }
}
