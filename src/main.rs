use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use ulid::Ulid;

use slotcal::config::Config;
use slotcal::fetch::FileFetcher;
use slotcal::listing::ListingManager;
use slotcal::model::{MonthId, Selection};
use slotcal::scheduler::months_to_ensure;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    slotcal::observability::init(config.metrics_port)?;

    let slots_file = config
        .slots_file
        .clone()
        .ok_or("SLOTCAL_SLOTS_FILE must point at a JSON array of time slots")?;
    info!("slotcal starting");
    info!("  slots_file: {}", slots_file.display());
    info!("  zone: {}", config.zone);
    info!("  unit_type: {}", config.unit_type.as_str());
    info!("  horizon_days: {}", config.horizon_days);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let manager = ListingManager::new(
        Arc::new(FileFetcher::new(slots_file)),
        config.listing_settings(),
    );
    let coordinator = manager.get_or_create(Ulid::new())?;

    let now = Utc::now();
    let visible = MonthId::of(now, config.zone);
    let handles = coordinator.ensure_months(visible, now).await;
    for joined in futures::future::join_all(handles).await {
        joined?;
    }

    let selection = Selection::empty();
    let resolution = coordinator.resolve(&selection, now).await;
    let cache = coordinator.snapshot().await;

    for month in months_to_ensure(visible, config.look_ahead_months) {
        let state = match slotcal::store::get(&cache, month) {
            Some(entry) if entry.fetch_error().is_some() => "failed",
            Some(entry) if slotcal::store::is_populated(entry) => "fetched",
            _ => "not fetched",
        };
        println!("{month} ({state})");
        for day in month.days() {
            if resolution.is_outside_bookable_range(day) {
                continue;
            }
            if resolution.is_day_blocked(day) {
                println!("  {day}  blocked");
                continue;
            }
            if config.unit_type.is_time_based() {
                let labels: Vec<String> = resolution
                    .start_times(day)
                    .into_iter()
                    .map(|t| t.label)
                    .collect();
                println!("  {day}  open  [{}]", labels.join(" "));
            } else {
                println!("  {day}  open");
            }
        }
    }

    Ok(())
}
