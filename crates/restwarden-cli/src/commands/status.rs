use chrono::Local;
use restwarden_core::ledger::{format_hms, load_persisted};
use restwarden_core::storage;

/// Print today's persisted usage.
pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = storage::usage_stats_path()?;
    let stats = load_persisted(&path)?;

    match stats {
        Some(stats) if stats.today_date == Local::now().date_naive() => {
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("date:         {}", stats.today_date);
                println!("daily usage:  {}", format_hms(stats.daily_usage_time));
            }
        }
        _ => {
            if json {
                println!("null");
            } else {
                println!("no usage recorded today");
            }
        }
    }
    Ok(())
}
