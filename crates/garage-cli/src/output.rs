//! Rendering of command results
//!
//! Human tables by default, pretty JSON with `--json`, and bare keys/ids
//! with `--quiet` so output can be piped into other commands.

use chrono::{Local, TimeZone};
use serde::Serialize;

use garage_core::{Car, Family, SavedParking, SavedState, StoreStats};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is in JSON mode
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a list of families, already sorted for display
    pub fn print_families(&self, families: &[Family]) {
        match self.format {
            OutputFormat::Human => {
                if families.is_empty() {
                    println!("No families found.");
                    return;
                }
                for family in families {
                    let order = family
                        .order
                        .map(|o| o.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:>4} | {}{}",
                        order,
                        family.family_name,
                        extra_summary(&family.extra)
                    );
                }
                println!("\n{} family(ies)", families.len());
            }
            OutputFormat::Json => print_json(&families),
            OutputFormat::Quiet => {
                for family in families {
                    println!("{}", family.family_name);
                }
            }
        }
    }

    /// Print a list of cars
    pub fn print_cars(&self, cars: &[Car]) {
        match self.format {
            OutputFormat::Human => {
                if cars.is_empty() {
                    println!("No cars found.");
                    return;
                }
                for car in cars {
                    println!("{}{}", car.id, extra_summary(&car.extra));
                }
                println!("\n{} car(s)", cars.len());
            }
            OutputFormat::Json => print_json(&cars),
            OutputFormat::Quiet => {
                for car in cars {
                    println!("{}", car.id);
                }
            }
        }
    }

    /// Print a single record of any kind
    pub fn print_record<T: Serialize>(&self, record: &T, id: &str) {
        match self.format {
            OutputFormat::Human | OutputFormat::Json => print_json(record),
            OutputFormat::Quiet => println!("{}", id),
        }
    }

    /// Print saved states, newest first
    pub fn print_states(&self, states: &[SavedState]) {
        match self.format {
            OutputFormat::Human => {
                if states.is_empty() {
                    println!("No saved states.");
                    return;
                }
                for state in states {
                    println!(
                        "{:>6} | {} | {}",
                        state.id.unwrap_or_default(),
                        format_timestamp(state.timestamp),
                        truncate(&state.name, 40)
                    );
                }
                println!("\n{} state(s)", states.len());
            }
            OutputFormat::Json => print_json(&states),
            OutputFormat::Quiet => {
                for state in states {
                    println!("{}", state.id.unwrap_or_default());
                }
            }
        }
    }

    /// Print saved parking entries, newest first
    pub fn print_parking(&self, entries: &[SavedParking]) {
        match self.format {
            OutputFormat::Human => {
                if entries.is_empty() {
                    println!("No saved parking.");
                    return;
                }
                for entry in entries {
                    println!(
                        "{:>6} | {} | {} | limit {} | {}",
                        entry.id.unwrap_or_default(),
                        format_timestamp(entry.timestamp),
                        truncate(&entry.name, 24),
                        entry.limit,
                        truncate(&entry.memo, 30)
                    );
                }
                println!("\n{} entry(ies)", entries.len());
            }
            OutputFormat::Json => print_json(&entries),
            OutputFormat::Quiet => {
                for entry in entries {
                    println!("{}", entry.id.unwrap_or_default());
                }
            }
        }
    }

    /// Print store statistics
    pub fn print_stats(&self, stats: &StoreStats, location: &str) {
        match self.format {
            OutputFormat::Human => {
                println!("Garage Status");
                println!("=============");
                println!();
                println!("Database:       {}", location);
                println!("Schema version: {}", stats.schema_version);
                println!();
                println!("Contents:");
                println!("  Families:      {}", stats.families);
                println!("  Cars:          {}", stats.cars);
                println!("  Saved states:  {}", stats.saved_states);
                println!("  Saved parking: {}", stats.saved_parking);
            }
            OutputFormat::Json => {
                print_json(&serde_json::json!({
                    "database": location,
                    "stats": stats,
                }));
            }
            OutputFormat::Quiet => {
                println!("{}", stats.schema_version);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to encode output: {}", e),
    }
}

/// Compact one-line rendering of opaque fields
fn extra_summary(extra: &serde_json::Map<String, serde_json::Value>) -> String {
    if extra.is_empty() {
        return String::new();
    }
    let rendered = serde_json::Value::Object(extra.clone()).to_string();
    format!(" {}", truncate(&rendered, 60))
}

/// Render a millisecond timestamp in local time
fn format_timestamp(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => millis.to_string(),
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
        assert_eq!(truncate("ééééééé", 5), "éé...");
    }

    #[test]
    fn test_extra_summary() {
        let mut extra = serde_json::Map::new();
        assert_eq!(extra_summary(&extra), "");

        extra.insert("seats".to_string(), json!(4));
        assert_eq!(extra_summary(&extra), r#" {"seats":4}"#);
    }

    #[test]
    fn test_format_timestamp_out_of_range() {
        assert_eq!(format_timestamp(i64::MAX), i64::MAX.to_string());
    }
}
