//! Output formatting for CLI responses.
//!
//! Supports both human-readable and JSON output formats for
//! integration with scripts and other tools.

use tollgate_core::Consumer;

/// Trait for types that can be output in multiple formats.
pub trait Outputable {
    /// Convert to JSON value for structured output.
    fn to_json(&self) -> serde_json::Value;

    /// Convert to human-readable string.
    fn to_human(&self) -> String;
}

/// Print a value in the appropriate format.
pub fn print_output<T: Outputable>(value: &T, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&value.to_json())
                .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize: {}\"}}", e))
        );
    } else {
        println!("{}", value.to_human());
    }
}

pub fn consumer_json(consumer: &Consumer) -> serde_json::Value {
    serde_json::json!({
        "id": consumer.id.as_str(),
        "permits": consumer.permits,
        "state": consumer.state.to_string(),
        "sequence": consumer.sequence,
        "registered_at_ms": consumer.registered_at_ms
    })
}

pub fn consumer_row(consumer: &Consumer) -> String {
    format!("{:<24} {:>8} {}", consumer.id.as_str(), consumer.permits, consumer.state)
}
