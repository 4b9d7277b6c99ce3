//! Risk and utility metric records

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A computed metric attached to a run
///
/// Metrics are immutable once computed; fields are only readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    name: String,
    value: f64,
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<JsonValue>,
}

/// Re-identification risk metric (values in `[0, 1]`)
pub type RiskMetric = Metric;

/// Utility loss metric (values in `[0, 1]`, 0 = no loss)
pub type UtilityMetric = Metric;

impl Metric {
    pub fn new(name: impl Into<String>, value: f64, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            label: label.into(),
            details: None,
        }
    }

    /// Attach structured details
    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn details(&self) -> Option<&JsonValue> {
        self.details.as_ref()
    }
}

/// Find a metric by name
pub fn find_metric<'a>(metrics: &'a [Metric], name: &str) -> Option<&'a Metric> {
    metrics.iter().find(|m| m.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metric_builder() {
        let metric = Metric::new("sample_uniqueness", 0.25, "Fraction of unique rows")
            .with_details(json!({"unique_rows": 1, "total_rows": 4}));
        assert_eq!(metric.name(), "sample_uniqueness");
        assert_eq!(metric.value(), 0.25);
        assert_eq!(metric.details().unwrap()["unique_rows"], 1);
    }

    #[test]
    fn test_metric_serialization_skips_empty_details() {
        let metric = Metric::new("x", 0.0, "X");
        let json = serde_json::to_string(&metric).unwrap();
        assert!(!json.contains("details"));
    }

    #[test]
    fn test_find_metric() {
        let metrics = vec![Metric::new("a", 0.1, "A"), Metric::new("b", 0.2, "B")];
        assert_eq!(find_metric(&metrics, "b").unwrap().value(), 0.2);
        assert!(find_metric(&metrics, "c").is_none());
    }
}
