use serde_json::{Map, Value};

pub const MAX_METRICS_PER_ROW: usize = 4;

/// One labelled value card in the metric grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    pub label: String,
    pub value: String,
}

/// Lays the fields out in rows of at most [`MAX_METRICS_PER_ROW`], in key order.
pub fn metric_rows(fields: &Map<String, Value>) -> Vec<Vec<Metric>> {
    let metrics: Vec<Metric> = fields
        .iter()
        .map(|(label, value)| Metric {
            label: label.clone(),
            value: display_value(value),
        })
        .collect();
    metrics
        .chunks(MAX_METRICS_PER_ROW)
        .map(|row| row.to_vec())
        .collect()
}

/// Text shown on a metric card. Strings lose their quotes; nested values are compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
