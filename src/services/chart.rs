use serde::Serialize;
use serde_json::{json, Value as JsonValue};

use crate::models::Table;

pub const AUTO_CHART_TITLE: &str = "Auto Chart";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
}

/// Line chart over one category column and one numeric column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x: String,
    pub y: String,
    pub title: String,
    pub x_values: Vec<JsonValue>,
    pub y_values: Vec<JsonValue>,
}

impl ChartSpec {
    /// Figure JSON a plotly.js front end can render directly
    pub fn to_plotly_json(&self) -> JsonValue {
        json!({
            "data": [{
                "type": "scatter",
                "mode": "lines",
                "x": self.x_values,
                "y": self.y_values,
                "name": self.y,
            }],
            "layout": {
                "title": { "text": self.title },
                "xaxis": { "title": { "text": self.x } },
                "yaxis": { "title": { "text": self.y } },
            }
        })
    }
}

/// Derive a line chart from a result table, or decline.
///
/// x is the first column; y is the first numeric column unless that is x, in
/// which case the second numeric column is used.
pub fn derive_chart(table: &Table) -> Option<ChartSpec> {
    if table.is_empty() || table.column_count() < 2 {
        return None;
    }

    let numeric: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.column_type.is_numeric())
        .map(|(i, _)| i)
        .collect();
    if numeric.is_empty() {
        tracing::debug!("Not enough suitable columns to generate a chart");
        return None;
    }

    let x_idx = 0;
    let y_idx = if numeric[0] != x_idx {
        numeric[0]
    } else {
        *numeric.get(1)?
    };

    let x = table.columns[x_idx].name.clone();
    let y = table.columns[y_idx].name.clone();
    tracing::debug!("Generated chart: x={}, y={}", x, y);

    Some(ChartSpec {
        kind: ChartKind::Line,
        x_values: table.rows.iter().map(|r| JsonValue::from(&r[x_idx])).collect(),
        y_values: table.rows.iter().map(|r| JsonValue::from(&r[y_idx])).collect(),
        x,
        y,
        title: AUTO_CHART_TITLE.to_string(),
    })
}
