// Result Presenter
//
// Renders an Answer twice: plain text (chat history, PDF export) and HTML (chat
// window). Non-empty table answers additionally get a chart when one applies.

use comfy_table::{presets, Cell, CellAlignment, Table as TextTable};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Answer, ColumnType, Table, Value};
use crate::services::chart::{derive_chart, ChartSpec};

static SHAPE_FOOTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n*\[\d+\s+rows\s+x\s+\d+\s+columns\]\s*$").expect("valid regex"));
static PNG_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(https?://\S+\.png|\S+\.png)").expect("valid regex"));

pub const NO_RESULT: &str = "No result";

#[derive(Debug, Clone)]
pub struct Presentation {
    pub plain_text: String,
    pub html: String,
    pub chart: Option<ChartSpec>,
}

pub fn present(answer: &Answer) -> Presentation {
    match answer {
        Answer::Table(table) if !table.is_empty() => Presentation {
            plain_text: strip_shape_footer(&render_text_table(table)),
            html: render_html_table(table),
            chart: derive_chart(table),
        },
        Answer::Table(_) => present_message(NO_RESULT),
        Answer::Scalar(text) | Answer::Error(text) if text.trim().is_empty() => present_message(NO_RESULT),
        Answer::Scalar(text) | Answer::Error(text) => present_message(text),
    }
}

fn present_message(text: &str) -> Presentation {
    let plain_text = strip_shape_footer(text);
    let mut html = format!("<p>{}</p>", escape_html(&plain_text));

    for png in PNG_REFERENCE.find_iter(&plain_text) {
        let png = png.as_str();
        let src = if png.starts_with("http") {
            png.to_string()
        } else {
            format!("/{}", png.trim_start_matches('/'))
        };
        html.push_str(&format!(
            r#"<br><img src="{}" alt="Chart" style="max-width:100%; height:auto;">"#,
            escape_html(&src)
        ));
    }

    Presentation {
        plain_text,
        html,
        chart: None,
    }
}

/// Drop a trailing `[n rows x m columns]` summary line
pub fn strip_shape_footer(text: &str) -> String {
    SHAPE_FOOTER.replace(text, "").into_owned()
}

fn display_cell(value: &Value, column_type: ColumnType) -> String {
    match value {
        Value::Null if column_type.is_numeric() => "NaN".to_string(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

/// Right-aligned, borderless column layout without a row index
pub fn render_text_table(table: &Table) -> String {
    let mut text_table = TextTable::new();
    text_table.load_preset(presets::NOTHING);
    text_table.set_header(
        table
            .columns
            .iter()
            .map(|c| Cell::new(&c.name).set_alignment(CellAlignment::Right)),
    );
    for row in &table.rows {
        text_table.add_row(
            row.iter()
                .zip(table.columns.iter())
                .map(|(v, c)| Cell::new(display_cell(v, c.column_type)).set_alignment(CellAlignment::Right)),
        );
    }

    // Two spaces ahead of every column, none after; the first column's lead is dropped
    for column in text_table.column_iter_mut() {
        column.set_padding((2, 0));
        column.set_cell_alignment(CellAlignment::Right);
    }

    text_table
        .lines()
        .map(|line| {
            let line = line.strip_prefix("  ").unwrap_or(&line);
            line.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// HTML table with a 1-based row index column
pub fn render_html_table(table: &Table) -> String {
    let mut html = String::from("<table border=\"1\" class=\"dataframe chat-table\">\n  <thead>\n    <tr style=\"text-align: center;\">\n      <th></th>\n");
    for column in &table.columns {
        html.push_str(&format!("      <th>{}</th>\n", escape_html(&column.name)));
    }
    html.push_str("    </tr>\n  </thead>\n  <tbody>\n");

    for (i, row) in table.rows.iter().enumerate() {
        html.push_str(&format!("    <tr>\n      <th>{}</th>\n", i + 1));
        for (value, column) in row.iter().zip(table.columns.iter()) {
            html.push_str(&format!(
                "      <td>{}</td>\n",
                escape_html(&display_cell(value, column.column_type))
            ));
        }
        html.push_str("    </tr>\n");
    }
    html.push_str("  </tbody>\n</table>");
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores() -> Table {
        Table::from_rows(
            "scores",
            vec!["name".to_string(), "score".to_string()],
            vec![
                vec![Value::Text("Ada".to_string()), Value::Int(3)],
                vec![Value::Text("Bartholomew".to_string()), Value::Null],
            ],
        )
    }

    #[test]
    fn test_table_answer_renders_text_html_and_chart() {
        let presentation = present(&Answer::Table(scores()));
        assert_eq!(
            presentation.plain_text,
            "       name  score\n        Ada      3\nBartholomew    NaN"
        );
        assert!(presentation.html.contains("<th>1</th>"));
        assert!(presentation.html.contains("<th>2</th>"));
        assert!(!presentation.html.contains("<th>0</th>"));
        let chart = presentation.chart.unwrap();
        assert_eq!((chart.x.as_str(), chart.y.as_str()), ("name", "score"));
    }

    #[test]
    fn test_text_table_is_borderless_and_right_aligned() {
        let table = Table::from_rows(
            "cities",
            vec!["city".to_string(), "n".to_string()],
            vec![
                vec![Value::Text("Oslo".to_string()), Value::Int(12)],
                vec![Value::Null, Value::Int(7)],
            ],
        );
        assert_eq!(render_text_table(&table), "city   n\nOslo  12\nNone   7");
    }

    #[test]
    fn test_scalar_answer_is_plain_message() {
        let presentation = present(&Answer::Scalar("42 <users>".to_string()));
        assert_eq!(presentation.plain_text, "42 <users>");
        assert_eq!(presentation.html, "<p>42 &lt;users&gt;</p>");
        assert!(presentation.chart.is_none());
    }

    #[test]
    fn test_empty_answers_render_no_result() {
        let empty = Table::from_rows("t", vec!["a".to_string()], vec![]);
        assert_eq!(present(&Answer::Table(empty)).plain_text, NO_RESULT);
        assert_eq!(present(&Answer::Scalar(String::new())).plain_text, NO_RESULT);
    }

    #[test]
    fn test_error_answer_renders_message() {
        let presentation = present(&Answer::Error("AI analysis failed: boom".to_string()));
        assert_eq!(presentation.plain_text, "AI analysis failed: boom");
        assert!(presentation.chart.is_none());
    }

    #[test]
    fn test_message_table_has_no_chart() {
        let presentation = present(&Answer::Table(Table::message("No match found for 'x' in column 'y'")));
        assert!(presentation.plain_text.contains("No match found"));
        assert!(presentation.chart.is_none());
    }

    #[test]
    fn test_strip_shape_footer() {
        assert_eq!(strip_shape_footer("a  b\n1  2\n\n[2 rows x 2 columns]\n"), "a  b\n1  2");
        assert_eq!(strip_shape_footer("no footer"), "no footer");
    }

    #[test]
    fn test_png_references_become_images() {
        let presentation = present(&Answer::Scalar("Chart saved to exports/charts/plot.png".to_string()));
        assert!(presentation.html.contains(r#"<img src="/exports/charts/plot.png""#));
    }
}
