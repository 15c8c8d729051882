//! Rendering row sets as text, for the `ask` tool and the one-shot CLI.

use crate::models::RowSet;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON array of row objects
    Json,
    /// ASCII table (like the MySQL CLI)
    #[default]
    Table,
    /// Markdown table
    Markdown,
}

pub fn format_rows(rows: &RowSet, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(&rows.rows).unwrap_or_default(),
        OutputFormat::Table => format_as_table(rows),
        OutputFormat::Markdown => format_as_markdown(rows),
    }
}

pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn column_names(rows: &RowSet) -> Vec<&str> {
    rows.columns.iter().map(|c| c.name.as_str()).collect()
}

fn footer(rows: &RowSet) -> String {
    let row_text = if rows.row_count() == 1 { "row" } else { "rows" };
    let truncated = if rows.truncated { ", truncated" } else { "" };
    format!(
        "{} {} in set ({:.2} sec{})",
        rows.row_count(),
        row_text,
        rows.execution_time_ms as f64 / 1000.0,
        truncated
    )
}

fn format_as_table(rows: &RowSet) -> String {
    let columns = column_names(rows);
    if columns.is_empty() {
        return "Empty set".to_string();
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.width()).collect();
    for row in &rows.rows {
        for (i, col) in columns.iter().enumerate() {
            if let Some(value) = row.get(*col) {
                widths[i] = widths[i].max(format_value(value).width());
            }
        }
    }

    // `{:<w$}` pads by char count, so pad by display width by hand.
    let pad = |text: &str, width: usize, right: bool| {
        let fill = " ".repeat(width.saturating_sub(text.width()));
        if right {
            format!("{fill}{text}")
        } else {
            format!("{text}{fill}")
        }
    };

    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    let mut output = separator.clone();
    for (col, w) in columns.iter().zip(&widths) {
        output.push_str(&format!("| {} ", pad(col, *w, false)));
    }
    output.push_str("|\n");
    output.push_str(&separator);

    for row in &rows.rows {
        for (col, w) in columns.iter().zip(&widths) {
            let value = row.get(*col).unwrap_or(&JsonValue::Null);
            let right = matches!(value, JsonValue::Number(_));
            output.push_str(&format!("| {} ", pad(&format_value(value), *w, right)));
        }
        output.push_str("|\n");
    }

    output.push_str(&separator);
    output.push_str(&footer(rows));
    output.push('\n');
    output
}

fn format_as_markdown(rows: &RowSet) -> String {
    let columns = column_names(rows);
    if columns.is_empty() {
        return "*Empty set*".to_string();
    }

    let escape = |text: &str| text.replace('|', "\\|").replace('\n', " ");

    let mut output: String = columns
        .iter()
        .map(|c| format!("| {} ", escape(c)))
        .collect::<String>()
        + "|\n";
    output.push_str(&(columns.iter().map(|_| "|---").collect::<String>() + "|\n"));

    for row in &rows.rows {
        for col in &columns {
            let value = row.get(*col).unwrap_or(&JsonValue::Null);
            output.push_str(&format!("| {} ", escape(&format_value(value))));
        }
        output.push_str("|\n");
    }

    output.push_str(&format!("\n*{}*", footer(rows)));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnMetadata;
    use serde_json::json;

    fn sample() -> RowSet {
        let row = |id: i64, name: &str| {
            let mut map = serde_json::Map::new();
            map.insert("id".to_string(), json!(id));
            map.insert("name".to_string(), json!(name));
            map
        };
        RowSet {
            columns: vec![
                ColumnMetadata::new("id", "INTEGER", false),
                ColumnMetadata::new("name", "TEXT", true),
            ],
            rows: vec![row(1, "Ada"), row(10, "Grace|Hopper")],
            truncated: false,
            execution_time_ms: 1500,
        }
    }

    #[test]
    fn test_table_format() {
        let text = format_rows(&sample(), OutputFormat::Table);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "+----+--------------+");
        assert_eq!(lines[1], "| id | name         |");
        assert_eq!(lines[3], "|  1 | Ada          |");
        assert_eq!(lines[4], "| 10 | Grace|Hopper |");
        assert_eq!(lines[6], "2 rows in set (1.50 sec)");
    }

    #[test]
    fn test_markdown_escapes_pipes() {
        let text = format_rows(&sample(), OutputFormat::Markdown);
        assert!(text.starts_with("| id | name |\n|---|---|\n"));
        assert!(text.contains("| 10 | Grace\\|Hopper |"));
    }

    #[test]
    fn test_json_format() {
        let text = format_rows(&sample(), OutputFormat::Json);
        let parsed: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[1]["name"], json!("Grace|Hopper"));
    }

    #[test]
    fn test_empty_and_truncated() {
        assert_eq!(format_rows(&RowSet::empty(0), OutputFormat::Table), "Empty set");
        let mut rows = sample();
        rows.truncated = true;
        assert!(format_rows(&rows, OutputFormat::Table).contains("truncated"));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&JsonValue::Null), "NULL");
        assert_eq!(format_value(&json!([1, 2])), "[1,2]");
    }
}
