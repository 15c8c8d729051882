//! Dialect adaptation.
//!
//! Everything that depends on the SQL flavour of a connection lives here,
//! keyed off [`DatabaseType`]: identifier quoting, `CREATE TABLE` rendering
//! for the schema document, prompt hints and the best-effort rewrite of
//! model-generated queries into the dialect's pagination syntax.

use crate::models::{ColumnDescriptor, DatabaseType, TableIdentifier};
use once_cell::sync::Lazy;
use regex::Regex;

/// `... LIMIT n` at the very end of a statement.
static LIMIT_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^(.*\S)\s+LIMIT\s+(\d+)$").expect("valid LIMIT suffix pattern")
});

/// Any LIMIT clause (optionally with OFFSET) at the end of a statement.
static TRAILING_LIMIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\bLIMIT\s+\d+(?:\s*(?:,|OFFSET)\s*\d+)?$").expect("valid LIMIT pattern")
});

static SELECT_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^SELECT(?:\s+(?:DISTINCT|ALL))?\s+").expect("valid SELECT pattern")
});

static TOP_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^TOP\b").expect("valid TOP prefix pattern"));

/// `SELECT [DISTINCT] TOP n` / `TOP (n)` at the start of a statement.
static TOP_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(SELECT(?:\s+(?:DISTINCT|ALL))?)\s+TOP\s*(?:\(\s*(\d+)\s*\)|(\d+))\s+")
        .expect("valid TOP pattern")
});

static TOP_MODIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(PERCENT|WITH\s+TIES)\b").expect("valid TOP modifier pattern"));

const SQLSERVER_HINTS: &str = "\
- Use SELECT TOP n to limit rows; LIMIT is not supported.
- Quote identifiers with square brackets, e.g. [sales].[orders].
- OFFSET ... FETCH NEXT n ROWS ONLY requires an ORDER BY clause.
- Use GETDATE() for the current time and DATEADD/DATEDIFF for date arithmetic.";

const POSTGRES_HINTS: &str = "\
- Quote identifiers with double quotes when they contain capitals, e.g. \"Orders\".
- Use LIMIT n / OFFSET m for pagination.
- Use ILIKE for case-insensitive matching and NOW() for the current time.";

const MYSQL_HINTS: &str = "\
- Quote identifiers with backticks, e.g. `orders`.
- Use LIMIT n / LIMIT m, n for pagination.
- FULL OUTER JOIN is not supported; combine LEFT and RIGHT joins with UNION.";

impl DatabaseType {
    /// Name of the SQL flavour, used to frame the prompt.
    pub fn dialect_label(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL SQL",
            Self::MySQL => "MySQL SQL",
            Self::SQLite => "SQLite SQL",
            Self::SqlServer => "Transact-SQL (T-SQL)",
        }
    }

    /// Extra guidance for the model, if the dialect needs any.
    pub fn query_hints(&self) -> Option<&'static str> {
        match self {
            Self::SqlServer => Some(SQLSERVER_HINTS),
            Self::PostgreSQL => Some(POSTGRES_HINTS),
            Self::MySQL => Some(MYSQL_HINTS),
            Self::SQLite => None,
        }
    }

    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Self::SqlServer => format!("[{}]", ident.replace(']', "]]")),
            Self::MySQL => format!("`{}`", ident.replace('`', "``")),
            Self::PostgreSQL | Self::SQLite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// `name TYPE[(len)] [NOT] NULL`
    pub fn render_column(&self, column: &ColumnDescriptor) -> String {
        format!(
            "{} {}{} {}",
            self.quote_ident(&column.name),
            column.data_type.trim().to_uppercase(),
            length_suffix(column),
            if column.nullable { "NULL" } else { "NOT NULL" }
        )
    }

    pub fn render_create_table(&self, table: &TableIdentifier, columns: &[ColumnDescriptor]) -> String {
        let columns: Vec<String> = columns.iter().map(|c| self.render_column(c)).collect();
        format!(
            "CREATE TABLE {}.{} ({});",
            self.quote_ident(&table.schema),
            self.quote_ident(&table.name),
            columns.join(", ")
        )
    }

    /// Rewrite a candidate query into this dialect's pagination syntax.
    ///
    /// Strips surrounding whitespace and trailing semicolons. Anything not
    /// recognised passes through unchanged, and applying the rewrite twice
    /// gives the same result as applying it once.
    pub fn normalize_query(&self, sql: &str) -> String {
        let sql = trim_statement(sql);
        let rewritten = match self {
            Self::SqlServer => limit_to_top(sql),
            Self::PostgreSQL | Self::MySQL | Self::SQLite => top_to_limit(sql),
        };
        trim_statement(&rewritten).to_string()
    }
}

fn trim_statement(sql: &str) -> &str {
    sql.trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

fn takes_length(data_type: &str) -> bool {
    let t = data_type.to_lowercase();
    t.contains("char") || t.contains("binary") || t == "bit varying" || t == "varbit"
}

fn length_suffix(column: &ColumnDescriptor) -> String {
    match column.max_length {
        Some(-1) if takes_length(&column.data_type) => "(MAX)".to_string(),
        Some(len) if len > 0 && takes_length(&column.data_type) => format!("({})", len),
        _ => String::new(),
    }
}

fn limit_to_top(sql: &str) -> String {
    let Some(caps) = LIMIT_SUFFIX.captures(sql) else {
        return sql.to_string();
    };
    let (body, count) = (&caps[1], &caps[2]);
    let Some(head) = SELECT_HEAD.find(body) else {
        return sql.to_string();
    };
    let rest = &body[head.end()..];
    if TOP_PREFIX.is_match(rest) || ends_in_line_comment(body) {
        return sql.to_string();
    }
    format!("{}TOP {} {}", &body[..head.end()], count, rest)
}

fn top_to_limit(sql: &str) -> String {
    let Some(caps) = TOP_HEAD.captures(sql) else {
        return sql.to_string();
    };
    let Some(count) = caps.get(2).or_else(|| caps.get(3)) else {
        return sql.to_string();
    };
    let Some(whole) = caps.get(0) else {
        return sql.to_string();
    };
    let rest = &sql[whole.end()..];
    if TOP_MODIFIER.is_match(rest) || TRAILING_LIMIT.is_match(rest) {
        return sql.to_string();
    }
    // A trailing `--` comment would swallow the clause.
    let separator = if ends_in_line_comment(rest) { "\n" } else { " " };
    format!("{} {}{}LIMIT {}", &caps[1], rest, separator, count.as_str())
}

/// Whether the last line of `sql` contains a `--` comment marker.
fn ends_in_line_comment(sql: &str) -> bool {
    sql.lines().last().is_some_and(|line| line.contains("--"))
}
