//! Pulling the SQL statement out of a model completion.
//!
//! Models are told to answer with bare SQL but often wrap it in a markdown
//! fence or surround it with prose.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:[A-Za-z0-9_+-]*[ \t]*\r?\n)?(.*?)```").expect("valid fence pattern")
});

const STATEMENT_KEYWORDS: &str =
    "SELECT|WITH|INSERT|UPDATE|DELETE|MERGE|VALUES|EXPLAIN|SHOW|PRAGMA|DECLARE|EXEC|EXECUTE";

/// An upper-case statement keyword at the start of a line.
static UPPER_LINE_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?m)^[ \t]*({STATEMENT_KEYWORDS})\b")).expect("valid keyword pattern")
});

/// A statement keyword at the start of a line, in any case. Prose such as
/// "With the schema above" matches too, so hits are checked against
/// [`SQL_SHAPE`].
static LINE_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?im)^[ \t]*({STATEMENT_KEYWORDS})\b")).expect("valid keyword pattern")
});

/// What follows a statement keyword in actual SQL.
static SQL_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)^(?:SELECT\s+(?:.*?\bFROM\b|[\d'"(@*-])|WITH\s+(?:RECURSIVE\s+)?[\w"`\[\]]+\s*(?:\([^)]*\)\s*)?AS\s*\(|INSERT\s+INTO\b|UPDATE\s+\S+\s+SET\b|DELETE\s+FROM\b|MERGE\s+INTO\b|VALUES\s*\(|EXPLAIN\s+(?:ANALYZE\s+|QUERY\s+PLAN\s+)?SELECT\b|SHOW\s+(?:FULL\s+)?(?:TABLES|DATABASES|SCHEMAS|COLUMNS|INDEX|CREATE)\b|PRAGMA\s+\w|DECLARE\s+@|EXEC(?:UTE)?\s+[\w.\[\]]+)"#,
    )
    .expect("valid SQL shape pattern")
});

/// An upper-case statement keyword anywhere, e.g. after "Here you go: ".
static INLINE_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b({STATEMENT_KEYWORDS})\b")).expect("valid keyword pattern")
});

/// The first SQL statement in `completion`, or `None` when there is none.
///
/// A fenced code block wins; otherwise the text from the first statement
/// keyword onwards is used. Either way the statement ends at the first `;`
/// outside quotes and comments.
pub fn extract_sql(completion: &str) -> Option<String> {
    let text = completion.trim();

    let candidate = match FENCE_REGEX.captures(text).and_then(|c| c.get(1)) {
        Some(block) => block.as_str(),
        None => &text[statement_start(text)?..],
    };

    let statement = first_statement(candidate).trim();
    (!statement.is_empty()).then(|| statement.to_string())
}

/// Where the statement begins in unfenced text. Upper-case keywords at a
/// line start are trusted; other line starts must look like SQL; failing
/// both, an upper-case keyword mid-line is used.
fn statement_start(text: &str) -> Option<usize> {
    if let Some(keyword) = UPPER_LINE_KEYWORD.captures(text).and_then(|c| c.get(1)) {
        return Some(keyword.start());
    }
    LINE_KEYWORD
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.start())
        .find(|&start| looks_like_sql(&text[start..]))
        .or_else(|| INLINE_KEYWORD.find(text).map(|m| m.start()))
}

fn looks_like_sql(text: &str) -> bool {
    let first_line = text.lines().next().unwrap_or_default().trim_end();
    !first_line.ends_with([':', '.', '?', '!']) && SQL_SHAPE.is_match(text)
}

#[derive(Clone, Copy)]
enum Scan {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Everything up to the first `;` that is not inside a string literal,
/// quoted identifier or comment.
fn first_statement(sql: &str) -> &str {
    let mut state = Scan::Code;
    let mut chars = sql.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        let next = chars.peek().map(|&(_, c)| c);
        state = match state {
            Scan::Code => match ch {
                '\'' | '"' | '`' => Scan::Quoted(ch),
                '[' => Scan::Quoted(']'),
                '-' if next == Some('-') => {
                    chars.next();
                    Scan::LineComment
                }
                '/' if next == Some('*') => {
                    chars.next();
                    Scan::BlockComment
                }
                ';' => return &sql[..idx],
                _ => Scan::Code,
            },
            Scan::Quoted(end) if ch == end => Scan::Code,
            Scan::LineComment if ch == '\n' => Scan::Code,
            Scan::BlockComment if ch == '*' && next == Some('/') => {
                chars.next();
                Scan::Code
            }
            other => other,
        };
    }
    sql
}
