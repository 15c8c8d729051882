use crate::db::DatabaseProvider;
use crate::models::SchemaDocument;

pub const NO_QUERY_PRODUCED: &str = "no query produced";

const ROLE_FRAMING: &str = "You are an expert database analyst. \
Answer the user's question with exactly one read-only SQL query. \
Reply with the SQL only, without explanation.";

/// System turn: role framing, dialect, schema, dialect hints, domain hints.
pub fn build_system_prompt<P>(provider: &P, schema: &SchemaDocument, domain_hints: &[String]) -> String
where
    P: DatabaseProvider + ?Sized,
{
    let mut prompt = format!(
        "{}\n\nThe database is {} and queries must be written in {}.\n\nSchema:\n{}",
        ROLE_FRAMING,
        provider.name(),
        provider.dialect_label(),
        schema.render()
    );

    if let Some(hints) = provider.query_hints() {
        prompt.push_str("\n\nDialect notes:\n");
        prompt.push_str(hints);
    }

    if !domain_hints.is_empty() {
        prompt.push_str("\n\nDomain notes:\n");
        prompt.push_str(&domain_hints.join("\n"));
    }

    prompt
}

/// User turn sent after a failed attempt.
pub fn retry_message(sql: &str, error: &str) -> String {
    if sql.is_empty() {
        format!(
            "Your reply did not contain a SQL query ({}). \
             Reply with one SQL query that answers the question.",
            error
        )
    } else {
        format!(
            "The query\n{}\nfailed with this error:\n{}\n\
             Write a corrected query that answers the original question.",
            sql, error
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbResult;
    use crate::models::{ColumnExclusions, NameSet, RowSet, TableIdentifier};
    use async_trait::async_trait;

    struct Dialect(Option<&'static str>);

    #[async_trait]
    impl DatabaseProvider for Dialect {
        fn name(&self) -> &str {
            "SQL Server"
        }
        fn dialect_label(&self) -> &str {
            "Transact-SQL (T-SQL)"
        }
        async fn list_tables(&self, _: &NameSet, _: &NameSet) -> DbResult<Vec<TableIdentifier>> {
            Ok(Vec::new())
        }
        async fn synthesize_ddl(&self, _: &[TableIdentifier], _: &ColumnExclusions) -> DbResult<String> {
            Ok(String::new())
        }
        fn query_hints(&self) -> Option<&str> {
            self.0
        }
        fn normalize_query(&self, sql: &str) -> String {
            sql.to_string()
        }
        async fn execute(&self, _: &str) -> DbResult<RowSet> {
            Ok(RowSet::empty(0))
        }
    }

    fn schema() -> SchemaDocument {
        SchemaDocument::new(vec![
            "CREATE TABLE [sales].[orders] ([id] INT NOT NULL, [total] MONEY NULL);".to_string(),
        ])
    }

    #[test]
    fn test_system_prompt_sections() {
        let hints = vec![
            "Orders.Status 'C' means cancelled.".to_string(),
            "Amounts are in euros.".to_string(),
        ];
        let prompt = build_system_prompt(&Dialect(Some("- Use TOP n.")), &schema(), &hints);

        assert!(prompt.starts_with(ROLE_FRAMING));
        assert!(prompt.contains("Transact-SQL (T-SQL)"));
        assert!(prompt.contains("CREATE TABLE [sales].[orders]"));
        assert!(prompt.contains("Dialect notes:\n- Use TOP n."));
        assert!(prompt.ends_with("Orders.Status 'C' means cancelled.\nAmounts are in euros."));
    }

    #[test]
    fn test_optional_sections_are_omitted() {
        let prompt = build_system_prompt(&Dialect(None), &schema(), &[]);
        assert!(!prompt.contains("Dialect notes"));
        assert!(!prompt.contains("Domain notes"));
    }

    #[test]
    fn test_retry_message_carries_sql_and_error() {
        let msg = retry_message("SELECT totals FROM sales.orders", r#"column "totals" does not exist"#);
        assert!(msg.contains("SELECT totals FROM sales.orders"));
        assert!(msg.contains(r#"column "totals" does not exist"#));

        let msg = retry_message("", NO_QUERY_PRODUCED);
        assert!(msg.contains(NO_QUERY_PRODUCED));
    }
}
