//! Prompt construction for SQL generation and summarization.

use std::fmt::Write as _;

use invora_shared::TenantId;

use super::executor::QueryRows;
use super::schema::SchemaCatalog;

/// What went wrong on the previous attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    /// SQL the model produced, if any was extracted.
    pub sql: Option<String>,
    /// Failure message.
    pub error: String,
}

/// System prompt for SQL generation.
#[must_use]
pub fn sql_system_prompt(schema: &SchemaCatalog, tenant_id: TenantId, max_rows: u32) -> String {
    format!(
        "You translate questions about invoices into PostgreSQL queries.\n\
         \n\
         Tables (column type, ? = nullable):\n\
         {schema}\n\
         Rules:\n\
         - Write exactly one read-only SELECT statement (a WITH clause is allowed).\n\
         - Use only the tables listed above.\n\
         - Filter every table you reference with tenant_id = '{tenant_id}' in its WHERE or ON clause, \
         joined to other conditions with AND. Put any OR inside parentheses.\n\
         - Return at most {max_rows} rows, using LIMIT.\n\
         - Money columns are NUMERIC; dates are DATE.\n\
         - Do not use comments.\n\
         \n\
         Respond with a JSON object: {{\"sql\": \"...\", \"explanation\": \"...\"}}",
        schema = schema.render(),
    )
}

/// User prompt for SQL generation, carrying the previous failure on retries.
#[must_use]
pub fn sql_user_prompt(question: &str, feedback: Option<&Feedback>) -> String {
    let mut prompt = format!("Question: {question}");
    if let Some(feedback) = feedback {
        prompt.push_str("\n\nYour previous attempt failed.");
        if let Some(sql) = &feedback.sql {
            let _ = write!(prompt, "\nPrevious SQL: {sql}");
        }
        let _ = write!(
            prompt,
            "\nError: {}\nReturn a corrected query.",
            feedback.error
        );
    }
    prompt
}

/// System prompt for summarization.
pub const SUMMARY_SYSTEM_PROMPT: &str = "You answer questions about a company's invoices using \
     query results. Reply in two or three plain sentences. Quote the relevant figures with \
     their currency. Do not mention SQL, queries, tables or columns.";

/// User prompt for summarization, showing at most `row_limit` rows.
#[must_use]
pub fn summary_user_prompt(question: &str, sql: &str, rows: &QueryRows, row_limit: usize) -> String {
    let shown: Vec<_> = rows.rows.iter().take(row_limit).collect();
    let json = serde_json::to_string(&shown).unwrap_or_else(|_| "[]".to_string());
    let mut prompt = format!(
        "Question: {question}\nSQL: {sql}\nRow count: {}\nRows: {json}",
        rows.len()
    );
    if rows.len() > shown.len() {
        let _ = write!(prompt, "\n(Only the first {} rows are shown.)", shown.len());
    }
    prompt
}
