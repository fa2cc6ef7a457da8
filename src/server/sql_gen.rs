//! Text-to-SQL: prompt assembly, the model call, and reply cleanup.

use tracing::info;

use crate::llm::{LlmChat, LlmError, Message};

const SYSTEM: &str = "You are a SQL expert.";

/// Prompt asking for a single query over the tables in `schema_context`.
#[must_use]
pub fn build_prompt(schema_context: &str, schema_name: &str, question: &str) -> String {
    format!(
        "The database schema is:\n\
         \n\
         {schema_context}\n\
         \n\
         Rules:\n\
         - Always prefix every table with the schema name: {schema_name}.\n\
         - ONLY use the tables and columns listed in the schema above.\n\
         - Do not invent new tables or columns.\n\
         \n\
         Convert the following natural language question into a valid SQL query:\n\
         Question: {question}\n\
         \n\
         Return only SQL code, nothing else."
    )
}

/// Drop Markdown code fences the model wraps its answer in.
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```sql", "").replace("```", "").trim().to_string()
}

/// Ask the model for SQL answering `question`.
///
/// # Errors
///
/// Returns the model's [`LlmError`], or [`LlmError::EmptyCompletion`] when
/// nothing is left after fence stripping.
pub async fn generate(
    llm: &dyn LlmChat,
    max_tokens: u32,
    schema_context: &str,
    schema_name: &str,
    question: &str,
) -> Result<String, LlmError> {
    let prompt = build_prompt(schema_context, schema_name, question);
    let response = llm.chat(max_tokens, SYSTEM, &[Message::user(prompt)]).await?;
    info!(
        model = %response.model,
        stop_reason = %response.stop_reason,
        input_tokens = response.input_tokens,
        output_tokens = response.output_tokens,
        "sql_gen: completion"
    );

    let sql = strip_code_fences(&response.text);
    if sql.is_empty() {
        return Err(LlmError::EmptyCompletion);
    }
    Ok(sql)
}

#[cfg(test)]
#[path = "sql_gen_test.rs"]
mod tests;
