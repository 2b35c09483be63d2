//! Extraction prompt construction and LLM response parsing.
//!
//! Both chat-based providers share the same JSON contract: a
//! `statement_info` block plus a `transactions` array. Responses are
//! tolerant-parsed; models wrap JSON in prose often enough that we fish
//! the first object literal out of the reply.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use super::{ExtractedRow, ExtractedStatement, ProviderError};

/// Categories offered to the model for classification.
pub const CATEGORIES: &[&str] = &[
    "Groceries",
    "Dining",
    "Transportation",
    "Utilities",
    "Entertainment",
    "Shopping",
    "Healthcare",
    "Subscriptions",
    "Travel",
    "Housing",
    "Insurance",
    "Education",
    "Personal Care",
    "Gifts & Donations",
    "Income",
    "Transfer",
    "Fees & Charges",
    "Other",
];

/// Statement text beyond this is truncated before prompting.
const MAX_PROMPT_CHARS: usize = 50_000;

pub fn system_prompt() -> String {
    format!(
        r#"You are a financial document parser specializing in bank statement extraction.
Your task is to extract transaction data from bank statements accurately.

IMPORTANT RULES:
1. Extract ALL transactions you can find in the document
2. Dates should be in YYYY-MM-DD format
3. Amounts should be positive numbers (indicate income/expense in the type field)
4. Identify the transaction type: 'expense' for charges/purchases, 'income' for credits/deposits
5. Categorize each transaction using these categories: {}
6. Include confidence scores (0.0 to 1.0) based on how certain you are about each extraction
7. Preserve the original description exactly as it appears

OUTPUT FORMAT (JSON):
{{
  "statement_info": {{
    "statement_start": "YYYY-MM-DD or null",
    "statement_end": "YYYY-MM-DD or null"
  }},
  "transactions": [
    {{
      "date": "YYYY-MM-DD",
      "description": "cleaned description",
      "original_description": "exact text from statement",
      "amount": 123.45,
      "type": "expense|income",
      "category": "category name",
      "confidence": 0.95
    }}
  ]
}}"#,
        CATEGORIES.join(", ")
    )
}

pub fn user_prompt(statement_text: &str) -> String {
    let text = if statement_text.len() > MAX_PROMPT_CHARS {
        let mut end = MAX_PROMPT_CHARS;
        while !statement_text.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}\n\n[Document truncated due to length]",
            &statement_text[..end]
        )
    } else {
        statement_text.to_string()
    };

    format!(
        "Please extract all transactions from this bank statement.\n\n{}\n\nExtract every transaction you can find and return the JSON response.",
        text
    )
}

#[derive(Debug, Deserialize, Default)]
struct LlmStatementInfo {
    statement_start: Option<String>,
    statement_end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LlmRow {
    date: Option<String>,
    description: Option<String>,
    original_description: Option<String>,
    amount: Option<f64>,
    #[serde(rename = "type")]
    direction: Option<String>,
    category: Option<String>,
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LlmResponse {
    #[serde(default)]
    statement_info: LlmStatementInfo,
    #[serde(default)]
    transactions: Vec<LlmRow>,
}

/// Parses a model reply into provider rows.
pub fn parse_response(provider: &str, raw: &str) -> Result<ExtractedStatement, ProviderError> {
    // Fish out the first JSON object; models sometimes add surrounding prose.
    static JSON_BLOB: OnceLock<Regex> = OnceLock::new();
    let json_blob = JSON_BLOB
        .get_or_init(|| Regex::new(r"\{[\s\S]*\}").expect("static pattern"))
        .find(raw)
        .ok_or_else(|| ProviderError::Malformed {
            name: provider.to_string(),
            message: "no JSON object in response".to_string(),
        })?
        .as_str();

    let response: LlmResponse =
        serde_json::from_str(json_blob).map_err(|e| ProviderError::Malformed {
            name: provider.to_string(),
            message: format!("invalid JSON: {}", e),
        })?;

    let rows = response
        .transactions
        .into_iter()
        .map(|row| ExtractedRow {
            date: row.date.unwrap_or_default(),
            description: row.description.unwrap_or_else(|| "Unknown".to_string()),
            original_description: row.original_description,
            amount: row.amount.unwrap_or(0.0),
            direction: row.direction.unwrap_or_else(|| "expense".to_string()),
            category: row.category,
            confidence: row.confidence.unwrap_or(0.5),
        })
        .collect();

    Ok(ExtractedStatement {
        rows,
        statement_start: response.statement_info.statement_start,
        statement_end: response.statement_info.statement_end,
    })
}
