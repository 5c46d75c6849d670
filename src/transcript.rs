//! Conversation transcript for the chat front-end.
//!
//! Keeps a bounded history of question/answer exchanges and turns raw agent
//! replies into something displayable.

use std::collections::VecDeque;

use crate::engine::{render_table, ColumnInfo, QueryResult, Value};

/// Shown when the agent reply cannot be used at all.
pub const APOLOGY: &str = "Apologies, but an error occurred. Please try again.";

/// Shown when the user ends the session.
pub const FAREWELL: &str = "Thank you for using the query desk!";

/// Default number of exchanges kept.
pub const DEFAULT_MAX_EXCHANGES: usize = 20;

/// A displayable answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// Free-form text.
    Text(String),
    /// Tabular rows.
    Table(QueryResult),
}

impl Answer {
    /// Renders the answer for a terminal.
    pub fn render(&self) -> String {
        match self {
            Answer::Text(text) => text.clone(),
            Answer::Table(result) if result.columns.is_empty() => "(no rows)".to_string(),
            Answer::Table(result) => {
                let mut out = result.to_table_string();
                out.push_str(&format!("\n({} row{})", result.row_count, plural(result.row_count)));
                out
            }
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Parses an agent reply: a JSON array becomes a table, anything else stays text.
pub fn format_response(reply: &str) -> Answer {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Answer::Text(APOLOGY.to_string());
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Array(items)) => Answer::Table(records_to_result(&items)),
        _ => Answer::Text(reply.to_string()),
    }
}

/// Builds a result from JSON items; object keys become columns in first-seen order.
fn records_to_result(items: &[serde_json::Value]) -> QueryResult {
    let mut names: Vec<String> = Vec::new();
    for item in items {
        match item {
            serde_json::Value::Object(map) => {
                for key in map.keys() {
                    if !names.contains(key) {
                        names.push(key.clone());
                    }
                }
            }
            _ => {
                if !names.iter().any(|n| n == "value") {
                    names.push("value".to_string());
                }
            }
        }
    }

    let rows = items
        .iter()
        .map(|item| match item {
            serde_json::Value::Object(map) => names
                .iter()
                .map(|name| map.get(name).map(Value::from_json).unwrap_or(Value::Null))
                .collect(),
            scalar => names
                .iter()
                .map(|name| {
                    if name == "value" {
                        Value::from_json(scalar)
                    } else {
                        Value::Null
                    }
                })
                .collect(),
        })
        .collect();

    let columns = names.into_iter().map(|n| ColumnInfo::new(n, "json")).collect();
    QueryResult::with_data(columns, rows)
}

/// One question and its answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub question: String,
    pub answer: Answer,
}

/// Bounded conversation history.
#[derive(Debug, Clone)]
pub struct Transcript {
    exchanges: VecDeque<Exchange>,
    max_exchanges: usize,
}

impl Transcript {
    /// Creates an empty transcript with the default limit.
    pub fn new() -> Self {
        Self::with_max_exchanges(DEFAULT_MAX_EXCHANGES)
    }

    /// Creates an empty transcript keeping at most `max_exchanges` entries.
    pub fn with_max_exchanges(max_exchanges: usize) -> Self {
        Self {
            exchanges: VecDeque::new(),
            max_exchanges: max_exchanges.max(1),
        }
    }

    /// Records an exchange, dropping the oldest beyond the limit.
    pub fn add(&mut self, question: impl Into<String>, answer: Answer) {
        self.exchanges.push_back(Exchange {
            question: question.into(),
            answer,
        });
        while self.exchanges.len() > self.max_exchanges {
            self.exchanges.pop_front();
        }
    }

    /// Iterates newest exchange first.
    pub fn latest_first(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter().rev()
    }

    /// Clears the history and returns the farewell line.
    pub fn end_session(&mut self) -> &'static str {
        self.exchanges.clear();
        FAREWELL
    }

    /// Returns the number of exchanges.
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    /// Returns true if there are no exchanges.
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Renders the history newest first.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return "No conversation yet.".to_string();
        }
        self.latest_first()
            .map(|ex| format!("Q: {}\nA: {}", ex.question, ex.answer.render()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders a list of strings as a one-column table.
pub fn render_list(title: &str, items: &[&str]) -> String {
    let rows: Vec<Vec<String>> = items.iter().map(|s| vec![s.to_string()]).collect();
    render_table(&[title.to_string()], &rows)
}
