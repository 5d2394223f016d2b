//! Qualitative evaluation: run fixed questions and tabulate the answers.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pipeline::QaPipeline;

/// Questions covering the main product areas of the corpus.
pub const EVAL_QUESTIONS: [&str; 5] = [
    "What are the main issues customers have with credit card billing?",
    "How long do mortgage-related complaints usually take to resolve?",
    "Do consumers frequently report identity theft problems?",
    "Which states see the most loan servicing complaints?",
    "What are common sentiments about overdraft fees?",
];

const ANSWER_LIMIT: usize = 240;
const SNIPPET_LIMIT: usize = 120;
const HEADERS: [&str; 5] =
    ["Question", "Generated Answer", "Top Source Snippet", "Score (1-5)", "Comments"];

/// One evaluated question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRow {
    /// The question asked.
    pub question: String,
    /// The full answer.
    pub answer: String,
    /// Text of the best-scoring source, if anything was retrieved.
    pub top_source: Option<String>,
}

/// Answer every question through `pipeline`, in order.
///
/// # Errors
///
/// Propagates the first retrieval failure. Generation failures are already
/// folded into the answer text by [`QaPipeline::answer`].
pub async fn evaluate(pipeline: &QaPipeline, questions: &[&str]) -> Result<Vec<EvaluationRow>> {
    let mut rows = Vec::with_capacity(questions.len());
    for question in questions {
        let result = pipeline.answer(question).await?;
        rows.push(EvaluationRow {
            question: result.question,
            answer: result.answer,
            top_source: result.sources.into_iter().next().map(|source| source.text),
        });
    }
    Ok(rows)
}

/// Render rows as a GitHub-flavoured markdown table with empty score and
/// comment columns for a human reviewer.
pub fn render_markdown(rows: &[EvaluationRow]) -> String {
    let mut table = String::new();
    table.push_str(&format_row(&HEADERS.map(str::to_string)));
    table.push_str(&format_row(&HEADERS.map(|_| "---".to_string())));
    for row in rows {
        let snippet = match &row.top_source {
            Some(text) => format!("{} …", truncate(text, SNIPPET_LIMIT).replace('\n', " ")),
            None => "-".to_string(),
        };
        let answer = if row.answer.chars().count() > ANSWER_LIMIT {
            format!("{}…", truncate(&row.answer, ANSWER_LIMIT))
        } else {
            row.answer.clone()
        };
        table.push_str(&format_row(&[
            row.question.clone(),
            answer,
            snippet,
            String::new(),
            String::new(),
        ]));
    }
    table
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn format_row(cells: &[String]) -> String {
    let cells: Vec<String> =
        cells.iter().map(|cell| cell.replace('|', "\\|").replace('\n', " ")).collect();
    format!("| {} |\n", cells.join(" | "))
}
