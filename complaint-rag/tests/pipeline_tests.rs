//! End-to-end tests for ingestion, retrieval, answering, and evaluation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use complaint_rag::document::{Metadata, Record, SearchResult};
use complaint_rag::embedding::{Embedder, EmbeddingProvider};
use complaint_rag::generation::{GenerationConfig, Generator};
use complaint_rag::hashing::HashingEmbeddingProvider;
use complaint_rag::inmemory::FlatIndex;
use complaint_rag::vectorindex::VectorIndex;
use complaint_rag::{
    EVAL_QUESTIONS, EvaluationRow, FAILURE_ANSWER_PREFIX, IngestionPipeline, QaPipeline,
    RagError, RecursiveChunker, Result, Retriever, evaluate, render_markdown,
};
use serde_json::{Value, json};

const OVERDRAFT: &str = "Overdraft fees are charged without warning.";
const MORTGAGE: &str = "Mortgage application was delayed for months.";
const QUESTION: &str = "Why was I charged unexpectedly for overdraft?";

/// Returns a fixed response and remembers the last prompt.
struct StaticGenerator {
    response: Value,
    last_prompt: Mutex<Option<String>>,
}

impl StaticGenerator {
    fn new(response: Value) -> Self {
        Self { response, last_prompt: Mutex::new(None) }
    }
}

#[async_trait]
impl Generator for StaticGenerator {
    fn name(&self) -> &str {
        "static"
    }

    async fn generate(&self, prompt: &str, _config: &GenerationConfig) -> Result<Value> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        Ok(self.response.clone())
    }
}

struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _prompt: &str, _config: &GenerationConfig) -> Result<Value> {
        Err(RagError::GenerationError {
            provider: "failing".into(),
            message: "API returned 503 Service Unavailable".into(),
            retryable: true,
        })
    }
}

struct SlowGenerator;

#[async_trait]
impl Generator for SlowGenerator {
    fn name(&self) -> &str {
        "slow"
    }

    async fn generate(&self, _prompt: &str, _config: &GenerationConfig) -> Result<Value> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(json!("too late"))
    }
}

/// Counts embedding calls on top of the hashing provider.
#[derive(Default)]
struct CountingProvider {
    inner: HashingEmbeddingProvider,
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for CountingProvider {
    fn name(&self) -> &str {
        "Counting"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

fn embedder(provider: Arc<dyn EmbeddingProvider>) -> Embedder {
    Embedder::new(provider, 32).unwrap()
}

fn corpus() -> Vec<Record> {
    vec![Record::new("1", "Checking account", OVERDRAFT), Record::new("2", "Mortgage", MORTGAGE)]
}

async fn ingest(
    records: &[Record],
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
) -> Arc<FlatIndex> {
    let index = Arc::new(FlatIndex::new(provider.dimensions()).unwrap());
    IngestionPipeline::builder()
        .chunker(Arc::new(RecursiveChunker::new(500, 50).unwrap()))
        .embedder(embedder(provider))
        .index(index.clone())
        .batch_size(batch_size)
        .build()
        .unwrap()
        .run(records)
        .await
        .unwrap();
    index
}

async fn qa_pipeline(generator: Arc<dyn Generator>) -> QaPipeline {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::default());
    let index = ingest(&corpus(), provider.clone(), 1000).await;
    QaPipeline::builder()
        .retriever(Retriever::new(embedder(provider), index, 2).unwrap())
        .generator(generator)
        .build()
        .unwrap()
}

fn result(id: Option<&str>, text: &str) -> SearchResult {
    let mut metadata = Metadata::new();
    if let Some(id) = id {
        metadata.insert("complaint_id".into(), json!(id));
    }
    SearchResult { score: 0.5, text: text.to_string(), metadata }
}

// ── Retrieval ──────────────────────────────────────────────────────

#[tokio::test]
async fn overdraft_question_ranks_overdraft_chunk_first() {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::default());
    let index = ingest(&corpus(), provider.clone(), 1000).await;
    let retriever = Retriever::new(embedder(provider), index, 5).unwrap();

    let results = retriever.retrieve(QUESTION, 2).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].field("complaint_id").as_deref(), Some("1"));
    assert_eq!(results[0].text, OVERDRAFT);
    assert_eq!(results[1].field("complaint_id").as_deref(), Some("2"));
    assert!(results[0].score > results[1].score);
}

#[tokio::test]
async fn retrieval_from_empty_index_is_empty_not_an_error() {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::default());
    let index = Arc::new(FlatIndex::new(provider.dimensions()).unwrap());
    let retriever = Retriever::new(embedder(provider), index, 5).unwrap();

    let results = retriever.retrieve(QUESTION, 5).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(retriever.format_context(&results), "");
}

#[tokio::test]
async fn blank_question_is_rejected_before_embedding() {
    let provider = Arc::new(CountingProvider::default());
    let index = Arc::new(FlatIndex::new(provider.dimensions()).unwrap());
    let retriever = Retriever::new(embedder(provider.clone()), index, 5).unwrap();
    let pipeline = QaPipeline::builder()
        .retriever(retriever.clone())
        .generator(Arc::new(StaticGenerator::new(json!("unused"))))
        .build()
        .unwrap();

    assert!(matches!(retriever.retrieve("   ", 3).await, Err(RagError::InvalidInput(_))));
    assert!(matches!(pipeline.answer("\n\t").await, Err(RagError::InvalidInput(_))));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn retriever_rejects_mismatched_dimensions_and_zero_k() {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::default());
    let index: Arc<dyn VectorIndex> = Arc::new(FlatIndex::new(8).unwrap());
    assert!(matches!(
        Retriever::new(embedder(provider.clone()), index, 5),
        Err(RagError::ConfigError(_))
    ));

    let index: Arc<dyn VectorIndex> = Arc::new(FlatIndex::new(384).unwrap());
    assert!(matches!(Retriever::new(embedder(provider), index, 0), Err(RagError::ConfigError(_))));
}

// ── Context formatting ─────────────────────────────────────────────

#[test]
fn context_blocks_follow_input_order() {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::default());
    let index = Arc::new(FlatIndex::new(384).unwrap());
    let retriever = Retriever::new(embedder(provider), index, 5).unwrap();

    let sources = [result(Some("1"), OVERDRAFT), result(Some("2"), MORTGAGE)];
    let context = retriever.format_context(&sources);
    assert_eq!(context, format!("Source 1: 1\n{OVERDRAFT}\n\nSource 2: 2\n{MORTGAGE}"));

    assert_eq!(retriever.format_context(&[]), "");
    assert_eq!(retriever.format_context(&[result(None, "text")]), "Source 1: unknown\ntext");
}

#[test]
fn context_can_use_another_id_field() {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::default());
    let index = Arc::new(FlatIndex::new(384).unwrap());
    let retriever = Retriever::new(embedder(provider), index, 5).unwrap().with_id_field("case");

    let mut source = result(Some("1"), "text");
    source.metadata.insert("case".into(), json!(77));
    assert_eq!(retriever.format_context(&[source]), "Source 1: 77\ntext");
}

// ── Answering ──────────────────────────────────────────────────────

#[tokio::test]
async fn all_response_shapes_yield_the_same_answer() {
    let shapes =
        [json!("text"), json!([{ "generated_text": "text" }]), json!({ "generated_text": "text" })];
    for shape in shapes {
        let pipeline = qa_pipeline(Arc::new(StaticGenerator::new(shape.clone()))).await;
        let answer = pipeline.answer(QUESTION).await.unwrap();
        assert_eq!(answer.answer, "text", "shape {shape}");
    }
}

#[tokio::test]
async fn echoed_prompt_is_stripped_from_answer() {
    let echoed = json!([{
        "generated_text": "Context: ...\nQuestion: q\nAnswer: Fees were not disclosed."
    }]);
    let pipeline = qa_pipeline(Arc::new(StaticGenerator::new(echoed))).await;
    assert_eq!(pipeline.answer(QUESTION).await.unwrap().answer, "Fees were not disclosed.");
}

#[tokio::test]
async fn unexpected_response_shape_becomes_its_json_text() {
    let pipeline = qa_pipeline(Arc::new(StaticGenerator::new(json!(42)))).await;
    assert_eq!(pipeline.answer(QUESTION).await.unwrap().answer, "42");

    let pipeline = qa_pipeline(Arc::new(StaticGenerator::new(json!({ "label": "x" })))).await;
    assert_eq!(pipeline.answer(QUESTION).await.unwrap().answer, r#"{"label":"x"}"#);
}

#[tokio::test]
async fn prompt_carries_context_and_question() {
    let generator = Arc::new(StaticGenerator::new(json!("ok")));
    let pipeline = qa_pipeline(generator.clone()).await;
    let answer = pipeline.answer(QUESTION).await.unwrap();

    let prompt = generator.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.starts_with(complaint_rag::INSTRUCTIONS));
    assert!(prompt.contains(&format!("Context:\nSource 1: 1\n{OVERDRAFT}")));
    assert!(prompt.ends_with(&format!("Question: {QUESTION}\nAnswer:")));
    assert_eq!(answer.question, QUESTION);
    assert_eq!(answer.sources.len(), 2);
}

#[tokio::test]
async fn generation_failure_becomes_failure_answer_with_sources() {
    let pipeline = qa_pipeline(Arc::new(FailingGenerator)).await;
    let answer = pipeline.answer(QUESTION).await.unwrap();

    assert!(answer.answer.starts_with(FAILURE_ANSWER_PREFIX), "got {}", answer.answer);
    assert!(answer.answer.contains("503"));
    assert_eq!(answer.sources.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_generation_times_out_into_failure_answer() {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::default());
    let index = ingest(&corpus(), provider.clone(), 1000).await;
    let pipeline = QaPipeline::builder()
        .retriever(Retriever::new(embedder(provider), index, 1).unwrap())
        .generator(Arc::new(SlowGenerator))
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let answer = pipeline.answer(QUESTION).await.unwrap();
    assert!(answer.answer.starts_with(FAILURE_ANSWER_PREFIX));
    assert_eq!(answer.sources.len(), 1);
}

#[test]
fn builders_require_their_components() {
    assert!(matches!(QaPipeline::builder().build(), Err(RagError::ConfigError(_))));
    assert!(matches!(IngestionPipeline::builder().build(), Err(RagError::ConfigError(_))));
}

// ── Ingestion ──────────────────────────────────────────────────────

#[tokio::test]
async fn records_without_narrative_are_skipped() {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::default());
    let index = Arc::new(FlatIndex::new(384).unwrap());
    let mut missing = Record::new("3", "Credit card", "");
    missing.narrative = None;
    let records = vec![
        Record::new("1", "Credit card", OVERDRAFT),
        Record::new("2", "Credit card", "   "),
        missing,
    ];

    let report = IngestionPipeline::builder()
        .chunker(Arc::new(RecursiveChunker::new(500, 50).unwrap()))
        .embedder(embedder(provider))
        .index(index.clone())
        .batch_size(2)
        .build()
        .unwrap()
        .run(&records)
        .await
        .unwrap();

    assert_eq!((report.records, report.skipped, report.chunks, report.batches), (1, 2, 1, 2));
    assert_eq!(index.len().await, 1);
}

#[tokio::test]
async fn index_contents_do_not_depend_on_batch_size() {
    let records: Vec<Record> = (0..25)
        .map(|i| {
            let charges = "late payment charge ".repeat(i % 4 + 1);
            let narrative = format!("Complaint {i} about fee number {i}.\n\n{charges}");
            Record::new(i.to_string(), "Credit card", narrative)
        })
        .collect();
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::default());

    let one_at_a_time = ingest(&records, provider.clone(), 1).await;
    let all_at_once = ingest(&records, provider, 1000).await;

    let size = all_at_once.len().await;
    assert_eq!(one_at_a_time.len().await, size);
    for position in 0..size {
        assert_eq!(one_at_a_time.get(position).await, all_at_once.get(position).await);
    }
}

#[tokio::test]
async fn cleaning_skips_narratives_that_clean_to_nothing() {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::default());
    let index = Arc::new(FlatIndex::new(384).unwrap());
    let records = vec![
        Record::new("1", "Credit card", "Dear Sir, I need help."),
        Record::new("2", "Credit card", "My CARD was charged $35!!"),
    ];

    let report = IngestionPipeline::builder()
        .chunker(Arc::new(RecursiveChunker::new(500, 50).unwrap()))
        .embedder(embedder(provider))
        .index(index.clone())
        .cleaning(true)
        .build()
        .unwrap()
        .run(&records)
        .await
        .unwrap();

    assert_eq!((report.records, report.skipped), (1, 1));
    let (_, chunk) = index.get(0).await.unwrap();
    assert_eq!(chunk.text, "my card was charged 35");
    assert_eq!(chunk.metadata["narrative"], json!("My CARD was charged $35!!"));
}

#[test]
fn zero_ingest_batch_size_is_rejected() {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::default());
    let result = IngestionPipeline::builder()
        .chunker(Arc::new(RecursiveChunker::new(500, 50).unwrap()))
        .embedder(embedder(provider))
        .index(Arc::new(FlatIndex::new(384).unwrap()))
        .batch_size(0)
        .build();
    assert!(matches!(result, Err(RagError::ConfigError(_))));
}

// ── Evaluation ─────────────────────────────────────────────────────

#[tokio::test]
async fn evaluation_runs_every_question() {
    let pipeline = qa_pipeline(Arc::new(StaticGenerator::new(json!("An answer.")))).await;
    let rows = evaluate(&pipeline, &EVAL_QUESTIONS).await.unwrap();

    assert_eq!(rows.len(), EVAL_QUESTIONS.len());
    for (row, question) in rows.iter().zip(EVAL_QUESTIONS) {
        assert_eq!(row.question, question);
        assert_eq!(row.answer, "An answer.");
        assert!(row.top_source.is_some());
    }
}

#[test]
fn markdown_table_truncates_answers_and_snippets() {
    let rows = vec![
        EvaluationRow {
            question: "Q1?".into(),
            answer: "a".repeat(300),
            top_source: Some(format!("line one\nline two {}", "b".repeat(200))),
        },
        EvaluationRow { question: "Q2?".into(), answer: "short".into(), top_source: None },
    ];

    let table = render_markdown(&rows);
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[0],
        "| Question | Generated Answer | Top Source Snippet | Score (1-5) | Comments |"
    );
    assert_eq!(lines[1], "| --- | --- | --- | --- | --- |");

    let snippet = format!("line one line two {}", "b".repeat(102));
    assert_eq!(lines[2], format!("| Q1? | {}… | {snippet} … |  |  |", "a".repeat(240)));
    assert_eq!(lines[3], "| Q2? | short | - |  |  |");
}
