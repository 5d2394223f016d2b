//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use complaint_rag::hashing::DEFAULT_HASHING_DIMENSIONS;
use complaint_rag::{
    DEFAULT_PRODUCTS, EVAL_QUESTIONS, Embedder, EmbeddingProvider, FlatIndex,
    HashingEmbeddingProvider, HuggingFaceEmbeddingProvider, HuggingFaceGenerator,
    IngestionPipeline, QaPipeline, RagConfig, Record, RecursiveChunker, Retriever, evaluate,
    render_markdown, retain_products,
};
use tracing::info;

use crate::cli::EmbedderKind;

pub fn load_config(path: Option<&Path>) -> Result<RagConfig> {
    match path {
        Some(path) => RagConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(RagConfig::default()),
    }
}

pub async fn ingest(
    config: &RagConfig,
    input: &Path,
    index_path: &Path,
    kind: EmbedderKind,
    clean: bool,
    all_products: bool,
) -> Result<()> {
    let mut records = load_records(input).await?;
    let loaded = records.len();
    if !all_products {
        records = retain_products(records, DEFAULT_PRODUCTS);
    }
    info!(loaded, kept = records.len(), path = %input.display(), "loaded records");

    let embedder = embedder(config, kind).await?;
    let index = Arc::new(FlatIndex::new(embedder.dimensions())?);
    let pipeline = IngestionPipeline::builder()
        .config(config)
        .chunker(Arc::new(RecursiveChunker::from_config(config)?))
        .embedder(embedder)
        .index(index.clone())
        .cleaning(clean)
        .build()?;

    let report = pipeline.run(&records).await?;
    index
        .save(index_path)
        .await
        .with_context(|| format!("failed to write {}", index_path.display()))?;

    println!(
        "Indexed {} chunks from {} records ({} skipped) into {}",
        report.chunks,
        report.records,
        report.skipped,
        index_path.display()
    );
    Ok(())
}

pub async fn ask(
    config: &RagConfig,
    index_path: &Path,
    kind: EmbedderKind,
    top_k: Option<usize>,
    question: &str,
) -> Result<()> {
    let pipeline = qa_pipeline(config, index_path, kind).await?;
    let k = top_k.unwrap_or(config.top_k);
    let result = pipeline.answer_with_k(question, k).await?;

    println!("{}\n", result.answer);
    for (i, source) in result.sources.iter().enumerate() {
        let id = source.field(&config.id_field).unwrap_or_else(|| "unknown".to_string());
        println!("[{}] {id} (score {:.3})\n{}\n", i + 1, source.score, source.text);
    }
    Ok(())
}

pub async fn eval(config: &RagConfig, index_path: &Path, kind: EmbedderKind) -> Result<()> {
    let pipeline = qa_pipeline(config, index_path, kind).await?;
    let rows = evaluate(&pipeline, &EVAL_QUESTIONS).await?;
    print!("{}", render_markdown(&rows));
    Ok(())
}

async fn qa_pipeline(
    config: &RagConfig,
    index_path: &Path,
    kind: EmbedderKind,
) -> Result<QaPipeline> {
    let index = FlatIndex::load(index_path)
        .await
        .with_context(|| format!("failed to load index from {}", index_path.display()))?;
    let retriever = Retriever::new(embedder(config, kind).await?, Arc::new(index), config.top_k)
        .context("index does not match the selected embedder")?
        .with_id_field(config.id_field.clone());
    let generator = HuggingFaceGenerator::from_env(config.generation_model.clone())?
        .verify()
        .await
        .with_context(|| format!("generation model {} is not usable", config.generation_model))?;

    Ok(QaPipeline::builder()
        .config(config)
        .retriever(retriever)
        .generator(Arc::new(generator))
        .build()?)
}

async fn embedder(config: &RagConfig, kind: EmbedderKind) -> Result<Embedder> {
    let provider: Arc<dyn EmbeddingProvider> = match kind {
        EmbedderKind::Hashing => {
            Arc::new(HashingEmbeddingProvider::new(DEFAULT_HASHING_DIMENSIONS)?)
        }
        EmbedderKind::HuggingFace => Arc::new(
            HuggingFaceEmbeddingProvider::from_env(config.embedding_model.clone())?
                .with_timeout(config.embedding_timeout())?
                .verify()
                .await
                .with_context(|| {
                    format!("embedding model {} is not usable", config.embedding_model)
                })?,
        ),
    };
    Ok(Embedder::new(provider, config.embedding_batch_size)?)
}

/// Read JSON Lines records, ignoring blank lines.
async fn load_records(path: &Path) -> Result<Vec<Record>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid record", path.display(), number + 1))
        })
        .collect()
}
