//! Configuration loading and record deserialization.

use std::io::Write;
use std::time::Duration;

use complaint_rag::document::{Record, SearchResult};
use complaint_rag::{RagConfig, RagError};
use serde_json::json;

#[test]
fn defaults_match_documented_values() {
    let config = RagConfig::default();
    assert_eq!((config.chunk_size, config.chunk_overlap, config.top_k), (500, 50, 5));
    assert_eq!((config.embedding_batch_size, config.ingest_batch_size), (32, 1000));
    assert_eq!(config.embedding_model, "sentence-transformers/all-MiniLM-L6-v2");
    assert_eq!(config.id_field, "complaint_id");
    assert_eq!(config.generation_timeout(), Duration::from_secs(60));
    assert_eq!(config.embedding_timeout(), Duration::from_secs(30));
    assert!(config.validate().is_ok());
}

#[test]
fn builder_rejects_inconsistent_values() {
    assert!(matches!(
        RagConfig::builder().chunk_size(100).chunk_overlap(100).build(),
        Err(RagError::ConfigError(_))
    ));
    assert!(matches!(RagConfig::builder().top_k(0).build(), Err(RagError::ConfigError(_))));
    assert!(matches!(
        RagConfig::builder().ingest_batch_size(0).build(),
        Err(RagError::ConfigError(_))
    ));
    assert!(matches!(
        RagConfig::builder().generation_timeout_secs(0).build(),
        Err(RagError::ConfigError(_))
    ));
    assert!(matches!(
        RagConfig::builder().embedding_timeout_secs(0).build(),
        Err(RagError::ConfigError(_))
    ));
    assert!(matches!(
        RagConfig::builder().embedding_model(" ").build(),
        Err(RagError::ConfigError(_))
    ));

    let config = RagConfig::builder()
        .chunk_size(300)
        .chunk_overlap(30)
        .top_k(3)
        .embedding_timeout_secs(5)
        .build()
        .unwrap();
    assert_eq!((config.chunk_size, config.chunk_overlap, config.top_k), (300, 30, 3));
    assert_eq!(config.embedding_timeout(), Duration::from_secs(5));
}

#[test]
fn json_file_fills_missing_fields_with_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"chunk_size": 256, "chunk_overlap": 32, "top_k": 3, "embedding_timeout_secs": 90}}"#
    )
    .unwrap();

    let config = RagConfig::from_json_file(file.path()).unwrap();
    assert_eq!((config.chunk_size, config.chunk_overlap, config.top_k), (256, 32, 3));
    assert_eq!(config.embedding_timeout_secs, 90);
    assert_eq!(config.embedding_batch_size, 32);
    assert_eq!(config.generation_model, "google/flan-t5-base");
}

#[test]
fn json_file_is_validated() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"chunk_size": 10, "chunk_overlap": 20}}"#).unwrap();
    assert!(matches!(RagConfig::from_json_file(file.path()), Err(RagError::ConfigError(_))));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();
    assert!(matches!(RagConfig::from_json_file(file.path()), Err(RagError::Serialization(_))));
}

#[test]
fn records_accept_export_column_names() {
    let record: Record = serde_json::from_value(json!({
        "Complaint ID": 3456789,
        "Product": "Credit card",
        "Consumer complaint narrative": "I was charged twice.",
        "Date received": "2023-01-15",
        "Issue": "Billing dispute",
    }))
    .unwrap();

    assert_eq!(record.id, "3456789");
    assert_eq!(record.product, "Credit card");
    assert_eq!(record.narrative_text(), Some("I was charged twice."));
    assert_eq!(record.date.as_deref(), Some("2023-01-15"));
    assert_eq!(record.extra["Issue"], json!("Billing dispute"));

    let metadata = record.to_metadata();
    assert_eq!(metadata["complaint_id"], json!("3456789"));
    assert_eq!(metadata["date"], json!("2023-01-15"));
    assert_eq!(metadata["Issue"], json!("Billing dispute"));
}

#[test]
fn records_without_narrative_deserialize() {
    let raw = r#"{"complaint_id": "7", "product": "Mortgage", "narrative": null}"#;
    let record: Record = serde_json::from_str(raw).unwrap();
    assert_eq!(record.narrative_text(), None);
}

#[test]
fn search_result_fields_render_without_quotes() {
    let result = SearchResult {
        score: 1.0,
        text: "t".into(),
        metadata: json!({ "complaint_id": "12", "state": null, "count": 3 })
            .as_object()
            .cloned()
            .unwrap(),
    };
    assert_eq!(result.field("complaint_id").as_deref(), Some("12"));
    assert_eq!(result.field("count").as_deref(), Some("3"));
    assert_eq!(result.field("state"), None);
    assert_eq!(result.field("missing"), None);
}
