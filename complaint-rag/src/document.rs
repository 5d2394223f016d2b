//! Data types for complaint records, chunks, and search results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open key-value metadata attached to records and chunks.
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata key holding the complaint identifier.
pub const ID_FIELD: &str = "complaint_id";
/// Metadata key holding the product category.
pub const PRODUCT_FIELD: &str = "product";
/// Metadata key holding the narrative text.
pub const NARRATIVE_FIELD: &str = "narrative";
/// Metadata key holding the date the complaint was received.
pub const DATE_FIELD: &str = "date";

/// One source complaint.
///
/// Column names from the public complaint export (`consumer_complaint_narrative`,
/// `date_received`, `Complaint ID`) are accepted as aliases. Any column that is
/// not one of the named fields lands in `extra` and travels with every chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Unique complaint identifier.
    #[serde(rename = "complaint_id", alias = "Complaint ID", deserialize_with = "id_string")]
    pub id: String,
    /// Product category (e.g. "Credit card").
    #[serde(default, alias = "Product")]
    pub product: String,
    /// Free-text narrative. Missing or blank narratives are skipped at ingestion.
    #[serde(
        default,
        alias = "consumer_complaint_narrative",
        alias = "Consumer complaint narrative"
    )]
    pub narrative: Option<String>,
    /// Date the complaint was received.
    #[serde(default, alias = "date_received", alias = "Date received")]
    pub date: Option<String>,
    /// Any additional columns (issue, state, company, ...).
    #[serde(flatten)]
    pub extra: Metadata,
}

impl Record {
    /// Create a record with the required fields and no extra metadata.
    pub fn new(
        id: impl Into<String>,
        product: impl Into<String>,
        narrative: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            product: product.into(),
            narrative: Some(narrative.into()),
            date: None,
            extra: Metadata::new(),
        }
    }

    /// Attach an extra metadata field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Set the received date.
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// The narrative text if present and not blank.
    pub fn narrative_text(&self) -> Option<&str> {
        self.narrative.as_deref().filter(|n| !n.trim().is_empty())
    }

    /// Flatten every field of the record into a metadata map.
    pub fn to_metadata(&self) -> Metadata {
        let mut metadata = self.extra.clone();
        metadata.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));
        metadata.insert(PRODUCT_FIELD.to_string(), Value::String(self.product.clone()));
        if let Some(narrative) = &self.narrative {
            metadata.insert(NARRATIVE_FIELD.to_string(), Value::String(narrative.clone()));
        }
        if let Some(date) = &self.date {
            metadata.insert(DATE_FIELD.to_string(), Value::String(date.clone()));
        }
        metadata
    }
}

/// Accept numeric or string identifiers; exports store them as integers.
fn id_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid complaint id: {other}"))),
    }
}

/// A bounded piece of a [`Record`]'s narrative, the unit that gets indexed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The chunk text.
    pub text: String,
    /// The originating record's fields, owned by this chunk.
    pub metadata: Metadata,
}

/// A stored chunk paired with its similarity to a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
    /// The chunk text.
    pub text: String,
    /// The chunk metadata.
    pub metadata: Metadata,
}

impl SearchResult {
    /// Render a metadata field for display, without JSON quoting for strings.
    pub fn field(&self, key: &str) -> Option<String> {
        self.metadata.get(key).and_then(|value| match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
    }
}

/// The answer to one question plus the excerpts it was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QaResult {
    /// The question as asked.
    pub question: String,
    /// The generated answer, or a failure notice if generation failed.
    pub answer: String,
    /// Retrieved sources in descending score order.
    pub sources: Vec<SearchResult>,
}
