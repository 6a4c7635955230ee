//! Question answering handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::AppState;
use prism_common::{
    errors::Result,
    metrics, RetrievalResult, RetrievedContext,
};

/// Characters of text content echoed back per source
const SNIPPET_CHARS: usize = 200;

/// Query request
///
/// Any string is accepted, including blank or very long ones.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// A piece of evidence the answer was grounded on
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Source {
    /// Filename of the originating document
    pub document_id: String,
    pub page_number: u32,
    /// `text` or `image`
    pub content_type: String,
    /// Leading text for text sources, image path for image sources
    pub snippet: String,
}

/// Query response
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
}

/// Answer a question from the indexed documents
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let start = Instant::now();

    let result = answer(&state, &request.query).await;
    let latency = start.elapsed();
    metrics::record_query(latency.as_secs_f64(), result.is_ok());

    let response = result?;
    tracing::info!(
        query_len = request.query.len(),
        sources = response.sources.len(),
        latency_ms = latency.as_millis() as u64,
        "Query completed"
    );

    Ok(Json(response))
}

async fn answer(state: &AppState, query: &str) -> Result<QueryResponse> {
    let context = state
        .retriever
        .retrieve(query, state.config.retrieval.top_k)
        .await?;
    metrics::record_retrieval(context.text_chunks.len(), context.images.len());

    let answer = state.generator.generate_answer(query, &context).await?;

    Ok(QueryResponse {
        answer,
        sources: sources(&context),
    })
}

/// Flatten retrieved context into sources, text before images
pub fn sources(context: &RetrievedContext) -> Vec<Source> {
    let text = context.text_chunks.iter().map(|item| Source {
        document_id: item.metadata.filename.clone(),
        page_number: item.metadata.page_number,
        content_type: "text".to_string(),
        snippet: snippet(&item.content),
    });

    let images = context.images.iter().map(|item: &RetrievalResult| Source {
        document_id: item.metadata.filename.clone(),
        page_number: item.metadata.page_number,
        content_type: "image".to_string(),
        snippet: item
            .metadata
            .image_path
            .clone()
            .unwrap_or_else(|| item.metadata.source.clone()),
    });

    text.chain(images).collect()
}

/// First `SNIPPET_CHARS` characters, with `...` only when something was cut
fn snippet(content: &str) -> String {
    match content.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}
