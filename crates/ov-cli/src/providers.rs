//! HTTP-backed collaborators for the ingestion and retrieval pipelines:
//! dense/sparse embedders, a VLM summarizer, a query embedder, and a
//! reranker, each a thin `reqwest` client against a configured endpoint.
//!
//! None of these retry internally — `EmbeddingPipeline` and
//! `SemanticProcessor` already wrap their calls with backoff, so a second
//! layer here would just double it.

use std::collections::HashMap;

use async_trait::async_trait;
use ov_core::error::{OvError, Result};
use serde::{Deserialize, Serialize};

fn client_for(endpoint: &str) -> Result<(reqwest::Client, &str)> {
    if endpoint.is_empty() {
        return Err(OvError::InvalidInput("no endpoint configured for this provider".into()));
    }
    Ok((reqwest::Client::new(), endpoint))
}

fn map_transport_err(e: reqwest::Error) -> OvError {
    if e.is_timeout() || e.is_connect() {
        OvError::TransientBackend(e.to_string())
    } else {
        OvError::FatalBackend(e.to_string())
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct DenseEmbedResponse {
    vectors: Vec<Vec<f32>>,
}

pub struct HttpDenseEmbedder {
    endpoint: String,
}

impl HttpDenseEmbedder {
    pub fn new(endpoint: String) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl ov_ingest::DenseEmbedder for HttpDenseEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (client, endpoint) = client_for(&self.endpoint)?;
        let resp = client
            .post(endpoint)
            .json(&EmbedRequest { texts })
            .send()
            .await
            .map_err(map_transport_err)?;
        if !resp.status().is_success() {
            return Err(OvError::TransientBackend(format!("dense embedder returned {}", resp.status())));
        }
        let body: DenseEmbedResponse = resp.json().await.map_err(map_transport_err)?;
        Ok(body.vectors)
    }
}

#[derive(Deserialize)]
struct SparseEmbedResponse {
    vectors: Vec<HashMap<String, f32>>,
}

pub struct HttpSparseEmbedder {
    endpoint: String,
}

impl HttpSparseEmbedder {
    pub fn new(endpoint: String) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl ov_ingest::SparseEmbedder for HttpSparseEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<HashMap<String, f32>>> {
        let (client, endpoint) = client_for(&self.endpoint)?;
        let resp = client
            .post(endpoint)
            .json(&EmbedRequest { texts })
            .send()
            .await
            .map_err(map_transport_err)?;
        if !resp.status().is_success() {
            return Err(OvError::TransientBackend(format!("sparse embedder returned {}", resp.status())));
        }
        let body: SparseEmbedResponse = resp.json().await.map_err(map_transport_err)?;
        Ok(body.vectors)
    }
}

#[derive(Serialize)]
struct SummarizeRequest<'a> {
    name: &'a str,
    sections: &'a [String],
}

#[derive(Deserialize)]
struct SummarizeResponse {
    summary: String,
}

pub struct HttpVlm {
    endpoint: String,
}

impl HttpVlm {
    pub fn new(endpoint: String) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl ov_ingest::Vlm for HttpVlm {
    async fn summarize(&self, name: &str, sections: &[String]) -> Result<String> {
        let (client, endpoint) = client_for(&self.endpoint)?;
        let resp = client
            .post(endpoint)
            .json(&SummarizeRequest { name, sections })
            .send()
            .await
            .map_err(map_transport_err)?;
        if !resp.status().is_success() {
            return Err(OvError::TransientBackend(format!("vlm returned {}", resp.status())));
        }
        let body: SummarizeResponse = resp.json().await.map_err(map_transport_err)?;
        Ok(body.summary)
    }
}

pub struct HttpQueryEmbedder {
    endpoint: String,
}

impl HttpQueryEmbedder {
    pub fn new(endpoint: String) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl ov_retrieval::QueryEmbedder for HttpQueryEmbedder {
    async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let (client, endpoint) = client_for(&self.endpoint).map_err(anyhow::Error::from)?;
        let resp = client
            .post(endpoint)
            .json(&EmbedRequest { texts: std::slice::from_ref(&text.to_string()) })
            .send()
            .await?;
        let mut body: DenseEmbedResponse = resp.json().await?;
        body.vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("query embedder returned no vector"))
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    docs: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponse {
    scores: Vec<f32>,
}

pub struct HttpReranker {
    endpoint: String,
}

impl HttpReranker {
    pub fn new(endpoint: String) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl ov_retrieval::Reranker for HttpReranker {
    async fn rerank(&self, query: &str, docs: &[String]) -> anyhow::Result<Vec<f32>> {
        let (client, endpoint) = client_for(&self.endpoint).map_err(anyhow::Error::from)?;
        let resp = client
            .post(endpoint)
            .json(&RerankRequest { query, docs })
            .send()
            .await?;
        let body: RerankResponse = resp.json().await?;
        Ok(body.scores)
    }
}

/// An `Llm` that proposes exactly one query per context type keyed on
/// cheap overlap with the raw text, used until a real intent-analysis
/// backend is configured. `ov-core::config` names no intent-analyzer
/// endpoint yet, so this stands in rather than adding an unconfigured
/// HTTP call nothing can reach.
pub struct HeuristicLlm;

#[async_trait]
impl ov_retrieval::Llm for HeuristicLlm {
    async fn propose_queries(
        &self,
        _session_summary: &str,
        _recent_messages: &[String],
        query: &str,
    ) -> anyhow::Result<Vec<(String, String, String, u8)>> {
        Ok(vec![(query.to_string(), "resource".to_string(), "search".to_string(), 3)])
    }
}
