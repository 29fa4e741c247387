//! Stub collaborators with call counters

use async_trait::async_trait;
use shelfscan_id::clients::{
    CatalogLookup, CatalogProduct, ImageEmbedder, SearchHit, SignalExtractor, TextGenerator,
    VectorIndex, VectorMatch, WebSearch,
};
use shelfscan_id::types::{CollaboratorError, VisionSignals};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

/// OCR stub returning fixed signals or a fixed error
pub struct StubExtractor {
    result: Result<VisionSignals, CollaboratorError>,
    calls: AtomicUsize,
}

impl StubExtractor {
    pub fn returning(signals: VisionSignals) -> Self {
        Self {
            result: Ok(signals),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(err: CollaboratorError) -> Self {
        Self {
            result: Err(err),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalExtractor for StubExtractor {
    async fn extract(&self, _image: &[u8]) -> Result<VisionSignals, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Catalog stub keyed by code
#[derive(Default)]
pub struct StubCatalog {
    products: HashMap<String, CatalogProduct>,
    error: Option<CollaboratorError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, code: &str, product: CatalogProduct) -> Self {
        self.products.insert(code.to_string(), product);
        self
    }

    pub fn with_error(mut self, err: CollaboratorError) -> Self {
        self.error = Some(err);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogLookup for StubCatalog {
    async fn lookup(&self, code: &str) -> Result<Option<CatalogProduct>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        pause(self.delay).await;
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Ok(self.products.get(code).cloned())
    }
}

/// Text generator stub
///
/// Answers code-recovery prompts (web search snippets) with `code_answer`
/// and every other prompt with `inference_answer`.
pub struct StubGenerator {
    inference_answer: Result<String, CollaboratorError>,
    code_answer: String,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: std::sync::Mutex<Vec<String>>,
}

impl StubGenerator {
    pub fn answering(inference_answer: &str) -> Self {
        Self {
            inference_answer: Ok(inference_answer.to_string()),
            code_answer: r#"{"code": null}"#.to_string(),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: CollaboratorError) -> Self {
        Self {
            inference_answer: Err(err),
            ..Self::answering("")
        }
    }

    pub fn with_code_answer(mut self, answer: &str) -> Self {
        self.code_answer = answer.to_string();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        pause(self.delay).await;
        if prompt.starts_with("Below are web search results") {
            return Ok(self.code_answer.clone());
        }
        self.inference_answer.clone()
    }
}

/// Web search stub returning fixed hits
#[derive(Default)]
pub struct StubSearch {
    hits: Vec<SearchHit>,
    calls: AtomicUsize,
    queries: std::sync::Mutex<Vec<String>>,
}

impl StubSearch {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSearch for StubSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
}

/// Embedder stub returning a constant vector
#[derive(Default)]
pub struct StubEmbedder {
    calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageEmbedder for StubEmbedder {
    async fn embed(&self, _image: &[u8]) -> Result<Vec<f32>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0.1, 0.2, 0.3])
    }
}

/// Vector index stub returning one fixed neighbor
pub struct StubVectorIndex {
    neighbor: Option<VectorMatch>,
    calls: AtomicUsize,
}

impl StubVectorIndex {
    pub fn matching(external_id: i64, similarity: f64) -> Self {
        Self {
            neighbor: Some(VectorMatch {
                external_id: external_id.to_string(),
                similarity,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for StubVectorIndex {
    async fn nearest(&self, _embedding: &[f32]) -> Result<Option<VectorMatch>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.neighbor.clone())
    }
}
