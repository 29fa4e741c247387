//! Core Types for the Identification Cascade
//!
//! - **VisionSignals:** what the OCR collaborator read off the package (input)
//! - **StrategyOutcome:** one strategy's normalized answer (ephemeral, per request)
//! - **ProductRecord:** the finished, confidence-scored record (output)
//! - **ProcessingOutcome:** per-request telemetry handed to persistence
//!
//! Every strategy speaks `StrategyOutcome`, so fusion and the sufficiency gate
//! never look at collaborator-specific payloads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Trust score (0.0-1.0)
pub type Confidence = f64;

/// Vertical-specific attributes (e.g., "size": "M", "net_content": "500g")
pub type AttributeMap = BTreeMap<String, serde_json::Value>;

/// Tax/identification codes keyed by scheme ("ncm", "cest")
pub type TaxCodes = BTreeMap<String, String>;

// ============================================================================
// Input
// ============================================================================

/// Raw signals extracted once per image by the OCR collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisionSignals {
    /// Full OCR text
    #[serde(default)]
    pub raw_text: String,
    /// Brand logos recognized in the image
    #[serde(default)]
    pub detected_logos: Vec<String>,
    /// Generic image labels ("Bottle", "T-shirt", ...)
    #[serde(default)]
    pub detected_labels: Vec<String>,
    /// Numeric code read off the package, not yet validated
    #[serde(default)]
    pub candidate_code: Option<String>,
    /// Price printed on the package or shelf tag
    #[serde(default)]
    pub candidate_price: Option<f64>,
}

impl VisionSignals {
    /// True when there is nothing at all to identify from
    pub fn is_empty(&self) -> bool {
        self.raw_text.trim().is_empty()
            && self.detected_logos.iter().all(|l| l.trim().is_empty())
            && self.detected_labels.iter().all(|l| l.trim().is_empty())
            && self
                .candidate_code
                .as_deref()
                .map_or(true, |c| c.trim().is_empty())
    }

    /// Length of the OCR text in characters (trimmed)
    pub fn text_len(&self) -> usize {
        self.raw_text.trim().chars().count()
    }

    /// First non-blank detected logo
    pub fn primary_logo(&self) -> Option<&str> {
        self.detected_logos
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
    }
}

/// Product domain tag selecting prompt template and attribute schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vertical {
    Supermarket,
    Apparel,
}

impl Vertical {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vertical::Supermarket => "supermarket",
            Vertical::Apparel => "apparel",
        }
    }

    /// Attribute keys this vertical asks strategies for
    pub fn attribute_keys(&self) -> &'static [&'static str] {
        match self {
            Vertical::Supermarket => &["department", "net_content", "unit"],
            Vertical::Apparel => &["size", "color", "material", "gender", "style"],
        }
    }
}

impl fmt::Display for Vertical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown vertical tag
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown vertical: '{0}' (expected supermarket or apparel)")]
pub struct UnknownVertical(pub String);

impl FromStr for Vertical {
    type Err = UnknownVertical;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "supermarket" | "supermercado" | "grocery" => Ok(Vertical::Supermarket),
            "apparel" | "vestuario" | "vestuário" | "fashion" | "clothing" => Ok(Vertical::Apparel),
            _ => Err(UnknownVertical(s.to_string())),
        }
    }
}

// ============================================================================
// Strategy outcomes
// ============================================================================

/// Which strategy produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategySource {
    #[serde(rename = "code_lookup")]
    CodeLookup,
    #[serde(rename = "visual_lookup")]
    VisualLookup,
    #[serde(rename = "ai_inference")]
    Inference,
    #[serde(rename = "rag_enrichment")]
    RagEnrichment,
    #[serde(rename = "emergency_fallback")]
    EmergencyFallback,
}

impl StrategySource {
    /// Stable tag stored with the record
    pub fn tag(&self) -> &'static str {
        match self {
            StrategySource::CodeLookup => "code_lookup",
            StrategySource::VisualLookup => "visual_lookup",
            StrategySource::Inference => "ai_inference",
            StrategySource::RagEnrichment => "rag_enrichment",
            StrategySource::EmergencyFallback => "emergency_fallback",
        }
    }

    /// Sourced from a catalog or stored record rather than inferred
    pub fn is_authoritative(&self) -> bool {
        matches!(
            self,
            StrategySource::CodeLookup | StrategySource::VisualLookup | StrategySource::RagEnrichment
        )
    }

    /// Sourced from a catalog lookup by validated code
    pub fn is_code_authority(&self) -> bool {
        matches!(self, StrategySource::CodeLookup | StrategySource::RagEnrichment)
    }

    /// Fusion overlay order: higher rank overlays lower rank
    pub fn authority_rank(&self) -> u8 {
        match self {
            StrategySource::EmergencyFallback => 0,
            StrategySource::Inference => 1,
            StrategySource::VisualLookup => 2,
            StrategySource::CodeLookup | StrategySource::RagEnrichment => 3,
        }
    }
}

impl fmt::Display for StrategySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for StrategySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code_lookup" => Ok(StrategySource::CodeLookup),
            "visual_lookup" => Ok(StrategySource::VisualLookup),
            "ai_inference" => Ok(StrategySource::Inference),
            "rag_enrichment" => Ok(StrategySource::RagEnrichment),
            "emergency_fallback" => Ok(StrategySource::EmergencyFallback),
            other => Err(format!("Unknown strategy source: {}", other)),
        }
    }
}

/// Product title with its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Title {
    /// Title read or inferred from real product data
    Identified(String),
    /// Generated stand-in when nothing better is known
    Placeholder(String),
}

impl Title {
    pub fn as_str(&self) -> &str {
        match self {
            Title::Identified(t) | Title::Placeholder(t) => t,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Title::Placeholder(_))
    }
}

/// Base product fields, each optional until some strategy fills it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFields {
    /// Product code (only ever set after checksum validation)
    pub code: Option<String>,
    pub title: Option<Title>,
    pub brand: Option<String>,
    /// Free-text category as the source reported it
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub price: Option<f64>,
    pub tax_codes: TaxCodes,
}

impl ProductFields {
    /// Non-empty title that is not a generated placeholder
    pub fn has_identified_title(&self) -> bool {
        matches!(&self.title, Some(Title::Identified(t)) if !t.trim().is_empty())
    }

    pub fn has_brand(&self) -> bool {
        self.brand.as_deref().map_or(false, |b| !b.trim().is_empty())
    }
}

/// Normalized output of one strategy invocation
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    pub fields: ProductFields,
    /// Vertical-specific attributes
    pub attributes: AttributeMap,
    /// Vertical whose attribute set this strategy asked for (None = did not ask)
    pub attribute_set: Option<Vertical>,
    pub confidence: Confidence,
    pub source: StrategySource,
}

impl StrategyOutcome {
    /// Create outcome with clamped confidence (0.0-1.0)
    pub fn new(source: StrategySource, fields: ProductFields, confidence: Confidence) -> Self {
        Self {
            fields,
            attributes: AttributeMap::new(),
            attribute_set: None,
            confidence: clamp_confidence(confidence),
            source,
        }
    }

    /// Attach the attribute set requested for `vertical`
    pub fn with_attributes(mut self, vertical: Vertical, attributes: AttributeMap) -> Self {
        self.attribute_set = Some(vertical);
        self.attributes = attributes;
        self
    }

    /// True when the outcome carries anything beyond a placeholder title
    pub fn is_informative(&self) -> bool {
        self.fields.code.is_some()
            || self.fields.has_identified_title()
            || self.fields.has_brand()
            || self
                .fields
                .category
                .as_deref()
                .map_or(false, |c| !c.trim().is_empty())
            || !self.fields.tax_codes.is_empty()
            || !self.attributes.is_empty()
    }
}

/// Clamp to 0.0-1.0, mapping NaN to 0.0
pub fn clamp_confidence(value: Confidence) -> Confidence {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Output
// ============================================================================

/// Closed product taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Cleaning,
    Hygiene,
    Automotive,
    Beverages,
    Dairy,
    Food,
    Electronics,
    Apparel,
    Construction,
    Other,
}

impl Category {
    /// All categories in normalizer test order (Other last)
    pub const ALL: [Category; 10] = [
        Category::Cleaning,
        Category::Hygiene,
        Category::Automotive,
        Category::Beverages,
        Category::Dairy,
        Category::Food,
        Category::Electronics,
        Category::Apparel,
        Category::Construction,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cleaning => "Cleaning",
            Category::Hygiene => "Hygiene",
            Category::Automotive => "Automotive",
            Category::Beverages => "Beverages",
            Category::Dairy => "Dairy",
            Category::Food => "Food",
            Category::Electronics => "Electronics",
            Category::Apparel => "Apparel",
            Category::Construction => "Construction",
            Category::Other => "Other",
        }
    }

    /// Exact canonical-name lookup
    pub fn from_name(name: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final identification record
///
/// Built once by the pipeline's finalize step; corrections are new records.
/// Invariants: `title` non-empty, `category` in the closed taxonomy,
/// `confidence` in 0.0-1.0, `code` (when present) passed checksum validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub code: Option<String>,
    pub title: String,
    pub brand: Option<String>,
    pub category: Category,
    pub subcategory: Option<String>,
    pub price: Option<f64>,
    pub tax_codes: TaxCodes,
    pub vertical_attributes: AttributeMap,
    pub confidence: Confidence,
    pub source_strategy: StrategySource,
    pub vertical: Vertical,
    pub image_hash: String,
}

/// Per-request telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub image_hash: String,
    pub elapsed_seconds: f64,
    pub success: bool,
    pub confidence: Option<Confidence>,
    pub error: Option<String>,
}

// ============================================================================
// Collaborator errors
// ============================================================================

/// Error from an external collaborator call
///
/// Everything except `Internal` is an ordinary failure mode: strategies
/// downgrade it to a miss and the cascade moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// Call exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Collaborator has no data for the query
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// External API returned an error status
    #[error("API error: {0}")]
    Api(String),

    /// Failed to parse response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Collaborator not configured (missing key or endpoint)
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CollaboratorError {
    /// Ordinary failures advance the cascade; `Internal` does not
    pub fn is_ordinary(&self) -> bool {
        !matches!(self, CollaboratorError::Internal(_))
    }
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CollaboratorError::Timeout(err.to_string())
        } else if err.is_decode() {
            CollaboratorError::Parse(err.to_string())
        } else {
            CollaboratorError::Network(err.to_string())
        }
    }
}
