//! Analysis client trait and implementations
//!
//! An analysis client performs exactly one extraction call per invocation and
//! returns schema-validated data. Retrying is left to the caller.

use crate::encoder::EncodedDocument;
use crate::error::AnalysisError;
use crate::models::ExtractionData;
use crate::schema::ExtractionSchema;
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub mod gemini;
pub mod prompt;

pub use gemini::GeminiAnalysisClient;

/// Everything needed for one extraction attempt. Built fresh per attempt.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub document: EncodedDocument,
    pub prompt: String,
    pub schema: Arc<ExtractionSchema>,
}

impl ExtractionRequest {
    /// Shared preconditions for every client implementation.
    pub fn check(&self) -> Result<()> {
        if self.document.is_empty() {
            return Err(AnalysisError::ValidationFailure(
                "document payload is empty".to_string(),
            ));
        }
        if !self.schema.is_well_formed() {
            return Err(AnalysisError::SchemaViolation(
                "extraction schema is not well-formed".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for document extraction (LLM controlled)
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze(&self, request: &ExtractionRequest) -> Result<ExtractionData>;
}

/// Parse model text into validated data.
///
/// Tolerates a markdown ```json fence around the object.
pub fn parse_extraction(text: &str, schema: &ExtractionSchema) -> Result<ExtractionData> {
    let cleaned = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if cleaned.is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }

    let value: serde_json::Value = serde_json::from_str(cleaned).map_err(|e| {
        AnalysisError::SchemaViolation(format!("response is not valid JSON: {}", e))
    })?;

    schema.validate(&value)
}

//
// ================= Mock =================
//

type FailureFactory = Arc<dyn Fn() -> AnalysisError + Send + Sync>;

#[derive(Clone)]
enum MockResponse {
    Sample,
    Json(serde_json::Value),
    Failure(FailureFactory),
}

/// Mock client for development & testing
/// Keeps the flow functional without a model credential
#[derive(Clone)]
pub struct MockAnalysisClient {
    response: MockResponse,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl MockAnalysisClient {
    /// Returns `sample_extraction()` after `delay`.
    pub fn new(delay: Duration) -> Self {
        Self {
            response: MockResponse::Sample,
            delay,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the given JSON, validated against the request schema like a real response.
    pub fn with_json(value: serde_json::Value) -> Self {
        Self {
            response: MockResponse::Json(value),
            ..Self::new(Duration::ZERO)
        }
    }

    pub fn failing<F>(failure: F) -> Self
    where
        F: Fn() -> AnalysisError + Send + Sync + 'static,
    {
        Self {
            response: MockResponse::Failure(Arc::new(failure)),
            ..Self::new(Duration::ZERO)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisClient for MockAnalysisClient {
    async fn analyze(&self, request: &ExtractionRequest) -> Result<ExtractionData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        request.check()?;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.response {
            MockResponse::Sample => Ok(sample_extraction()),
            MockResponse::Json(value) => request.schema.validate(value),
            MockResponse::Failure(make) => Err(make()),
        }
    }
}

/// Fixed extraction used by the mock client.
pub fn sample_extraction() -> ExtractionData {
    use crate::models::{CaseInfo, CustodyEntry, FinancialItem, FinancialKind, RiskItem, Severity};

    ExtractionData {
        applicant_income: 120000.0,
        respondent_income: 85000.0,
        child_support: Some(1250.0),
        spousal_support: Some(800.0),
        has_odsp: false,
        has_cpp: false,
        compliance_notes: vec![
            "Child support aligns with Federal Guidelines.".to_string(),
            "Spousal support duration is within advisory range.".to_string(),
        ],
        case_info: Some(CaseInfo {
            parties: "Smith vs. Smith".to_string(),
            jurisdiction: "Superior Court of California, County of Orange".to_string(),
            case_number: "19D004821".to_string(),
            date: "Oct 12, 2024".to_string(),
        }),
        custody: vec![
            CustodyEntry {
                id: 1,
                label: "Regular Schedule".to_string(),
                value: "2-2-5-5 Rotation".to_string(),
                detail: "Mother: Mon/Tue, Father: Wed/Thu, Alternate Weekends.".to_string(),
            },
            CustodyEntry {
                id: 2,
                label: "Summer Break".to_string(),
                value: "Week On / Week Off".to_string(),
                detail: "Exchanges occur Fridays at 6:00 PM.".to_string(),
            },
            CustodyEntry {
                id: 3,
                label: "Thanksgiving".to_string(),
                value: "Alternating Years".to_string(),
                detail: "Father in even years, Mother in odd years.".to_string(),
            },
        ],
        financials: vec![
            FinancialItem {
                id: 1,
                kind: FinancialKind::Support,
                title: "Child Support".to_string(),
                amount: "$1,250/mo".to_string(),
                due: "1st of month".to_string(),
            },
            FinancialItem {
                id: 2,
                kind: FinancialKind::Support,
                title: "Spousal Support".to_string(),
                amount: "$800/mo".to_string(),
                due: "Until Dec 2028".to_string(),
            },
            FinancialItem {
                id: 3,
                kind: FinancialKind::Asset,
                title: "Marital Home Refinance".to_string(),
                amount: "Deadline".to_string(),
                due: "Must complete by June 1, 2026".to_string(),
            },
        ],
        risks: vec![
            RiskItem {
                id: 1,
                severity: Severity::High,
                title: "Missing Tax Exemption".to_string(),
                description: "The decree does not specify who claims the children as dependents for IRS/CRA purposes in alternating years.".to_string(),
            },
            RiskItem {
                id: 2,
                severity: Severity::Medium,
                title: "Vague Exchange Location".to_string(),
                description: "Paragraph 4.2 states 'mutually agreed public place'. This often leads to conflict. Recommendation: Specify a police station or school.".to_string(),
            },
            RiskItem {
                id: 3,
                severity: Severity::Low,
                title: "Passport Provisions".to_string(),
                description: "No clause regarding possession of children's passports or travel notification requirements.".to_string(),
            },
        ],
    }
}
