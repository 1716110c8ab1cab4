//! Core data models for document analysis

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MediaType {
    #[serde(rename = "application/pdf")]
    Pdf,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/webp")]
    Webp,
}

impl MediaType {
    pub fn as_mime(&self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Webp => "image/webp",
        }
    }

    /// Parse a declared MIME string. Parameters such as `; charset=` are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(MediaType::Pdf),
            "image/jpeg" | "image/jpg" => Some(MediaType::Jpeg),
            "image/png" => Some(MediaType::Png),
            "image/webp" => Some(MediaType::Webp),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(MediaType::Pdf),
            "jpg" | "jpeg" => Some(MediaType::Jpeg),
            "png" => Some(MediaType::Png),
            "webp" => Some(MediaType::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_mime())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FinancialKind {
    Support,
    Asset,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Idle,
    Analyzing,
    Complete,
    Error,
}

//
// ================= Extraction =================
//

/// Structured record extracted from one legal document.
///
/// Only reaches callers after passing `ExtractionSchema::validate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionData {
    pub applicant_income: f64,
    pub respondent_income: f64,
    #[serde(default)]
    pub child_support: Option<f64>,
    #[serde(default)]
    pub spousal_support: Option<f64>,
    #[serde(rename = "hasODSP")]
    pub has_odsp: bool,
    #[serde(rename = "hasCPP")]
    pub has_cpp: bool,
    pub compliance_notes: Vec<String>,
    #[serde(default)]
    pub case_info: Option<CaseInfo>,
    #[serde(default)]
    pub custody: Vec<CustodyEntry>,
    #[serde(default)]
    pub financials: Vec<FinancialItem>,
    #[serde(default)]
    pub risks: Vec<RiskItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CaseInfo {
    pub parties: String,
    pub jurisdiction: String,
    pub case_number: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustodyEntry {
    pub id: u32,
    pub label: String,
    pub value: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinancialItem {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: FinancialKind,
    pub title: String,
    pub amount: String,
    pub due: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RiskItem {
    pub id: u32,
    pub severity: Severity,
    pub title: String,
    pub description: String,
}

/// Accepted extraction plus the envelope identifying which document it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionResult {
    pub id: Uuid,
    pub file_name: String,
    pub media_type: MediaType,
    pub document_digest: String,
    pub analyzed_at: DateTime<Utc>,
    pub data: ExtractionData,
}

//
// ================= Session =================
//

/// Single source of truth for rendering. Only the flow controller writes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisSession {
    pub status: AnalysisStatus,
    pub progress: u8,
    pub result: Option<ExtractionResult>,
    pub error_reason: Option<String>,
    pub error_kind: Option<String>,
    pub attempt_id: Option<Uuid>,
}

impl AnalysisSession {
    pub fn idle() -> Self {
        Self {
            status: AnalysisStatus::Idle,
            progress: 0,
            result: None,
            error_reason: None,
            error_kind: None,
            attempt_id: None,
        }
    }

    pub fn is_analyzing(&self) -> bool {
        self.status == AnalysisStatus::Analyzing
    }

    pub fn stage(&self) -> Option<ProgressStage> {
        self.is_analyzing().then(|| ProgressStage::for_progress(self.progress))
    }
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::idle()
    }
}

/// Human-facing label for the cosmetic progress value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Scanning,
    IdentifyingFinancials,
    MappingCustody,
    Finalizing,
}

impl ProgressStage {
    pub fn for_progress(progress: u8) -> Self {
        match progress {
            0..=29 => ProgressStage::Scanning,
            30..=59 => ProgressStage::IdentifyingFinancials,
            60..=89 => ProgressStage::MappingCustody,
            _ => ProgressStage::Finalizing,
        }
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgressStage::Scanning => "OCR Scanning...",
            ProgressStage::IdentifyingFinancials => "Identifying Financials...",
            ProgressStage::MappingCustody => "Mapping Custody Schedule...",
            ProgressStage::Finalizing => "Finalizing Report...",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        };
        write!(f, "{}", s)
    }
}
