//! Report projection
//!
//! Pure reshaping of an accepted `ExtractionResult` into the view-model the
//! presentation layer renders. No I/O and no failure modes.

use crate::models::{
    CaseInfo, CustodyEntry, ExtractionResult, FinancialItem, FinancialKind, RiskItem, Severity,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Report {
    pub meta: ReportMeta,
    pub summary: ReportSummary,
    pub case: Option<CaseInfo>,
    pub custody: Vec<CustodyEntry>,
    pub financials: FinancialGroups,
    pub risks: RiskGroups,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportMeta {
    pub result_id: Uuid,
    pub file_name: String,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub applicant_income: f64,
    pub respondent_income: f64,
    pub child_support: Option<f64>,
    pub spousal_support: Option<f64>,
    #[serde(rename = "hasODSP")]
    pub has_odsp: bool,
    #[serde(rename = "hasCPP")]
    pub has_cpp: bool,
    /// Either disability benefit is in play
    pub benefits_alert: bool,
    pub compliance_notes: Vec<String>,
    pub combined_annual_income: f64,
    pub total_monthly_support: f64,
    pub income_comparison: Vec<IncomeBar>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IncomeBar {
    pub party: String,
    pub income: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct FinancialGroups {
    pub support: Vec<FinancialItem>,
    pub assets_and_deadlines: Vec<FinancialItem>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct RiskGroups {
    pub high: Vec<RiskItem>,
    pub medium: Vec<RiskItem>,
    pub low: Vec<RiskItem>,
    pub highest_severity: Option<Severity>,
}

impl RiskGroups {
    pub fn total(&self) -> usize {
        self.high.len() + self.medium.len() + self.low.len()
    }
}

pub fn project(result: &ExtractionResult) -> Report {
    let data = &result.data;

    let summary = ReportSummary {
        applicant_income: data.applicant_income,
        respondent_income: data.respondent_income,
        child_support: data.child_support,
        spousal_support: data.spousal_support,
        has_odsp: data.has_odsp,
        has_cpp: data.has_cpp,
        benefits_alert: data.has_odsp || data.has_cpp,
        compliance_notes: data.compliance_notes.clone(),
        combined_annual_income: data.applicant_income + data.respondent_income,
        total_monthly_support: data.child_support.unwrap_or(0.0)
            + data.spousal_support.unwrap_or(0.0),
        income_comparison: vec![
            IncomeBar {
                party: "Applicant".to_string(),
                income: data.applicant_income,
            },
            IncomeBar {
                party: "Respondent".to_string(),
                income: data.respondent_income,
            },
        ],
    };

    let mut financials = FinancialGroups::default();
    for item in &data.financials {
        match item.kind {
            FinancialKind::Support => financials.support.push(item.clone()),
            FinancialKind::Asset => financials.assets_and_deadlines.push(item.clone()),
        }
    }

    let mut risks = RiskGroups::default();
    for risk in &data.risks {
        match risk.severity {
            Severity::High => risks.high.push(risk.clone()),
            Severity::Medium => risks.medium.push(risk.clone()),
            Severity::Low => risks.low.push(risk.clone()),
        }
    }
    // Severity orders High < Medium < Low
    risks.highest_severity = data.risks.iter().map(|r| r.severity).min();

    Report {
        meta: ReportMeta {
            result_id: result.id,
            file_name: result.file_name.clone(),
            analyzed_at: result.analyzed_at,
        },
        summary,
        case: data.case_info.clone(),
        custody: data.custody.clone(),
        financials,
        risks,
    }
}

/// Whole-dollar CAD display, e.g. `$120,000` or `-$1,250`.
pub fn format_cad(amount: f64) -> String {
    let rounded = amount.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}${}", sign, grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::sample_extraction;
    use crate::models::{ExtractionData, MediaType};

    fn result(data: ExtractionData) -> ExtractionResult {
        ExtractionResult {
            id: Uuid::new_v4(),
            file_name: "order.pdf".to_string(),
            media_type: MediaType::Pdf,
            document_digest: "abc".to_string(),
            analyzed_at: Utc::now(),
            data,
        }
    }

    #[test]
    fn test_projection_groups_sample() {
        let report = project(&result(sample_extraction()));

        assert_eq!(report.summary.applicant_income, 120000.0);
        assert_eq!(report.summary.combined_annual_income, 205000.0);
        assert_eq!(report.summary.total_monthly_support, 2050.0);
        assert!(!report.summary.benefits_alert);
        assert_eq!(report.financials.support.len(), 2);
        assert_eq!(report.financials.assets_and_deadlines.len(), 1);
        assert_eq!(report.risks.high[0].title, "Missing Tax Exemption");
        assert_eq!(report.risks.total(), 3);
        assert_eq!(report.risks.highest_severity, Some(Severity::High));
        assert_eq!(report.case.unwrap().case_number, "19D004821");
        assert_eq!(report.custody.len(), 3);
        assert_eq!(report.meta.file_name, "order.pdf");
    }

    #[test]
    fn test_projection_of_minimal_extraction() {
        let data = ExtractionData {
            applicant_income: 50000.0,
            respondent_income: 0.0,
            child_support: None,
            spousal_support: Some(300.0),
            has_odsp: true,
            has_cpp: false,
            compliance_notes: vec![],
            case_info: None,
            custody: vec![],
            financials: vec![],
            risks: vec![],
        };
        let report = project(&result(data));

        assert!(report.summary.benefits_alert);
        assert_eq!(report.summary.total_monthly_support, 300.0);
        assert_eq!(report.risks.highest_severity, None);
        assert!(report.case.is_none());
        assert_eq!(report.summary.income_comparison[1].party, "Respondent");
    }

    #[test]
    fn test_summary_wire_names() {
        let report = project(&result(sample_extraction()));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["summary"]["applicantIncome"], 120000.0);
        assert_eq!(json["summary"]["hasODSP"], false);
        assert_eq!(json["summary"]["complianceNotes"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_format_cad() {
        assert_eq!(format_cad(120000.0), "$120,000");
        assert_eq!(format_cad(1250.4), "$1,250");
        assert_eq!(format_cad(999.0), "$999");
        assert_eq!(format_cad(0.0), "$0");
        assert_eq!(format_cad(-1234567.0), "-$1,234,567");
    }
}
