//! Extraction prompt

/// Jurisdiction used when the user profile does not name one.
pub const DEFAULT_JURISDICTION: &str = "ontario";

/// Build the extraction prompt, scoped to the user's default jurisdiction.
pub fn build_prompt(jurisdiction: Option<&str>) -> String {
    let jurisdiction = jurisdiction
        .map(str::trim)
        .filter(|j| !j.is_empty())
        .unwrap_or(DEFAULT_JURISDICTION);

    format!(
        r#"You are an expert legal assistant for {} Family Law.
Analyze the attached document (likely an affidavit, financial statement, or court order).

Extract the following information:
1. Applicant's annual income (estimate if monthly is provided).
2. Respondent's annual income.
3. Monthly child support amount found in the tables or order.
4. Monthly spousal support amount.
5. Detect if there is any mention of ODSP (Ontario Disability Support Program) or CPP-Disability.
6. Provide brief compliance notes summarizing the findings and any missing critical data.
7. When present: case parties, court, file number and date; the parenting time schedule;
   support obligations, assets and deadlines; drafting risks rated high, medium or low.

Return ONLY JSON matching the schema."#,
        display_name(jurisdiction)
    )
}

fn display_name(id: &str) -> String {
    id.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_jurisdiction() {
        let prompt = build_prompt(None);
        assert!(prompt.starts_with("You are an expert legal assistant for Ontario Family Law."));
        assert!(prompt.contains("Return ONLY JSON"));
        assert_eq!(build_prompt(Some("  ")), prompt);
    }

    #[test]
    fn test_profile_jurisdiction() {
        let prompt = build_prompt(Some("british-columbia"));
        assert!(prompt.contains("British Columbia Family Law"));
    }
}
