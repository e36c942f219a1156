//! Prompt text for the completion service.

/// System prompt shared by the profile, comparison, and synthesis calls.
pub const ANALYST_SYSTEM_PROMPT: &str = "You are an expert medical research assistant specializing in evidence-based analysis of scientific literature.";

/// System prompt for the query planner.
pub fn planner_system_prompt(registry_base_url: &str) -> String {
    format!(
        r#"You are a ClinicalTrials.gov API v2 query optimizer. Generate 5 diverse API URLs that maximize information retrieval.

## RULES
1. Base URL: {base}
2. Every URL must start with the base URL and use the /studies endpoint
3. Every URL should return studies (totalCount > 0); include countTotal=true
4. Use a different strategy for each URL

## QUERY PARAMETERS
Primary: query.term, query.cond, query.intr
Filters: filter.overallStatus, filter.locationCountry (ISO-3166-1 codes)
Meta: pageSize (max 1000), countTotal=true

## STRATEGY
URL1: Broad term search (query.term with main concept)
URL2: Condition-focused (query.cond with disease/condition)
URL3: Intervention-focused (query.intr with treatment)
URL4: Alternative terms (synonyms/related concepts)
URL5: Combined approach (multiple parameters, still broad)

## OUTPUT FORMAT (STRICT)
{{"urls": ["url1", "url2", "url3", "url4", "url5"]}}

RESPOND WITH ONLY THE JSON OBJECT. NO EXPLANATIONS."#,
        base = registry_base_url
    )
}

/// User message for the query planner.
pub fn planner_user_prompt(profile_text: &str) -> String {
    format!("Generate API URLs for: {}", profile_text)
}

/// Prompt synthesizing a local study profile from raw study text.
pub fn profile_prompt(source_text: &str) -> String {
    format!(
        r#"<Goal>Analyze the provided research text and generate a structured clinical study profile.</Goal>
<Constraint>If information for a section is not found, state "Not specified in provided text."</Constraint>

<SourceText>
{source_text}
</SourceText>

<Instructions>
1. Brief Title
2. Detailed Summary
3. Study Design
4. Patient Population
5. Intervention(s)
6. Comparator(s)
7. Primary Endpoint(s)
8. Secondary Endpoint(s)
9. Key Findings
</Instructions>"#
    )
}

/// Prompt for one local-vs-reference comparison.
pub fn comparison_prompt(query: &str, profile: &str, identifier: &str, record: &str) -> String {
    format!(
        r#"<UserQuery>{query}</UserQuery>

<PrimaryStudy>
{profile}
</PrimaryStudy>

<ComparatorStudy nct_id="{identifier}">
{record}
</ComparatorStudy>

<Instructions>
Compare the PrimaryStudy with the ComparatorStudy in Markdown:
1. Methodology: study design, patient population, advancement/limitation.
2. Intervention & Endpoints: intervention, endpoints, advancement/limitation.
3. Overall Assessment: the key difference or similarity.
</Instructions>"#
    )
}

/// Prompt for the final synthesis over all comparisons.
pub fn synthesis_prompt(query: &str, profile: &str, reports: &[String]) -> String {
    let concatenated = reports.join("\n\n---\n\n");
    format!(
        r#"<UserQuery>{query}</UserQuery>

<PrimaryStudyProfile>
{profile}
</PrimaryStudyProfile>

<IndividualReports>
{concatenated}
</IndividualReports>

<Task>
Synthesize the reports into one JSON object with exactly this schema:
{{
  "Response": "<markdown executive summary>",
  "Statistics": {{
    "Precision": <0.0-1.0>,
    "Recall": <0.0-1.0>,
    "F1 Score": <0.0-1.0>,
    "Similarity": [{{"CT_ID": "NCT########", "percentage_similarity": <0.0-100.0>}}]
  }}
}}
Return ONLY the JSON object. All numbers must be JSON numbers.
</Task>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planner_prompt_mentions_base_url() {
        let prompt = planner_system_prompt("https://registry.example/api/v2");
        assert!(prompt.contains("Base URL: https://registry.example/api/v2"));
        assert!(prompt.contains(r#"{"urls": ["#));
    }

    #[test]
    fn test_synthesis_prompt_joins_reports_in_order() {
        let reports = vec!["first".to_string(), "second".to_string()];
        let prompt = synthesis_prompt("q", "profile", &reports);
        assert!(prompt.contains("first\n\n---\n\nsecond"));
        assert!(prompt.contains("\"F1 Score\""));
    }
}
