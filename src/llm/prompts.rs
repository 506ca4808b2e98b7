//! Prompt templates

use crate::errors::CarmsError;
use crate::errors::Result;

/// Text with `{{name}}` placeholders
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    variables: Vec<String>,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let variables = extract_variables(&template);
        Self {
            template,
            variables,
        }
    }

    /// Fill every placeholder; a placeholder without a value is an error
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String> {
        let mut result = self.template.clone();
        for var in &self.variables {
            let value = values
                .iter()
                .find(|(name, _)| name == var)
                .map(|(_, value)| *value)
                .ok_or_else(|| {
                    CarmsError::InvalidInput(format!("missing prompt variable '{var}'"))
                })?;
            result = result.replace(&format!("{{{{{var}}}}}"), value);
        }
        Ok(result)
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }
}

fn extract_variables(template: &str) -> Vec<String> {
    let mut variables = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            break;
        };
        let name = after[..close].trim();
        if !name.is_empty() && !variables.iter().any(|v| v == name) {
            variables.push(name.to_string());
        }
        rest = &after[close + 2..];
    }
    variables
}

/// Grounded question answering over retrieved program text
pub fn rag_answer() -> PromptTemplate {
    PromptTemplate::new(
        "You are an expert advisor on Canadian medical residency programs (CaRMS).
Use the following context from program descriptions to answer the question.
If you cannot answer from the provided context, say so honestly.

Context:
{{context}}

Question: {{question}}

Answer:",
    )
}

pub const AGENT_SYSTEM_PROMPT: &str = "You are CaRMS Program Explorer, an assistant that helps medical students
find residency programs in Canada using the program catalog behind your tools.

**Your capabilities:**
- Search programs using natural language (semantic search over program descriptions)
- Filter programs by discipline, school, site, or stream
- Get detailed information about any specific program
- Compare multiple programs side by side
- List all disciplines and schools with program counts
- Provide aggregate analytics about the program landscape

**Document upload capability:**
- Users can upload a PDF (CV, personal statement, cover letter) which is analysed into an
  applicant profile. When a profile exists, each message will begin with an [APPLICANT PROFILE]
  block containing disciplines of interest, geographic preferences, training interests, etc.
- When you see an [APPLICANT PROFILE] block, proactively use it to search for and recommend
  matching programs. Use `search_programs` with training interests and `filter_programs` with
  disciplines/geographic preferences to find relevant matches.
- Explain *why* each recommended program is a good match based on the profile.

**Guidelines:**
- When a student describes what they're looking for, use semantic search first
- Present results clearly with key details (school, discipline, site, stream)
- Offer to show more details or compare programs when relevant
- Be helpful and encouraging - choosing a residency program is a big decision
- If you're unsure, ask clarifying questions about their preferences
- Use the compare tool when students are deciding between specific programs
- Always provide program IDs so students can ask for more details
";

pub const PROFILE_EXTRACTION_PROMPT: &str = r#"You are an expert career counselor. A user uploaded a document to a medical residency program matching tool (CaRMS). Your FIRST task is to determine if this document is relevant.

A document is RELEVANT only if it is one of these:
- CV / resume (of a medical student or professional)
- Personal statement or cover letter (for residency applications)
- CaRMS application or supplementary document
- Academic transcript
- Letter of recommendation for a medical applicant
- Research portfolio or publication list

A document is NOT RELEVANT if it is anything else, including but not limited to:
- Airline bookings, travel confirmations, receipts, invoices
- Government forms, rebate applications, tax documents
- News articles, marketing materials, manuals
- Non-medical resumes or job applications

Set "is_relevant" to false if the document does not clearly relate to a medical career or residency application. When in doubt, mark it as NOT relevant.

Return **only** valid JSON (no markdown fences, no explanation) with these keys:

{
  "is_relevant": true or false,
  "document_type": "what kind of document this is, e.g. 'CV', 'personal statement'",
  "disciplines_of_interest": ["medical specialties, rotations, or fields mentioned"],
  "geographic_preferences": ["provinces, cities, regions, or institutions mentioned"],
  "training_interests": ["specific training focuses mentioned, e.g. rural medicine, research"],
  "research_experience": "brief summary of any research mentioned, or null",
  "clinical_experience": "brief summary of clinical experience or rotations, or null",
  "education": "degrees, institutions, and years if mentioned, or null",
  "languages": ["languages mentioned or implied"],
  "career_goals": "any stated career goals or aspirations, or null",
  "strengths": ["key strengths, skills, awards, or qualities mentioned"],
  "summary": "2-3 sentence overall summary of the applicant based on the document"
}

If "is_relevant" is false, leave all profile fields as null/[] and just fill in "document_type" and set "summary" to a brief description of what the document actually is.

If "is_relevant" is true, be thorough extracting information:
- If the document mentions a university, include it under "education"
- If it mentions a city or province, consider it a geographic preference
- If it lists clinical rotations or electives, those indicate disciplines of interest
- If it mentions research projects, summarize them under "research_experience"
- Any medical specialty mentioned anywhere is a discipline of interest
- Prefer extracting something over returning empty; partial info helps
"#;
