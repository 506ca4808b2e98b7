//! Applicant profiles extracted from uploaded documents
//!
//! The extraction model is asked for a JSON object, but nothing about its
//! reply is trusted: [`parse_profile_with_defaults`] maps every field to a
//! fixed shape with a concrete fallback, and unparseable output becomes an
//! empty (but still relevant) profile.

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::errors::CarmsError;
use crate::errors::Result;
use crate::errors::UploadRejection;
use crate::llm::prompts::PROFILE_EXTRACTION_PROMPT;
use crate::llm::ChatRequest;
use crate::llm::ContentBlock;
use crate::llm::LanguageModel;
use crate::llm::Message;
use crate::llm::Role;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const PDF_MAGIC: &[u8] = b"%PDF-";
const EXTRACTION_MAX_TOKENS: usize = 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub session_id: String,
    pub filename: String,
    pub is_relevant: bool,
    pub document_type: Option<String>,
    pub disciplines_of_interest: Vec<String>,
    pub geographic_preferences: Vec<String>,
    pub training_interests: Vec<String>,
    pub research_experience: Option<String>,
    pub clinical_experience: Option<String>,
    pub education: Option<String>,
    pub languages: Vec<String>,
    pub career_goals: Option<String>,
    pub strengths: Vec<String>,
    pub summary: Option<String>,
}

impl ApplicantProfile {
    /// Relevant and at least one field besides `document_type` was extracted
    pub fn has_content(&self) -> bool {
        if !self.is_relevant {
            return false;
        }
        let lists = [
            &self.disciplines_of_interest,
            &self.geographic_preferences,
            &self.training_interests,
            &self.languages,
            &self.strengths,
        ];
        let texts = [
            &self.research_experience,
            &self.clinical_experience,
            &self.education,
            &self.career_goals,
            &self.summary,
        ];
        lists.iter().any(|l| !l.is_empty()) || texts.iter().any(|t| t.is_some())
    }
}

/// Check declared type, size and signature, in that order
pub fn validate_upload(
    content_type: Option<&str>,
    bytes: &[u8],
) -> std::result::Result<(), UploadRejection> {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());
    if essence.as_deref() != Some("application/pdf") {
        return Err(UploadRejection::WrongContentType(
            content_type.map(str::to_string),
        ));
    }
    if bytes.is_empty() {
        return Err(UploadRejection::Empty);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadRejection::TooLarge {
            size: bytes.len(),
            max_mib: MAX_UPLOAD_BYTES / (1024 * 1024),
        });
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(UploadRejection::BadSignature);
    }
    Ok(())
}

/// Remove a surrounding ``` fence (with or without a language tag)
fn strip_code_fence(raw: &str) -> &str {
    let mut cleaned = raw.trim();
    if cleaned.starts_with("```") {
        cleaned = cleaned.split_once('\n').map_or("", |(_, rest)| rest);
    }
    if let Some(body) = cleaned.strip_suffix("```") {
        cleaned = body.trim_end();
    }
    cleaned
}

/// JSON truthiness; a missing key counts as true
fn flag_or_true(value: Option<&Value>) -> bool {
    match value {
        None => true,
        Some(Value::Bool(b)) => *b,
        Some(Value::Null) => false,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Array items stringified; a bare non-empty string becomes a one-item list
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(value_to_string)
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Null and empty strings are absent; other scalars are stringified
fn optional_string(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(other) => Some(value_to_string(other)),
    }
}

/// Build a profile from raw model output; never fails
pub fn parse_profile_with_defaults(raw: &str, session_id: &str, filename: &str) -> ApplicantProfile {
    let cleaned = strip_code_fence(raw);
    let data: Map<String, Value> = match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!("Profile JSON was not an object: {}", other);
            Map::new()
        }
        Err(e) => {
            let preview: String = raw.chars().take(200).collect();
            warn!("Failed to parse profile JSON ({}): {}", e, preview);
            Map::new()
        }
    };

    ApplicantProfile {
        session_id: session_id.to_string(),
        filename: filename.to_string(),
        is_relevant: flag_or_true(data.get("is_relevant")),
        document_type: optional_string(data.get("document_type")),
        disciplines_of_interest: string_list(data.get("disciplines_of_interest")),
        geographic_preferences: string_list(data.get("geographic_preferences")),
        training_interests: string_list(data.get("training_interests")),
        research_experience: optional_string(data.get("research_experience")),
        clinical_experience: optional_string(data.get("clinical_experience")),
        education: optional_string(data.get("education")),
        languages: string_list(data.get("languages")),
        career_goals: optional_string(data.get("career_goals")),
        strengths: string_list(data.get("strengths")),
        summary: optional_string(data.get("summary")),
    }
}

/// Context block prepended to a chat message
pub fn format_profile_context(profile: &ApplicantProfile) -> String {
    let mut parts = vec![format!("[APPLICANT PROFILE: {}]", profile.filename)];

    let lists = [
        ("Disciplines of interest", &profile.disciplines_of_interest),
        ("Geographic preferences", &profile.geographic_preferences),
        ("Training interests", &profile.training_interests),
    ];
    for (label, values) in lists {
        if !values.is_empty() {
            parts.push(format!("{label}: {}", values.join(", ")));
        }
    }

    let push_text = |parts: &mut Vec<String>, label: &str, value: &Option<String>| {
        if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
            parts.push(format!("{label}: {v}"));
        }
    };
    push_text(&mut parts, "Research experience", &profile.research_experience);
    push_text(&mut parts, "Clinical experience", &profile.clinical_experience);
    push_text(&mut parts, "Education", &profile.education);
    if !profile.languages.is_empty() {
        parts.push(format!("Languages: {}", profile.languages.join(", ")));
    }
    push_text(&mut parts, "Career goals", &profile.career_goals);
    if !profile.strengths.is_empty() {
        parts.push(format!("Strengths: {}", profile.strengths.join(", ")));
    }
    push_text(&mut parts, "Summary", &profile.summary);

    parts.push("[END PROFILE]".to_string());
    parts.join("\n")
}

/// Sends whole documents to the document-understanding model
pub struct ProfileExtractor {
    llm: Arc<dyn LanguageModel>,
    model: String,
}

impl ProfileExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// Hosted-API failures become `ExtractionFailed`; malformed replies do not
    pub async fn extract(
        &self,
        pdf: &[u8],
        filename: &str,
        session_id: &str,
    ) -> Result<ApplicantProfile> {
        let request = ChatRequest {
            model: Some(self.model.clone()),
            messages: vec![Message {
                role: Role::User,
                content: vec![
                    ContentBlock::pdf(pdf),
                    ContentBlock::text(PROFILE_EXTRACTION_PROMPT),
                ],
            }],
            max_tokens: Some(EXTRACTION_MAX_TOKENS),
            ..Default::default()
        };

        let response = self.llm.chat(request).await.map_err(|e| {
            error!("Profile extraction call failed for {}: {}", filename, e);
            CarmsError::ExtractionFailed(e.to_string())
        })?;

        let raw = response.text();
        if raw.is_empty() {
            warn!("Extraction model returned no text for {}", filename);
        } else {
            debug!("Profile extraction raw response: {}", raw);
        }

        Ok(parse_profile_with_defaults(&raw, session_id, filename))
    }
}
