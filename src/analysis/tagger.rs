//! Tag extraction from chunk text through a chat-completion model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::analysis::error::{AnalysisError, AnalysisResult};
use crate::analysis::service::ServiceClient;
use crate::config::ServiceConfig;

const SERVICE: &str = "tagging";

/// Instructions sent as the developer message of every tagging request.
pub const TAG_SYSTEM_PROMPT: &str = r#"You are a tagging engine that extracts metadata from fiction and non-fiction text.
Use only the text chunk you are given. Do not use outside knowledge such as web search or remembered plots.
Do not guess information you cannot determine; use null or a suitable default instead.

Output exactly one JSON object following the schema below.
Never include explanations, markdown, code fences or comments. Output JSON only.

Field schema and value rules:

{
  "is_fiction": "fiction | non_fiction | mixed | null",

  "primary_genres": ["top-level genres (e.g. 'fantasy', 'romance', 'mystery', 'sf', 'essay', 'self-help', 'humanities', 'business')"],
  "subgenres": ["finer genre tags (e.g. 'romantic fantasy', 'psychological thriller', 'coming of age')"],
  "main_topics": ["main subject and theme tags (e.g. 'growing up', 'friendship', 'revenge', 'war', 'work life', 'love', 'family', 'depression', 'meaning of life')"],

  "length_category": "short_story | novella | novel | epic | short_form | standard | long_form | null",
  "is_series": "standalone | series_first | series_middle | series_last | null",
  "structure_features": ["structural traits (e.g. 'short episodes', 'continuous narrative', 'diary form', 'epistolary', 'omnibus')"],

  "narrative_pov": "first_person | third_limited | third_omniscient | multi_pov | other | null",
  "tense": "past | present | mixed | null",
  "style_descriptors": ["prose style (e.g. 'terse', 'richly descriptive', 'poetic', 'direct', 'humorous', 'philosophical', 'emotionally nuanced', 'dialogue-heavy', 'expository')"],
  "tone_mood": ["overall mood (e.g. 'dark', 'warm', 'hopeful', 'melancholy', 'calm', 'tense', 'brutal', 'romantic', 'funny')"],
  "complexity_level": "easy | normal | challenging | very_challenging | null",

  "character_vs_plot_driven": "character_driven | plot_driven | balanced | idea_driven | null",
  "emotional_impact": ["emotional tags (e.g. 'moving', 'catharsis', 'sadness', 'immersive', 'comforting', 'lingering', 'fear')"],
  "reading_energy": "light | moderate | heavy | null",
  "target_audience": "children | YA | adult | all_age | null",

  "world_type": "realistic_modern | historical | secondary_fantasy_world | sci_fi_setting | alternate_history | abstract | other | null",
  "time_period": "contemporary | 19th_century | medieval_like | future | modern_history | unspecified | null",
  "primary_locales": ["main settings (e.g. 'city', 'countryside', 'school', 'office', 'spaceship', 'battlefield', 'home', 'travel destination')"],

  "nonfiction_type": "essay | self_help | history | science | psychology | business | philosophy | other | null",
  "main_subjects": ["for non-fiction, the main disciplines or subjects (e.g. 'behavioral economics', 'cognitive psychology', 'modern history', 'startups', 'leadership')"],
  "practicality_level": "highly_practical | mixed | theoretical | null",
  "depth_level": "introductory | intermediate | advanced | null",

  "content_warnings": {
    "violence": "none | mild | moderate | severe",
    "sexual_content": "none | mild | moderate | explicit",
    "abuse": "none | mild | moderate | severe",
    "self_harm": "none | mild | moderate | severe",
    "drug_use": "none | mild | moderate | severe",
    "discrimination": "none | mild | moderate | severe"
  },
  "age_rating_estimate": "all | 12+ | 15+ | 19+ | unknown"
}

Rules:
- Keep every array short, about 0 to 5 entries.
- When the text alone is not conclusive, do not guess aggressively; use null, "unknown", or an empty array.
- content_warnings must always contain all of the keys above.
"#;

/// One chunk's tags: field name → value (string, list of strings, object of
/// strings, or null), as returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagRecord(Map<String, Value>);

impl TagRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Produces a tag record for one chunk of text.
pub trait TagExtractor {
    fn extract(&self, chunk: &str) -> AnalysisResult<TagRecord>;

    /// `extract`, with any failure logged and turned into `None`.
    fn tag_chunk(&self, chunk: &str) -> Option<TagRecord> {
        match self.extract(chunk) {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::warn!(%error, "tagging failed; dropping sample");
                None
            }
        }
    }
}

/// `TagExtractor` backed by `{base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct TagClient {
    client: ServiceClient,
    model: String,
}

impl TagClient {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            client: ServiceClient::new(SERVICE, config),
            model: config.chat_model.clone(),
        }
    }

    fn request_body(&self, chunk: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "developer", "content": TAG_SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(chunk)},
            ],
        })
    }
}

impl TagExtractor for TagClient {
    fn extract(&self, chunk: &str) -> AnalysisResult<TagRecord> {
        let response = self.client.post_json("/chat/completions", &self.request_body(chunk))?;
        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| self.client.malformed("missing choices[0].message.content"))?;
        parse_tag_content(content)
    }
}

fn user_prompt(chunk: &str) -> String {
    format!(
        "The following is part (a chunk) of a book. Using only this text, produce JSON \
         that follows the schema above.\n\n[text start]\n{chunk}\n[text end]\n"
    )
}

/// Parse the model's reply into a tag record.
///
/// The trimmed reply is parsed as JSON first. If that fails, the substring
/// from the first `{` to the last `}` is tried, which strips code fences and
/// surrounding prose. Anything that is not a JSON object is rejected.
pub fn parse_tag_content(content: &str) -> AnalysisResult<TagRecord> {
    let content = content.trim();
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(content) {
        return Ok(TagRecord(fields));
    }

    if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
        if start < end {
            if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(&content[start..=end]) {
                return Ok(TagRecord(fields));
            }
        }
    }

    Err(AnalysisError::MalformedResponse {
        service: SERVICE.to_string(),
        message: format!("reply is not a JSON object: {}", preview(content)),
    })
}

fn preview(content: &str) -> String {
    let mut head: String = content.chars().take(120).collect();
    if head.len() < content.len() {
        head.push('…');
    }
    head
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_reply() {
        let record = parse_tag_content(r#"  {"tense": "past", "primary_genres": ["fantasy"]}  "#).unwrap();
        assert_eq!(record.get("tense"), Some(&json!("past")));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn fenced_reply_uses_brace_fallback() {
        let reply = "Here are the tags:\n```json\n{\"tense\": \"present\"}\n```\nDone.";
        let record = parse_tag_content(reply).unwrap();
        assert_eq!(record.get("tense"), Some(&json!("present")));
    }

    #[test]
    fn nested_braces_survive_fallback() {
        let reply = "x {\"content_warnings\": {\"violence\": \"mild\"}} y";
        let record = parse_tag_content(reply).unwrap();
        assert_eq!(record.get("content_warnings"), Some(&json!({"violence": "mild"})));
    }

    #[test]
    fn non_object_replies_rejected() {
        assert!(parse_tag_content("no json here").is_err());
        assert!(parse_tag_content("[1, 2, 3]").is_err());
        assert!(parse_tag_content("} backwards {").is_err());
        assert!(parse_tag_content("{ not: valid }").is_err());
    }

    #[test]
    fn request_carries_prompt_and_chunk() {
        let client = TagClient::new(&ServiceConfig::default());
        let body = client.request_body("It was a dark night.");
        assert_eq!(body["model"], "gpt-5-nano");
        assert_eq!(body["messages"][0]["role"], "developer");
        assert_eq!(body["messages"][0]["content"], TAG_SYSTEM_PROMPT);
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("[text start]\nIt was a dark night.\n[text end]"));
    }

    #[test]
    fn prompt_lists_every_warning_key() {
        for key in ["violence", "sexual_content", "abuse", "self_harm", "drug_use", "discrimination"] {
            assert!(TAG_SYSTEM_PROMPT.contains(key), "{key}");
        }
    }
}
