//! Prompt construction for sender classification

/// Builds classification prompts
///
/// The prompt carries a bounded excerpt of the document text plus metadata
/// hints: the canonical sender names already known and the folders that
/// already exist in the archive.
pub struct PromptBuilder {
    excerpt: String,
    known_labels: Vec<String>,
    existing_folders: Vec<String>,
    max_hints: usize,
}

impl PromptBuilder {
    /// Create a new prompt builder for an excerpt
    pub fn new(excerpt: impl Into<String>) -> Self {
        Self {
            excerpt: excerpt.into(),
            known_labels: Vec::new(),
            existing_folders: Vec::new(),
            max_hints: usize::MAX,
        }
    }

    /// Add the canonical sender names the model should prefer
    pub fn with_known_labels(mut self, labels: &[String]) -> Self {
        self.known_labels = labels.to_vec();
        self
    }

    /// Add the folder names already present in the archive
    pub fn with_existing_folders(mut self, folders: &[String]) -> Self {
        self.existing_folders = folders.to_vec();
        self
    }

    /// Cap the number of entries listed per hint section
    pub fn with_max_hints(mut self, max_hints: usize) -> Self {
        self.max_hints = max_hints;
        self
    }

    /// Build the complete classification prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str(CLASSIFICATION_INSTRUCTIONS);
        prompt.push_str("\n\n");

        push_hint_section(&mut prompt, "Known senders", &self.known_labels, self.max_hints);
        push_hint_section(
            &mut prompt,
            "Existing archive folders",
            &self.existing_folders,
            self.max_hints,
        );

        prompt.push_str("Document text (may contain OCR noise):\n");
        prompt.push_str("<<<BEGIN_TEXT\n");
        prompt.push_str(&self.excerpt);
        prompt.push_str("\nEND_TEXT>>>\n\n");

        prompt.push_str(OUTPUT_FORMAT_REMINDER);
        prompt
    }
}

fn push_hint_section(prompt: &mut String, title: &str, entries: &[String], max: usize) {
    if entries.is_empty() {
        return;
    }
    prompt.push_str(title);
    prompt.push_str(":\n");
    for entry in entries.iter().take(max) {
        prompt.push_str("- ");
        prompt.push_str(entry);
        prompt.push('\n');
    }
    prompt.push('\n');
}

/// Cut `text` to at most `max_chars` characters on a char boundary
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

const CLASSIFICATION_INSTRUCTIONS: &str = r#"You are a document classifier for a personal paper archive.
Identify the sender (company, authority or person) of the scanned document below.

Rules:
- Prefer a name from "Known senders" when one matches.
- Use the sender's short canonical name, not an address or department.
- Never copy account numbers, customer numbers, dates or personal names of the recipient.
- confidence is a number between 0.0 and 1.0; stay below 0.7 when unsure.
- If you cannot tell who sent the document, answer with the label "unclear"."#;

const OUTPUT_FORMAT_REMINDER: &str = r#"Output format (one JSON object only, no markdown, no commentary):
{"label": "sender name", "confidence": 0.0}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_excerpt_and_format() {
        let prompt = PromptBuilder::new("Rechnung Nr. 17").build();

        assert!(prompt.contains("Rechnung Nr. 17"));
        assert!(prompt.contains("<<<BEGIN_TEXT"));
        assert!(prompt.contains(r#""label""#));
        assert!(!prompt.contains("Known senders:"));
    }

    #[test]
    fn test_prompt_lists_hints() {
        let labels = vec!["Stadtwerke".to_string(), "Finanzamt".to_string()];
        let folders = vec!["Versicherung".to_string()];
        let prompt = PromptBuilder::new("text")
            .with_known_labels(&labels)
            .with_existing_folders(&folders)
            .build();

        assert!(prompt.contains("Known senders:\n- Stadtwerke\n- Finanzamt\n"));
        assert!(prompt.contains("Existing archive folders:\n- Versicherung\n"));
    }

    #[test]
    fn test_hint_cap() {
        let labels: Vec<String> = (0..10).map(|i| format!("Sender{}", i)).collect();
        let prompt = PromptBuilder::new("text")
            .with_known_labels(&labels)
            .with_max_hints(3)
            .build();

        assert!(prompt.contains("- Sender2\n"));
        assert!(!prompt.contains("- Sender3\n"));
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("Grüße aus Köln", 4), "Grüß");
        assert_eq!(excerpt("short", 100), "short");
        assert_eq!(excerpt("", 3), "");
    }
}
