//! Prompt templates for chunk analysis
//!
//! The system instruction pins the reply to one JSON object with exactly four
//! fields. Field names and confidence levels keep the Portuguese vocabulary
//! the study's stored outputs were produced with.

/// Fixed system instruction sent with every chunk
pub const SYSTEM_PROMPT: &str = "\
You are an automated code smell detector.
For every code snippet you receive, reply with a single JSON object that has exactly these four fields:
- smells_detectados: list of smell names found in the snippet
- descricao: object mapping each smell name to a one-line description
- localizacao: object mapping each smell name to \"start-end\" line numbers, where line 1 is the first line of the snippet
- confianca: object mapping each smell name to one of \"alto\", \"médio\", \"baixo\"

Rules:
- Reply with the JSON object only. No markdown, no prose before or after it.
- Keep every description to a single line.
- If you find no smells, reply with an empty list and three empty objects.";

/// Placeholder replaced by the chunk text in the user message
const CODE_PLACEHOLDER: &str = "{code}";

/// System instruction plus user-message template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub system: String,
    pub user_template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            system: SYSTEM_PROMPT.to_string(),
            user_template: CODE_PLACEHOLDER.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Render the user payload for a chunk
    pub fn render_user(&self, code: &str) -> String {
        if self.user_template.contains(CODE_PLACEHOLDER) {
            self.user_template.replace(CODE_PLACEHOLDER, code)
        } else {
            format!("{}\n\n{}", self.user_template, code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_names_all_fields() {
        for field in ["smells_detectados", "descricao", "localizacao", "confianca"] {
            assert!(SYSTEM_PROMPT.contains(field), "missing {field}");
        }
        assert!(SYSTEM_PROMPT.contains("médio"));
    }

    #[test]
    fn test_default_template_is_the_code_itself() {
        let prompt = PromptTemplate::default();
        assert_eq!(prompt.render_user("int x = 1;"), "int x = 1;");
    }

    #[test]
    fn test_template_without_placeholder_appends_code() {
        let prompt = PromptTemplate {
            system: "sys".into(),
            user_template: "Analyze:".into(),
        };
        assert_eq!(prompt.render_user("x"), "Analyze:\n\nx");
    }
}
