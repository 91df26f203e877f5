//! Question value object

use serde::{Deserialize, Serialize};

/// The question posed to the expert panel (Value Object)
///
/// Carries the user's query and the optional supporting context that
/// accompanies it into every round prompt. The context arrives already
/// scrubbed - the orchestrator never sees raw sensitive data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    content: String,
    #[serde(default)]
    context: String,
}

impl Question {
    /// Create a new question
    ///
    /// # Panics
    /// Panics if the content is empty or only whitespace
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        assert!(!content.trim().is_empty(), "Question cannot be empty");
        Self {
            content,
            context: String::new(),
        }
    }

    /// Try to create a new question, returning None if invalid
    pub fn try_new(content: impl Into<String>) -> Option<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            None
        } else {
            Some(Self {
                content,
                context: String::new(),
            })
        }
    }

    /// Attach supporting context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Get the question content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Get the supporting context (may be empty)
    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn has_context(&self) -> bool {
        !self.context.trim().is_empty()
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.content)
    }
}

impl From<&str> for Question {
    fn from(s: &str) -> Self {
        Question::new(s)
    }
}

impl From<String> for Question {
    fn from(s: String) -> Self {
        Question::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_creation() {
        let q = Question::new("Should we adopt OAuth 2.0?");
        assert_eq!(q.content(), "Should we adopt OAuth 2.0?");
        assert!(!q.has_context());
    }

    #[test]
    #[should_panic]
    fn test_empty_question_panics() {
        Question::new("");
    }

    #[test]
    fn test_try_new_empty() {
        assert!(Question::try_new("").is_none());
        assert!(Question::try_new("   ").is_none());
    }

    #[test]
    fn test_with_context() {
        let q = Question::new("Which database?").with_context("We run on Postgres 14 today.");
        assert!(q.has_context());
        assert!(q.context().contains("Postgres"));
    }
}
