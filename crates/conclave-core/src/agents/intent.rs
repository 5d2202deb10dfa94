//! Intent extraction
//!
//! Classifies a model reply into an [`Intent`], maps it to an action and checks the
//! action against what the agent is allowed to do. A mismatch is recorded, not raised.

use super::definition::AgentDefinition;
use serde::Serialize;
use std::fmt;

/// What a reply asks the system to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Create a new agent
    CreateAgent,
    /// Modify a file
    UpdateFile,
    /// Run a shell command
    ExecuteCommand,
    /// Nothing actionable
    None,
}

impl Intent {
    /// Action required to carry out this intent
    #[must_use]
    pub fn action(&self) -> Option<&'static str> {
        match self {
            Self::CreateAgent => Some("create_file"),
            Self::UpdateFile => Some("update_file"),
            Self::ExecuteCommand => Some("execute_command"),
            Self::None => None,
        }
    }

    /// Snake-case name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateAgent => "create_agent",
            Self::UpdateFile => "update_file",
            Self::ExecuteCommand => "execute_command",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy for reading an intent out of free text
pub trait IntentExtractor: Send + Sync {
    /// Classify `text`
    fn extract(&self, text: &str) -> Intent;
}

/// Keyword matcher (English and Arabic phrases)
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordIntentExtractor;

impl IntentExtractor for KeywordIntentExtractor {
    fn extract(&self, text: &str) -> Intent {
        let normalized = text.to_lowercase();

        if normalized.contains("create agent") || normalized.contains("إنشاء وكيل") {
            Intent::CreateAgent
        } else if normalized.contains("update file") || normalized.contains("تعديل ملف") {
            Intent::UpdateFile
        } else if normalized.contains("[execute_command]") {
            Intent::ExecuteCommand
        } else {
            Intent::None
        }
    }
}

/// Outcome of checking a reply's intent against an agent's permissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionCheck {
    /// Extracted intent
    pub intent: Intent,
    /// Required action, if any
    pub action: Option<String>,
    /// Whether the agent may perform it
    pub allowed: bool,
}

impl ActionCheck {
    /// Classify `text` and check the resulting action against `agent.actions`
    #[must_use]
    pub fn evaluate(extractor: &dyn IntentExtractor, text: &str, agent: &AgentDefinition) -> Self {
        let intent = extractor.extract(text);
        let action = intent.action();
        let allowed = action.is_none_or(|a| agent.actions.contains(a));

        Self {
            intent,
            action: action.map(str::to_string),
            allowed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_extraction() {
        let extractor = KeywordIntentExtractor;
        assert_eq!(extractor.extract("Please CREATE AGENT for me"), Intent::CreateAgent);
        assert_eq!(extractor.extract("أريد إنشاء وكيل جديد"), Intent::CreateAgent);
        assert_eq!(extractor.extract("update file README.md"), Intent::UpdateFile);
        assert_eq!(extractor.extract("يرجى تعديل ملف"), Intent::UpdateFile);
        assert_eq!(
            extractor.extract("[EXECUTE_COMMAND]ls -la[/EXECUTE_COMMAND]"),
            Intent::ExecuteCommand
        );
        assert_eq!(extractor.extract("APPROVE"), Intent::None);
    }

    #[test]
    fn test_intent_to_action() {
        assert_eq!(Intent::CreateAgent.action(), Some("create_file"));
        assert_eq!(Intent::UpdateFile.action(), Some("update_file"));
        assert_eq!(Intent::ExecuteCommand.action(), Some("execute_command"));
        assert_eq!(Intent::None.action(), None);
    }

    #[test]
    fn test_action_check() {
        let extractor = KeywordIntentExtractor;
        let agent = AgentDefinition::new("a", "A", "r").with_action("create_file");

        let allowed = ActionCheck::evaluate(&extractor, "create agent now", &agent);
        assert!(allowed.allowed);
        assert_eq!(allowed.action.as_deref(), Some("create_file"));

        let denied = ActionCheck::evaluate(&extractor, "update file x", &agent);
        assert!(!denied.allowed);
        assert_eq!(denied.intent, Intent::UpdateFile);

        let nothing = ActionCheck::evaluate(&extractor, "looks fine", &agent);
        assert!(nothing.allowed);
        assert!(nothing.action.is_none());
    }

    #[test]
    fn test_action_check_serializes() {
        let check = ActionCheck {
            intent: Intent::CreateAgent,
            action: Some("create_file".to_string()),
            allowed: false,
        };
        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["intent"], "create_agent");
        assert_eq!(json["allowed"], false);
    }
}
