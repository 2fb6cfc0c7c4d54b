//! Persona configuration and the system prompt it renders.

use serde::{Deserialize, Serialize};

/// Who the assistant speaks for, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    /// Person the knowledge document describes.
    pub owner_name: String,

    /// Conversational tone, e.g. "friendly" or "formal".
    pub tone: String,
}

impl PersonaConfig {
    pub const DEFAULT_OWNER_NAME: &'static str = "Your Name";
    pub const DEFAULT_TONE: &'static str = "friendly";

    /// Set the owner name.
    pub fn with_owner_name(mut self, owner_name: impl Into<String>) -> Self {
        self.owner_name = owner_name.into();
        self
    }

    /// Set the tone.
    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = tone.into();
        self
    }

    /// The system prompt for this persona.
    pub fn system_prompt(&self) -> String {
        build_system_prompt(&self.owner_name, &self.tone)
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            owner_name: Self::DEFAULT_OWNER_NAME.to_string(),
            tone: Self::DEFAULT_TONE.to_string(),
        }
    }
}

/// Render the assistant persona and answering rules.
pub fn build_system_prompt(owner_name: &str, tone: &str) -> String {
    let tone = tone.trim().to_lowercase();
    format!(
        "You are ResumeGPT, a helpful, {tone} AI assistant for {owner_name}.\n\
         Answer questions about {owner_name}'s background, skills, and projects using provided context.\n\
         \n\
         Rules:\n\
         - Be concise; use bullet points for lists.\n\
         - If info not in context, avoid inventing details about the person.\n\
         - Cite sources inline as [S#] when using context.\n\
         - Ask for clarification if needed.\n\
         - Professional, safe tone."
    )
}
