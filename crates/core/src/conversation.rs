//! Conversation history and lead record types.
//!
//! Both are owned exclusively by the session state machine; tools and the
//! reasoning loop only ever see snapshots or return values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm_types::{ToolCallRequest, ToolCallResult};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Caller,
    Agent,
}

/// One completed turn in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub turn_id: Uuid,
    /// Position in the history, assigned on append
    pub index: usize,
    pub speaker: Speaker,
    pub text: String,
    /// Tool calls resolved during this turn, paired 1:1 with their results
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<(ToolCallRequest, ToolCallResult)>,
    /// True when playback of this agent turn was cut short by barge-in
    #[serde(default)]
    pub interrupted: bool,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn caller(text: impl Into<String>) -> Self {
        Self::new(Speaker::Caller, text)
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(Speaker::Agent, text)
    }

    fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            index: 0,
            speaker,
            text: text.into(),
            tool_calls: Vec::new(),
            interrupted: false,
            timestamp: Utc::now(),
        }
    }

    pub fn with_tool_calls(mut self, calls: Vec<(ToolCallRequest, ToolCallResult)>) -> Self {
        self.tool_calls = calls;
        self
    }
}

/// Append-only ordered log of conversation turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn, assigning its index.
    pub fn push(&mut self, mut turn: ConversationTurn) -> &ConversationTurn {
        turn.index = self.turns.len();
        self.turns.push(turn);
        // just pushed, cannot be empty
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    /// Mark the most recent agent turn as interrupted.
    pub fn mark_last_agent_interrupted(&mut self) {
        if let Some(turn) = self
            .turns
            .iter_mut()
            .rev()
            .find(|t| t.speaker == Speaker::Agent)
        {
            turn.interrupted = true;
        }
    }

    /// Cheap snapshot handed to the reasoning loop.
    pub fn snapshot(&self) -> ConversationHistory {
        self.clone()
    }
}

/// Contact details accumulated across the conversation.
///
/// Merge semantics: a non-empty incoming field replaces its own slot (caller
/// corrections win) and never clears sibling fields; notes append.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_interest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LeadRecord {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.property_interest.is_none()
            && self.notes.is_none()
    }

    /// Merge newly captured fields into this record.
    pub fn merge(&mut self, update: LeadRecord) {
        fn fill(slot: &mut Option<String>, incoming: Option<String>) {
            if let Some(value) = incoming {
                if !value.trim().is_empty() {
                    *slot = Some(value);
                }
            }
        }

        fill(&mut self.name, update.name);
        fill(&mut self.email, update.email);
        fill(&mut self.phone, update.phone);
        fill(&mut self.property_interest, update.property_interest);

        if let Some(incoming) = update.notes {
            if !incoming.trim().is_empty() {
                self.notes = match self.notes.take() {
                    Some(existing) => Some(format!("{}; {}", existing, incoming)),
                    None => Some(incoming),
                };
            }
        }

        self.updated_at = Some(Utc::now());
    }
}
