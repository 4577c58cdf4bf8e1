//! Conversation history
//!
//! Append-only log of the turns exchanged in one session. The turn arbiter
//! owns the only mutable handle; everything else reads.

use serde::Serialize;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human caller
    User,
    /// The automated agent
    Agent,
}

impl Role {
    /// Label used when formatting the transcript for generation
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Agent => "Assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

/// One attributed utterance; immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    role: Role,
    content: String,
    sequence_index: usize,
}

impl Turn {
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Position of this turn in the session, starting at zero
    #[must_use]
    pub const fn sequence_index(&self) -> usize {
        self.sequence_index
    }
}

/// Ordered, append-only sequence of turns
#[derive(Debug, Default, Clone, Serialize)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    /// Create an empty history
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Append a turn, returning the stored value
    pub fn push(&mut self, role: Role, content: impl Into<String>) -> &Turn {
        let sequence_index = self.turns.len();
        self.turns.push(Turn {
            role,
            content: content.into(),
            sequence_index,
        });
        &self.turns[sequence_index]
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Format the history as a single generation prompt
    ///
    /// The system instruction comes first, followed by a blank line and one
    /// `Role: content` line per turn in order.
    #[must_use]
    pub fn format_transcript(&self, system_instruction: &str) -> String {
        let mut out = String::with_capacity(
            system_instruction.len() + self.turns.iter().map(|t| t.content.len() + 12).sum::<usize>(),
        );
        out.push_str(system_instruction);
        out.push_str("\n\n");
        for turn in &self.turns {
            out.push_str(turn.role.label());
            out.push_str(": ");
            out.push_str(&turn.content);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_assigns_sequence_indices() {
        let mut history = ConversationHistory::new();
        history.push(Role::Agent, "Hello!");
        history.push(Role::User, "Hi");

        let indices: Vec<_> = history.turns().iter().map(Turn::sequence_index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(history.last().map(Turn::role), Some(Role::User));
    }

    #[test]
    fn push_never_reorders_existing_turns() {
        let mut history = ConversationHistory::new();
        history.push(Role::Agent, "first");
        let before = history.turns().to_vec();

        history.push(Role::User, "second");

        assert_eq!(&history.turns()[..1], before.as_slice());
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn format_transcript_lists_turns_after_instruction() {
        let mut history = ConversationHistory::new();
        history.push(Role::Agent, "Do you have five minutes?");
        history.push(Role::User, "Sure");

        let transcript = history.format_transcript("Be brief.");
        assert_eq!(
            transcript,
            "Be brief.\n\nAssistant: Do you have five minutes?\nUser: Sure\n"
        );
    }

    #[test]
    fn format_transcript_of_empty_history_is_instruction_only() {
        let history = ConversationHistory::new();
        assert_eq!(history.format_transcript("Be brief."), "Be brief.\n\n");
        assert!(history.is_empty());
    }
}
