//! Conversation history and reply-prompt construction.

use std::time::SystemTime;

/// Who said a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One turn of the conversation, in arrival order.
#[derive(Debug, Clone)]
pub struct ConversationEntry {
    pub role: Role,
    pub text: String,
    pub timestamp: SystemTime,
}

impl ConversationEntry {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: SystemTime::now(),
        }
    }
}

/// Append-only conversation log.
///
/// Owned exclusively by the conversation loop thread; reply workers receive
/// immutable snapshots, never references into the log.
#[derive(Debug, Default)]
pub struct ConversationHistory {
    entries: Vec<ConversationEntry>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        self.entries.push(ConversationEntry::new(role, text));
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clone of the most recent `turns` entries, oldest first.
    ///
    /// The snapshot is taken at spawn time; replies that land later do not
    /// retroactively appear in it.
    pub fn snapshot(&self, turns: usize) -> Vec<ConversationEntry> {
        let start = self.entries.len().saturating_sub(turns);
        self.entries[start..].to_vec()
    }

    pub fn into_entries(self) -> Vec<ConversationEntry> {
        self.entries
    }
}

/// Render a context snapshot into a single reply prompt.
///
/// The latest user utterance is the final line of the snapshot, so the
/// prompt reads as a transcript ending with the line to respond to.
pub fn build_prompt(context: &[ConversationEntry]) -> String {
    let mut prompt = String::from(
        "You are having a spoken conversation. Reply briefly and naturally \
         to the last thing the user said.\n\n",
    );
    for entry in context {
        prompt.push_str(entry.role.label());
        prompt.push_str(": ");
        prompt.push_str(&entry.text);
        prompt.push('\n');
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_preserves_order() {
        let mut history = ConversationHistory::new();
        history.push(Role::User, "first");
        history.push(Role::Assistant, "second");
        history.push(Role::User, "third");

        let texts: Vec<_> = history.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert_eq!(history.entries()[0].role, Role::User);
        assert_eq!(history.entries()[1].role, Role::Assistant);
    }

    #[test]
    fn test_snapshot_takes_last_n() {
        let mut history = ConversationHistory::new();
        for i in 0..8 {
            history.push(Role::User, format!("turn {i}"));
        }

        let snapshot = history.snapshot(5);
        assert_eq!(snapshot.len(), 5);
        assert_eq!(snapshot[0].text, "turn 3");
        assert_eq!(snapshot[4].text, "turn 7");
    }

    #[test]
    fn test_snapshot_of_short_history_is_everything() {
        let mut history = ConversationHistory::new();
        history.push(Role::User, "only one");

        assert_eq!(history.snapshot(5).len(), 1);
        assert!(ConversationHistory::new().snapshot(5).is_empty());
    }

    #[test]
    fn test_snapshot_is_detached_from_later_pushes() {
        let mut history = ConversationHistory::new();
        history.push(Role::User, "before");
        let snapshot = history.snapshot(5);

        history.push(Role::Assistant, "after");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].text, "before");
    }

    #[test]
    fn test_prompt_ends_with_latest_utterance() {
        let mut history = ConversationHistory::new();
        history.push(Role::User, "hello");
        history.push(Role::Assistant, "hi there");
        history.push(Role::User, "how are you");

        let prompt = build_prompt(&history.snapshot(5));
        assert!(prompt.ends_with("User: how are you\n"));
        assert!(prompt.contains("Assistant: hi there\n"));
    }
}
