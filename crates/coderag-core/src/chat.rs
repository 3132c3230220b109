//! Chat history types and their serialization into prompt text.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use coderag_config::HistoryFormat;

/// Who spoke a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One historical exchange entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Serializes a chat history into the text embedded in prompts.
pub type HistoryFormatter = Arc<dyn Fn(&[ChatTurn]) -> String + Send + Sync>;

/// Default transcript: every turn on its own line, prefixed `Human: ` or
/// `Assistant: `, each line preceded by a newline.
pub fn format_transcript(history: &[ChatTurn]) -> String {
    let mut buffer = String::new();
    for turn in history {
        let prefix = match turn.role {
            Role::User => "Human: ",
            Role::Assistant => "Assistant: ",
        };
        buffer.push('\n');
        buffer.push_str(prefix);
        buffer.push_str(&turn.content);
    }
    buffer
}

/// `role: content` lines joined by newlines.
pub fn format_plain(history: &[ChatTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The formatter selected by `pipeline.history_format`.
pub fn formatter_for(format: HistoryFormat) -> HistoryFormatter {
    match format {
        HistoryFormat::Transcript => Arc::new(format_transcript),
        HistoryFormat::Plain => Arc::new(format_plain),
    }
}
