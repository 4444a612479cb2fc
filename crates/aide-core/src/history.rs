use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::state::Message;
use super::state::Role;

const TITLE_MAX_CHARS: usize = 47;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedChat {
    pub id: i64,
    pub title: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub selected_fields: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSavedChat {
    pub title: String,
    pub messages: Vec<Message>,
    pub selected_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedChatSummary {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// A restored transcript may contain an answer that was still streaming
// when it was saved. Replaying it must not resurrect an open message.
pub fn restore_messages(messages: Vec<Message>) -> Vec<Message> {
    messages
        .into_iter()
        .map(|mut message| {
            message.is_complete = true;
            message
        })
        .collect()
}

// Only plain question/answer exchanges are worth auto-saving: uploads,
// generated images, tables and code runs do not survive a round trip.
pub fn is_saveable(messages: &[Message]) -> bool {
    if messages.len() < 2 {
        return false;
    }
    let has_rich_content = messages.iter().any(Message::has_rich_payload);
    let has_user_text = messages
        .iter()
        .any(|message| message.role == Role::User && !message.content.trim().is_empty());
    !has_rich_content && has_user_text
}

pub fn save_title(messages: &[Message]) -> String {
    let first_question = messages
        .iter()
        .find(|message| message.role == Role::User && !message.content.trim().is_empty())
        .map(|message| message.content.trim());

    match first_question {
        Some(question) if question.chars().count() > TITLE_MAX_CHARS => {
            let truncated: String = question.chars().take(TITLE_MAX_CHARS).collect();
            format!("{truncated}...")
        }
        Some(question) => question.to_string(),
        None => "Auto-saved Chat".to_string(),
    }
}
