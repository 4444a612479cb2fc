use serde::Deserialize;
use serde::Serialize;

use super::state::Message;
use super::state::PythonPhase;
use super::state::QuestionId;
use super::state::SourceMode;
use super::state::TableData;

#[derive(Debug, Clone)]
pub enum ChatAction {
    User(UserAction),
    Server(ServerAction),
}

#[derive(Debug, Clone)]
pub enum UserAction {
    Send { text: String },
    Cancel,
    NewDialog,
    WipeChat,
    SetSelectedFields(Vec<String>),
    ToggleField(String),
    AttachDocument(DocumentUpload),
    LoadHistory {
        id: i64,
        messages: Vec<Message>,
        selected_fields: Vec<String>,
    },
    UpdateKnowledgeBase,
    CopyLastAnswer,
    CopyTranscript,
}

// Outcome of a completed file upload, as classified by the backend (or,
// for images, prepared locally without a round trip).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentUpload {
    RagDocument {
        filename: String,
        temp_path: String,
    },
    Table {
        filename: String,
        table: TableData,
    },
    Text {
        filename: String,
        content: String,
    },
    Sql {
        filename: String,
        content: String,
    },
    Image {
        filename: String,
        image_b64: String,
    },
}

#[derive(Debug, Clone)]
pub enum ServerAction {
    Connected,
    Disconnected { reason: DisconnectReason },
    Status { message: String },
    AnswerMeta(AnswerMeta),
    AnswerChunk { text: String },
    GenerationCancelled,
    AnswerEnd,
    Clarification { question: String, options: Vec<String> },
    ServerError { message: String },
    PythonStatus(PythonPhase),
    PythonResult(PythonResult),
    PythonError {
        error: String,
        code: String,
        error_details: Option<String>,
    },
    RagStatus { status: String },
    Image(ImageEvent),
    // Unrecognized or undecodable frame; recorded and dropped, never
    // allowed to disturb the transcript.
    Malformed { event: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnswerMeta {
    pub source_mode: SourceMode,
    pub question_id: Option<QuestionId>,
    pub sources: Vec<String>,
    pub follow_ups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct PythonResult {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub html_plots: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub table: Option<TableData>,
    #[serde(default)]
    pub single_value: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ImageEvent {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image_b64: Option<String>,
    #[serde(default)]
    pub extended_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    ServerShutdown,
    TransportClose,
    PingTimeout,
    Other(String),
}

impl DisconnectReason {
    pub fn label(&self) -> &str {
        match self {
            Self::ServerShutdown => "server shutdown",
            Self::TransportClose => "transport close",
            Self::PingTimeout => "ping timeout",
            Self::Other(reason) => reason.as_str(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::ServerShutdown => {
                "The server has disconnected the session. This might be due to a server \
                 restart or an intentional shutdown."
                    .to_string()
            }
            Self::TransportClose => {
                "The connection was lost unexpectedly. Please check your internet \
                 connection. The server might also be temporarily unavailable or has \
                 been restarted."
                    .to_string()
            }
            Self::PingTimeout => {
                "The connection to the server was lost (ping timeout). The server may \
                 be overloaded or taking too long to respond. Please try your request \
                 again."
                    .to_string()
            }
            Self::Other(reason) => {
                format!("The connection was lost ({reason}). Please try your request again.")
            }
        }
    }
}

// Client -> server socket requests. The serde shape is the wire shape:
// `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientRequest {
    ChatMessage {
        message: String,
        selected_fields: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_b64: Option<String>,
    },
    PythonCodeRequest {
        message: String,
        selected_fields: Vec<String>,
    },
    DocumentQuestion {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        document_content: Option<String>,
        document_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        document_header: Option<Vec<String>>,
        file_type: String,
    },
    CancelGeneration,
    NewDialog,
    UpdateKnowledgeBase,
    ProcessDocumentForRag {
        temp_path: String,
    },
    ClearChatDisplay,
    LoadConversationHistory {
        messages: Vec<Message>,
        selected_fields: Vec<String>,
    },
}

impl ClientRequest {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::ChatMessage { .. } => "chat_message",
            Self::PythonCodeRequest { .. } => "python_code_request",
            Self::DocumentQuestion { .. } => "document_question",
            Self::CancelGeneration => "cancel_generation",
            Self::NewDialog => "new_dialog",
            Self::UpdateKnowledgeBase => "update_knowledge_base",
            Self::ProcessDocumentForRag { .. } => "process_document_for_rag",
            Self::ClearChatDisplay => "clear_chat_display",
            Self::LoadConversationHistory { .. } => "load_conversation_history",
        }
    }
}
