use std::collections::VecDeque;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "you",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    #[serde(alias = "vector_store")]
    KnowledgeBase,
    WebSearch,
    ImageGeneration,
    RagDocument,
    #[default]
    #[serde(alias = "direct_answer")]
    None,
}

impl SourceMode {
    // Wire values as the backend routes them; anything unrecognized
    // degrades to None rather than rejecting the whole event.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "vector_store" | "knowledge_base" => Self::KnowledgeBase,
            "web_search" => Self::WebSearch,
            "image_generation" => Self::ImageGeneration,
            "rag_document" => Self::RagDocument,
            _ => Self::None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::KnowledgeBase => "knowledge-base",
            Self::WebSearch => "web",
            Self::ImageGeneration => "image",
            Self::RagDocument => "document",
            Self::None => "direct",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub url: Option<String>,
    pub image_b64: Option<String>,
    pub extended_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRun {
    pub code: String,
    pub explanation: Option<String>,
    pub error_details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Table,
    Text,
    Sql,
    RagDocument,
    Image,
}

impl DocumentKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Text => "text",
            Self::Sql => "sql",
            Self::RagDocument => "rag_document",
            Self::Image => "image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attachment {
    Plots { documents: Vec<String> },
    Images { images: Vec<String> },
    Table(TableData),
    SingleValue { value: String },
    GeneratedImage(GeneratedImage),
    FilePreview {
        name: String,
        file_kind: DocumentKind,
        table: Option<TableData>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub is_complete: bool,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub source_mode: SourceMode,
    #[serde(default)]
    pub question_id: Option<QuestionId>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub follow_ups: Vec<String>,
    #[serde(default)]
    pub clarification_options: Vec<String>,
    #[serde(default)]
    pub attachment: Option<Attachment>,
    #[serde(default)]
    pub code_run: Option<CodeRun>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            is_complete: true,
            is_error: false,
            source_mode: SourceMode::None,
            question_id: None,
            sources: Vec::new(),
            follow_ups: Vec::new(),
            clarification_options: Vec::new(),
            attachment: None,
            code_run: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            ..Self::user(content)
        }
    }

    pub fn is_open(&self) -> bool {
        self.role == Role::Assistant && !self.is_complete
    }

    // Text deltas only apply to an open assistant message without a rich
    // payload; an image placeholder must stay text-free.
    pub fn accepts_chunks(&self) -> bool {
        self.is_open() && self.attachment.is_none()
    }

    pub fn has_rich_payload(&self) -> bool {
        self.attachment.is_some() || self.code_run.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Generating {
        cancel_requested: bool,
    },
    CancelPending,
    AwaitingClarification,
}

impl SessionPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Generating {
                cancel_requested: false,
            } => "generating",
            Self::Generating {
                cancel_requested: true,
            } => "cancel-requested",
            Self::CancelPending => "cancel-pending",
            Self::AwaitingClarification => "awaiting-clarification",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PythonPhase {
    GeneratingCode { attempt: u32 },
    SecurityCheck,
    ExecutingCode,
}

impl PythonPhase {
    pub fn status_line(self) -> String {
        match self {
            Self::GeneratingCode { attempt } => {
                format!("Generating code (Attempt {attempt})...")
            }
            Self::SecurityCheck => "Performing security check...".to_string(),
            Self::ExecutingCode => "Executing Python code...".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    #[default]
    KnowledgeBase,
    DocumentChat,
    ImageChat,
}

impl ChatMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::KnowledgeBase => "knowledge-base",
            Self::DocumentChat => "document",
            Self::ImageChat => "image",
        }
    }

    pub fn is_document_bound(self) -> bool {
        matches!(self, Self::DocumentChat | Self::ImageChat)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentContext {
    pub name: String,
    // None for RAG documents; the backend holds the session content.
    pub content: Option<String>,
    pub header: Option<Vec<String>>,
    pub kind: DocumentKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl DiagnosticLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEntry {
    pub seq: u64,
    pub level: DiagnosticLevel,
    pub context: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DiagnosticsBuffer {
    cap: usize,
    next_seq: u64,
    buf: VecDeque<DiagnosticEntry>,
}

impl DiagnosticsBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            next_seq: 1,
            buf: VecDeque::with_capacity(cap),
        }
    }

    pub fn push(&mut self, level: DiagnosticLevel, context: Option<&str>, message: impl Into<String>) {
        let entry = DiagnosticEntry {
            seq: self.next_seq,
            level,
            context: context.map(str::to_string),
            message: message.into(),
        };
        self.next_seq += 1;

        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(entry);
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.next_seq = 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticEntry> {
        self.buf.iter()
    }

    pub fn last(&self) -> Option<&DiagnosticEntry> {
        self.buf.back()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Default for DiagnosticsBuffer {
    fn default() -> Self {
        Self::new(500)
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub transcript: Vec<Message>,
    pub phase: SessionPhase,
    pub chat_mode: ChatMode,
    pub document: Option<DocumentContext>,
    pub selected_fields: Vec<String>,
    pub last_generated_image: Option<String>,
    pub python_status: Option<PythonPhase>,
    pub status: String,
    pub processing_rag: bool,
    pub loaded_history_id: Option<i64>,
    pub diagnostics: DiagnosticsBuffer,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            transcript: Vec::new(),
            phase: SessionPhase::Idle,
            chat_mode: ChatMode::KnowledgeBase,
            document: None,
            selected_fields: Vec::new(),
            last_generated_image: None,
            python_status: None,
            status: "Connecting...".to_string(),
            processing_rag: false,
            loaded_history_id: None,
            diagnostics: DiagnosticsBuffer::default(),
        }
    }

    pub fn generation_in_flight(&self) -> bool {
        matches!(self.phase, SessionPhase::Generating { .. })
    }

    pub fn pending_cancellation(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::Generating {
                cancel_requested: true
            } | SessionPhase::CancelPending
        )
    }

    pub fn open_message(&self) -> Option<&Message> {
        self.transcript.last().filter(|message| message.is_open())
    }

    pub fn open_message_mut(&mut self) -> Option<&mut Message> {
        self.transcript
            .last_mut()
            .filter(|message| message.is_open())
    }

    // Full session reset: everything except the selected knowledge fields
    // and the diagnostics buffer starts over.
    pub fn reset(&mut self) {
        self.transcript.clear();
        self.phase = SessionPhase::Idle;
        self.chat_mode = ChatMode::KnowledgeBase;
        self.document = None;
        self.last_generated_image = None;
        self.python_status = None;
        self.processing_rag = false;
        self.loaded_history_id = None;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
