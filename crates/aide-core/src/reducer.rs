#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Emit(ClientRequest),
    RequestFrame,
    CopyToClipboard(String),
    PersistTranscript {
        title: String,
        messages: Vec<Message>,
        selected_fields: Vec<String>,
    },
    DeleteHistoryEntry(i64),
}

use super::actions::AnswerMeta;
use super::actions::ChatAction;
use super::actions::ClientRequest;
use super::actions::DocumentUpload;
use super::actions::ImageEvent;
use super::actions::PythonResult;
use super::actions::ServerAction;
use super::actions::UserAction;
use super::history;
use super::state::Attachment;
use super::state::ChatMode;
use super::state::CodeRun;
use super::state::DiagnosticLevel;
use super::state::DocumentContext;
use super::state::DocumentKind;
use super::state::GeneratedImage;
use super::state::Message;
use super::state::Role;
use super::state::SessionPhase;
use super::state::SessionState;
use super::state::SourceMode;
use super::state::TableData;

pub const CANCELLED_NOTICE: &str = "Generation was cancelled.";
pub const CANCELLED_SUFFIX: &str = "\n\n*(Generation cancelled)*";
const CANCEL_NOTICE_THRESHOLD: usize = 20;

pub const PYTHON_COMMAND_PREFIX: &str = "/py";

pub fn reduce(state: &mut SessionState, action: ChatAction) -> Vec<Effect> {
    match action {
        ChatAction::User(user) => reduce_user(state, user),
        ChatAction::Server(server) => {
            reduce_server(state, server);
            Vec::new()
        }
    }
}

fn reduce_user(state: &mut SessionState, action: UserAction) -> Vec<Effect> {
    match action {
        UserAction::Send { text } => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Vec::new();
            }
            if trimmed.starts_with('/') && !is_python_request(trimmed) {
                return handle_command(state, trimmed);
            }
            if state.generation_in_flight() {
                state.diagnostics.push(
                    DiagnosticLevel::Warn,
                    Some("send"),
                    "send ignored while a generation is in flight",
                );
                return vec![Effect::RequestFrame];
            }

            let mut effects = Vec::new();
            // A restored saved chat is superseded by the first new question.
            if let Some(id) = state.loaded_history_id.take() {
                effects.push(Effect::DeleteHistoryEntry(id));
            }

            state.transcript.push(Message::user(trimmed));
            let request = outgoing_question(state, trimmed);
            state.phase = SessionPhase::Generating {
                cancel_requested: false,
            };
            state.status = "Thinking...".to_string();

            effects.push(Effect::Emit(request));
            effects.push(Effect::RequestFrame);
            effects
        }
        UserAction::Cancel => {
            if !state.generation_in_flight() {
                return Vec::new();
            }
            state.phase = SessionPhase::Generating {
                cancel_requested: true,
            };
            state.status = "Cancelling...".to_string();
            vec![
                Effect::Emit(ClientRequest::CancelGeneration),
                Effect::RequestFrame,
            ]
        }
        UserAction::NewDialog => {
            let mut effects = Vec::new();
            if state.chat_mode == ChatMode::KnowledgeBase
                && state.document.is_none()
                && history::is_saveable(&state.transcript)
            {
                effects.push(Effect::PersistTranscript {
                    title: history::save_title(&state.transcript),
                    messages: state.transcript.clone(),
                    selected_fields: state.selected_fields.clone(),
                });
            }
            effects.push(Effect::Emit(ClientRequest::NewDialog));
            state.reset();
            state.status = "Ready".to_string();
            effects.push(Effect::RequestFrame);
            effects
        }
        UserAction::WipeChat => {
            state.reset();
            state.status = "Chat cleared. Ready for new conversation.".to_string();
            vec![
                Effect::Emit(ClientRequest::ClearChatDisplay),
                Effect::RequestFrame,
            ]
        }
        UserAction::SetSelectedFields(fields) => {
            state.selected_fields = fields;
            vec![Effect::RequestFrame]
        }
        UserAction::ToggleField(field) => {
            if let Some(idx) = state.selected_fields.iter().position(|f| *f == field) {
                state.selected_fields.remove(idx);
            } else {
                state.selected_fields.push(field);
            }
            vec![Effect::RequestFrame]
        }
        UserAction::AttachDocument(upload) => attach_document(state, upload),
        UserAction::LoadHistory {
            id,
            messages,
            selected_fields,
        } => {
            state.reset();
            state.transcript = history::restore_messages(messages);
            state.selected_fields = selected_fields;
            state.loaded_history_id = Some(id);
            state.status = "Chat history loaded".to_string();

            let mut effects = Vec::new();
            if !state.transcript.is_empty() {
                effects.push(Effect::Emit(ClientRequest::LoadConversationHistory {
                    messages: state.transcript.clone(),
                    selected_fields: state.selected_fields.clone(),
                }));
            }
            effects.push(Effect::RequestFrame);
            effects
        }
        UserAction::UpdateKnowledgeBase => {
            state.status = "Updating knowledge base...".to_string();
            vec![
                Effect::Emit(ClientRequest::UpdateKnowledgeBase),
                Effect::RequestFrame,
            ]
        }
        UserAction::CopyLastAnswer => {
            if let Some(text) = latest_assistant_text(state) {
                state.status = "Copied last answer to clipboard".to_string();
                vec![Effect::CopyToClipboard(text), Effect::RequestFrame]
            } else {
                state.status = "No assistant response available to copy".to_string();
                vec![Effect::RequestFrame]
            }
        }
        UserAction::CopyTranscript => {
            if let Some(text) = transcript_text(state) {
                state.status = "Copied chat transcript to clipboard".to_string();
                vec![Effect::CopyToClipboard(text), Effect::RequestFrame]
            } else {
                state.status = "No chat transcript available to copy".to_string();
                vec![Effect::RequestFrame]
            }
        }
    }
}

fn handle_command(state: &mut SessionState, input: &str) -> Vec<Effect> {
    let mut parts = input.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let argument_tail = input
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .unwrap_or("");

    match command {
        "/new" => reduce_user(state, UserAction::NewDialog),
        "/wipe" => reduce_user(state, UserAction::WipeChat),
        "/copylast" => reduce_user(state, UserAction::CopyLastAnswer),
        "/copychat" => reduce_user(state, UserAction::CopyTranscript),
        "/fields" => {
            if argument_tail.is_empty() {
                state.status = if state.selected_fields.is_empty() {
                    "Fields: (all)".to_string()
                } else {
                    format!("Fields: {}", state.selected_fields.join(", "))
                };
                vec![Effect::RequestFrame]
            } else if argument_tail.eq_ignore_ascii_case("clear") {
                reduce_user(state, UserAction::SetSelectedFields(Vec::new()))
            } else {
                let fields = argument_tail
                    .split(',')
                    .map(|field| field.trim().to_string())
                    .filter(|field| !field.is_empty())
                    .collect();
                reduce_user(state, UserAction::SetSelectedFields(fields))
            }
        }
        "/help" => {
            state.status = "Commands: /py <question>, /fields [list|clear], /copylast, \
                            /copychat, /new, /wipe, /attach <path>, /quit, /help"
                .to_string();
            vec![Effect::RequestFrame]
        }
        _ => {
            state.status = format!("Unknown command '{command}'");
            vec![Effect::RequestFrame]
        }
    }
}

fn outgoing_question(state: &SessionState, message: &str) -> ClientRequest {
    if state.chat_mode.is_document_bound() {
        if let Some(document) = state.document.as_ref() {
            return ClientRequest::DocumentQuestion {
                message: message.to_string(),
                // RAG sessions keep the content server-side.
                document_content: if document.kind == DocumentKind::RagDocument {
                    None
                } else {
                    document.content.clone()
                },
                document_name: document.name.clone(),
                document_header: document.header.clone(),
                file_type: document.kind.label().to_string(),
            };
        }
    }
    if is_python_request(message) {
        return ClientRequest::PythonCodeRequest {
            message: message.to_string(),
            selected_fields: state.selected_fields.clone(),
        };
    }
    ClientRequest::ChatMessage {
        message: message.to_string(),
        selected_fields: state.selected_fields.clone(),
        image_b64: state.last_generated_image.clone(),
    }
}

fn is_python_request(message: &str) -> bool {
    message
        .trim()
        .to_ascii_lowercase()
        .starts_with(PYTHON_COMMAND_PREFIX)
}

fn attach_document(state: &mut SessionState, upload: DocumentUpload) -> Vec<Effect> {
    match upload {
        DocumentUpload::RagDocument {
            filename,
            temp_path,
        } => {
            state.document = Some(DocumentContext {
                name: filename.clone(),
                content: None,
                header: None,
                kind: DocumentKind::RagDocument,
            });
            state.chat_mode = ChatMode::DocumentChat;
            state.processing_rag = true;
            state.status = "Preparing document for analysis...".to_string();
            state.transcript.push(Message::assistant(format!(
                "I've loaded the document **{filename}**. I'm preparing it for your \
                 questions. This may take a moment..."
            )));
            vec![
                Effect::Emit(ClientRequest::ProcessDocumentForRag { temp_path }),
                Effect::RequestFrame,
            ]
        }
        DocumentUpload::Table { filename, table } => {
            state.document = Some(DocumentContext {
                name: filename.clone(),
                content: Some(markdown_table(&table)),
                header: Some(table.columns.clone()),
                kind: DocumentKind::Table,
            });
            state.chat_mode = ChatMode::DocumentChat;
            state.status = "Ready".to_string();
            let mut ack = Message::assistant(format!(
                "I have read the file {filename}. What do you want to know about it?"
            ));
            ack.attachment = Some(Attachment::FilePreview {
                name: filename,
                file_kind: DocumentKind::Table,
                table: Some(table),
            });
            state.transcript.push(ack);
            vec![Effect::RequestFrame]
        }
        DocumentUpload::Text { filename, content } => {
            attach_plain_document(state, filename, content, DocumentKind::Text)
        }
        DocumentUpload::Sql { filename, content } => {
            attach_plain_document(state, filename, content, DocumentKind::Sql)
        }
        DocumentUpload::Image {
            filename,
            image_b64,
        } => {
            state.document = Some(DocumentContext {
                name: filename.clone(),
                content: Some(image_b64),
                header: None,
                kind: DocumentKind::Image,
            });
            state.chat_mode = ChatMode::ImageChat;
            state.status = "Ready".to_string();
            let mut ack = Message::assistant(format!(
                "I've loaded the image **{filename}**. What would you like to know \
                 about it?"
            ));
            ack.attachment = Some(Attachment::FilePreview {
                name: filename,
                file_kind: DocumentKind::Image,
                table: None,
            });
            state.transcript.push(ack);
            vec![Effect::RequestFrame]
        }
    }
}

fn attach_plain_document(
    state: &mut SessionState,
    filename: String,
    content: String,
    kind: DocumentKind,
) -> Vec<Effect> {
    state.document = Some(DocumentContext {
        name: filename.clone(),
        content: Some(content),
        header: None,
        kind,
    });
    state.chat_mode = ChatMode::DocumentChat;
    state.status = "Ready".to_string();
    let mut ack = Message::assistant(format!(
        "I have read the file {filename}. What do you want to know about it?"
    ));
    ack.attachment = Some(Attachment::FilePreview {
        name: filename,
        file_kind: kind,
        table: None,
    });
    state.transcript.push(ack);
    vec![Effect::RequestFrame]
}

fn reduce_server(state: &mut SessionState, action: ServerAction) {
    match action {
        ServerAction::Connected => {
            state.status = "Connected".to_string();
        }
        ServerAction::Disconnected { reason } => {
            let mut notice = Message::assistant(reason.user_message());
            notice.is_error = true;
            state.transcript.push(notice);
            state.phase = SessionPhase::Idle;
            state.python_status = None;
            state.status = format!("Disconnected: {}", reason.label());
        }
        ServerAction::Status { message } => {
            state.status = message;
        }
        ServerAction::AnswerMeta(meta) => {
            apply_answer_meta(state, meta);
        }
        ServerAction::AnswerChunk { text } => match state.transcript.last_mut() {
            Some(message) if message.accepts_chunks() => {
                message.content.push_str(&text);
            }
            _ => {
                state.diagnostics.push(
                    DiagnosticLevel::Warn,
                    Some("answer_chunk"),
                    "dropped delta without an open text answer",
                );
            }
        },
        ServerAction::GenerationCancelled => {
            if state.generation_in_flight() {
                state.phase = SessionPhase::CancelPending;
            } else {
                state.diagnostics.push(
                    DiagnosticLevel::Debug,
                    Some("generation_cancelled"),
                    "cancellation confirmed with no generation in flight",
                );
            }
        }
        ServerAction::AnswerEnd => {
            let cancelled = state.pending_cancellation();
            match state.transcript.last_mut().filter(|m| m.is_open()) {
                Some(message) => {
                    message.is_complete = true;
                    if cancelled {
                        if message.content.trim().chars().count() < CANCEL_NOTICE_THRESHOLD {
                            message.content = CANCELLED_NOTICE.to_string();
                        } else {
                            message.content.push_str(CANCELLED_SUFFIX);
                        }
                        message.follow_ups.clear();
                    }
                }
                None => {
                    state.diagnostics.push(
                        DiagnosticLevel::Warn,
                        Some("answer_end"),
                        "answer_end without an open answer",
                    );
                }
            }
            state.phase = SessionPhase::Idle;
            state.status = if cancelled {
                "Generation cancelled.".to_string()
            } else {
                "Ready".to_string()
            };
        }
        ServerAction::Clarification { question, options } => {
            let mut message = Message::assistant(question);
            message.clarification_options = options;
            state.transcript.push(message);
            state.phase = SessionPhase::AwaitingClarification;
            state.status = "Awaiting clarification...".to_string();
        }
        ServerAction::ServerError { message } => {
            state.status = format!("Error: {message}");
            state.phase = SessionPhase::Idle;
            state.python_status = None;
            state
                .diagnostics
                .push(DiagnosticLevel::Error, Some("server"), message);
        }
        ServerAction::PythonStatus(phase) => {
            state.status = phase.status_line();
            state.python_status = Some(phase);
        }
        ServerAction::PythonResult(result) => {
            state.python_status = None;
            state.phase = SessionPhase::Idle;
            state.status = "Ready".to_string();
            state.transcript.push(python_result_message(result));
        }
        ServerAction::PythonError {
            error,
            code,
            error_details,
        } => {
            state.python_status = None;
            state.phase = SessionPhase::Idle;
            state.status = "Error during Python execution. See details below.".to_string();
            let mut message = Message::assistant(error);
            message.is_error = true;
            message.code_run = Some(CodeRun {
                code,
                explanation: None,
                error_details,
            });
            state.transcript.push(message);
        }
        ServerAction::RagStatus { status } => {
            if status == "ready" {
                // Preprocessing done; the placeholder conversation is discarded.
                state.transcript.clear();
                state.processing_rag = false;
                state.status = "Ready".to_string();
            } else {
                state.diagnostics.push(
                    DiagnosticLevel::Debug,
                    Some("rag_status"),
                    format!("ignoring status '{status}'"),
                );
            }
        }
        ServerAction::Image(event) => {
            apply_image(state, event);
        }
        ServerAction::Malformed { event, reason } => {
            state
                .diagnostics
                .push(DiagnosticLevel::Warn, Some(event.as_str()), reason);
        }
    }
}

fn apply_answer_meta(state: &mut SessionState, meta: AnswerMeta) {
    if let Some(open) = state.transcript.last_mut().filter(|m| m.is_open()) {
        open.is_complete = true;
        state.diagnostics.push(
            DiagnosticLevel::Warn,
            Some("answer_meta"),
            "closed stale open answer before starting a new one",
        );
    }
    let message = Message {
        role: Role::Assistant,
        content: String::new(),
        is_complete: false,
        is_error: false,
        source_mode: meta.source_mode,
        question_id: meta.question_id,
        sources: meta.sources,
        follow_ups: meta.follow_ups,
        clarification_options: Vec::new(),
        attachment: None,
        code_run: None,
    };
    state.transcript.push(message);
}

fn python_result_message(result: PythonResult) -> Message {
    let PythonResult {
        code,
        explanation,
        html_plots,
        images,
        table,
        single_value,
        output,
    } = result;

    let code_run = code.map(|code| CodeRun {
        code,
        explanation,
        error_details: None,
    });

    // Fixed payload precedence: plots > images > table > scalar > text.
    let (content, attachment) = if !html_plots.is_empty() {
        (
            String::new(),
            Some(Attachment::Plots {
                documents: html_plots,
            }),
        )
    } else if !images.is_empty() {
        (String::new(), Some(Attachment::Images { images }))
    } else if let Some(table) = table {
        (String::new(), Some(Attachment::Table(table)))
    } else if let Some(value) = single_value {
        (String::new(), Some(Attachment::SingleValue { value }))
    } else {
        (output.unwrap_or_default(), None)
    };

    let mut message = Message::assistant(content);
    message.attachment = attachment;
    message.code_run = code_run;
    message
}

fn apply_image(state: &mut SessionState, event: ImageEvent) {
    let ImageEvent {
        url,
        image_b64,
        extended_prompt,
    } = event;

    if let Some(b64) = image_b64.as_ref() {
        state.last_generated_image = Some(b64.clone());
    }

    let image = GeneratedImage {
        url,
        image_b64,
        extended_prompt,
    };

    let has_placeholder = state
        .transcript
        .last()
        .is_some_and(|message| {
            message.is_open() && message.source_mode == SourceMode::ImageGeneration
        });

    if has_placeholder {
        if let Some(message) = state.transcript.last_mut() {
            message.attachment = Some(Attachment::GeneratedImage(image));
            message.is_complete = true;
            message.content.clear();
        }
    } else {
        // Out-of-order delivery: keep the answer as a standalone message
        // rather than dropping it.
        let mut message = Message::assistant("");
        message.source_mode = SourceMode::ImageGeneration;
        message.attachment = Some(Attachment::GeneratedImage(image));
        state.transcript.push(message);
    }

    state.phase = SessionPhase::Idle;
    state.status = "Ready".to_string();
}

fn markdown_table(table: &TableData) -> String {
    let header = format!("| {} |", table.columns.join(" | "));
    let separator = format!(
        "| {} |",
        table
            .columns
            .iter()
            .map(|_| "---")
            .collect::<Vec<_>>()
            .join(" | ")
    );
    let rows = table
        .rows
        .iter()
        .map(|row| {
            format!(
                "| {} |",
                row.iter().map(cell_text).collect::<Vec<_>>().join(" | ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{header}\n{separator}\n{rows}")
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn latest_assistant_text(state: &SessionState) -> Option<String> {
    state
        .transcript
        .iter()
        .rev()
        .find(|message| {
            message.role == Role::Assistant
                && message.is_complete
                && !message.is_error
                && !message.content.trim().is_empty()
        })
        .map(|message| message.content.clone())
}

fn transcript_text(state: &SessionState) -> Option<String> {
    if state.transcript.is_empty() {
        return None;
    }
    let text = state
        .transcript
        .iter()
        .map(|message| format!("{}: {}", message.role.label(), message.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    Some(text)
}

#[cfg(test)]
mod tests;
