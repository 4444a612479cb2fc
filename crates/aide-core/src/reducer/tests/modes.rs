use super::*;
use pretty_assertions::assert_eq;

fn table() -> TableData {
    TableData {
        columns: vec!["id".to_string(), "name".to_string()],
        rows: vec![vec![
            serde_json::Value::from(1),
            serde_json::Value::String("alpha".to_string()),
        ]],
    }
}

#[test]
fn knowledge_base_question_emits_chat_message_with_fields() {
    let mut state = state();
    let effects = send(&mut state, "What changed?");

    match emitted_requests(&effects).as_slice() {
        [ClientRequest::ChatMessage {
            message,
            selected_fields,
            image_b64,
        }] => {
            assert_eq!(message, "What changed?");
            assert_eq!(
                selected_fields,
                &vec!["HR".to_string(), "IT".to_string()]
            );
            assert!(image_b64.is_none());
        }
        other => panic!("unexpected requests: {other:?}"),
    }
}

#[test]
fn python_prefix_routes_to_code_request() {
    let mut state = state();
    let effects = send(&mut state, "/py sum the sales column");

    assert!(matches!(
        emitted_requests(&effects).as_slice(),
        [ClientRequest::PythonCodeRequest { .. }]
    ));
}

#[test]
fn question_after_image_carries_refinement_payload() {
    let mut state = state();
    run_server(
        &mut state,
        ServerAction::Image(ImageEvent {
            image_b64: Some("b64".to_string()),
            ..ImageEvent::default()
        }),
    );

    let effects = send(&mut state, "make it blue");
    match emitted_requests(&effects).as_slice() {
        [ClientRequest::ChatMessage { image_b64, .. }] => {
            assert_eq!(image_b64.as_deref(), Some("b64"));
        }
        other => panic!("unexpected requests: {other:?}"),
    }
}

#[test]
fn table_upload_switches_to_document_mode() {
    let mut state = state();
    reduce(
        &mut state,
        ChatAction::User(UserAction::AttachDocument(DocumentUpload::Table {
            filename: "report.xlsx".to_string(),
            table: table(),
        })),
    );

    assert_eq!(state.chat_mode, ChatMode::DocumentChat);
    let ack = state.transcript.last().expect("acknowledgement present");
    assert!(ack.is_complete);
    assert!(ack.question_id.is_none());
    assert!(matches!(
        ack.attachment,
        Some(Attachment::FilePreview { .. })
    ));

    let document = state.document.as_ref().expect("document captured");
    assert_eq!(document.kind, DocumentKind::Table);
    let content = document.content.as_deref().expect("markdown content");
    assert!(content.starts_with("| id | name |"));
    assert!(content.contains("| 1 | alpha |"));
}

#[test]
fn document_mode_question_emits_document_question() {
    let mut state = state();
    reduce(
        &mut state,
        ChatAction::User(UserAction::AttachDocument(DocumentUpload::Text {
            filename: "notes.txt".to_string(),
            content: "hello world".to_string(),
        })),
    );

    let effects = send(&mut state, "Summarize it");
    match emitted_requests(&effects).as_slice() {
        [ClientRequest::DocumentQuestion {
            message,
            document_content,
            document_name,
            file_type,
            ..
        }] => {
            assert_eq!(message, "Summarize it");
            assert_eq!(document_content.as_deref(), Some("hello world"));
            assert_eq!(document_name, "notes.txt");
            assert_eq!(file_type, "text");
        }
        other => panic!("unexpected requests: {other:?}"),
    }
}

#[test]
fn rag_upload_requests_processing_and_omits_content_later() {
    let mut state = state();
    let effects = reduce(
        &mut state,
        ChatAction::User(UserAction::AttachDocument(DocumentUpload::RagDocument {
            filename: "handbook.pdf".to_string(),
            temp_path: "/tmp/upload-1".to_string(),
        })),
    );

    assert!(state.processing_rag);
    assert_eq!(
        emitted_requests(&effects),
        vec![&ClientRequest::ProcessDocumentForRag {
            temp_path: "/tmp/upload-1".to_string()
        }]
    );

    run_server(
        &mut state,
        ServerAction::RagStatus {
            status: "ready".to_string(),
        },
    );
    assert!(!state.processing_rag);
    assert!(state.transcript.is_empty());

    // RAG sessions keep the document server-side.
    let effects = send(&mut state, "What does chapter 2 say?");
    match emitted_requests(&effects).as_slice() {
        [ClientRequest::DocumentQuestion {
            document_content,
            file_type,
            ..
        }] => {
            assert!(document_content.is_none());
            assert_eq!(file_type, "rag_document");
        }
        other => panic!("unexpected requests: {other:?}"),
    }
}

#[test]
fn image_upload_switches_to_image_chat() {
    let mut state = state();
    reduce(
        &mut state,
        ChatAction::User(UserAction::AttachDocument(DocumentUpload::Image {
            filename: "diagram.png".to_string(),
            image_b64: "imagedata".to_string(),
        })),
    );

    assert_eq!(state.chat_mode, ChatMode::ImageChat);
    let effects = send(&mut state, "What is in the image?");
    assert!(matches!(
        emitted_requests(&effects).as_slice(),
        [ClientRequest::DocumentQuestion { .. }]
    ));
}

#[test]
fn non_ready_rag_status_is_ignored() {
    let mut state = state();
    send(&mut state, "question");
    let len_before = state.transcript.len();

    run_server(
        &mut state,
        ServerAction::RagStatus {
            status: "chunking".to_string(),
        },
    );
    assert_eq!(state.transcript.len(), len_before);
}

#[test]
fn new_dialog_resets_and_notifies_backend() {
    let mut state = state();
    send(&mut state, "question");
    run_server(
        &mut state,
        ServerAction::AnswerMeta(meta(SourceMode::KnowledgeBase, None)),
    );
    run_server(
        &mut state,
        ServerAction::AnswerChunk {
            text: "answer".to_string(),
        },
    );
    run_server(&mut state, ServerAction::AnswerEnd);

    let effects = reduce(&mut state, ChatAction::User(UserAction::NewDialog));

    assert!(state.transcript.is_empty());
    assert_eq!(state.chat_mode, ChatMode::KnowledgeBase);
    assert!(state.last_generated_image.is_none());
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Emit(ClientRequest::NewDialog)
    )));
    // A plain exchange is auto-saved before it is discarded.
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::PersistTranscript { title, .. } if title == "question"
    )));
}

#[test]
fn new_dialog_skips_auto_save_for_rich_transcripts() {
    let mut state = state();
    run_server(
        &mut state,
        ServerAction::Image(ImageEvent {
            image_b64: Some("b64".to_string()),
            ..ImageEvent::default()
        }),
    );
    send(&mut state, "refine it");
    run_server(
        &mut state,
        ServerAction::AnswerMeta(meta(SourceMode::KnowledgeBase, None)),
    );
    run_server(&mut state, ServerAction::AnswerEnd);

    let effects = reduce(&mut state, ChatAction::User(UserAction::NewDialog));
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::PersistTranscript { .. })));
}

#[test]
fn wipe_clears_backend_display_without_saving() {
    let mut state = state();
    send(&mut state, "question");
    let effects = reduce(&mut state, ChatAction::User(UserAction::WipeChat));

    assert!(state.transcript.is_empty());
    assert_eq!(
        emitted_requests(&effects),
        vec![&ClientRequest::ClearChatDisplay]
    );
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::PersistTranscript { .. })));
}

#[test]
fn load_history_replays_to_backend_and_marks_entry() {
    let mut state = state();
    let mut answer = Message::assistant("old answer");
    answer.is_complete = false;
    let effects = reduce(
        &mut state,
        ChatAction::User(UserAction::LoadHistory {
            id: 7,
            messages: vec![Message::user("old question"), answer],
            selected_fields: vec!["HR".to_string()],
        }),
    );

    assert_eq!(state.transcript.len(), 2);
    assert!(state.transcript.iter().all(|message| message.is_complete));
    assert_eq!(state.loaded_history_id, Some(7));
    assert!(matches!(
        emitted_requests(&effects).as_slice(),
        [ClientRequest::LoadConversationHistory { .. }]
    ));
}

#[test]
fn first_send_after_load_deletes_history_entry() {
    let mut state = state();
    reduce(
        &mut state,
        ChatAction::User(UserAction::LoadHistory {
            id: 7,
            messages: vec![Message::user("q"), Message::assistant("a")],
            selected_fields: Vec::new(),
        }),
    );

    let effects = send(&mut state, "follow-up");
    assert!(effects
        .iter()
        .any(|effect| matches!(effect, Effect::DeleteHistoryEntry(7))));
    assert!(state.loaded_history_id.is_none());
}

#[test]
fn send_while_generating_is_ignored() {
    let mut state = state();
    send(&mut state, "first");
    let len_before = state.transcript.len();

    let effects = send(&mut state, "second");
    assert_eq!(state.transcript.len(), len_before);
    assert!(emitted_requests(&effects).is_empty());
}

#[test]
fn send_after_clarification_is_allowed() {
    let mut state = state();
    send(&mut state, "ambiguous");
    run_server(
        &mut state,
        ServerAction::Clarification {
            question: "which?".to_string(),
            options: vec!["a".to_string()],
        },
    );

    let effects = send(&mut state, "a");
    assert!(!emitted_requests(&effects).is_empty());
    assert!(state.generation_in_flight());
}

#[test]
fn fields_command_replaces_selection() {
    let mut state = state();
    send(&mut state, "/fields Finance, Legal");
    assert_eq!(
        state.selected_fields,
        vec!["Finance".to_string(), "Legal".to_string()]
    );

    send(&mut state, "/fields clear");
    assert!(state.selected_fields.is_empty());
}

#[test]
fn copylast_command_yields_clipboard_effect() {
    let mut state = state();
    send(&mut state, "question");
    run_server(
        &mut state,
        ServerAction::AnswerMeta(meta(SourceMode::KnowledgeBase, None)),
    );
    run_server(
        &mut state,
        ServerAction::AnswerChunk {
            text: "the answer".to_string(),
        },
    );
    run_server(&mut state, ServerAction::AnswerEnd);

    let effects = send(&mut state, "/copylast");
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::CopyToClipboard(text) if text == "the answer"
    )));
}

#[test]
fn unknown_command_reports_status() {
    let mut state = state();
    send(&mut state, "/frobnicate");
    assert_eq!(state.status, "Unknown command '/frobnicate'");
    assert!(state.transcript.is_empty());
}

#[test]
fn update_knowledge_base_emits_request() {
    let mut state = state();
    let effects = reduce(&mut state, ChatAction::User(UserAction::UpdateKnowledgeBase));
    assert_eq!(
        emitted_requests(&effects),
        vec![&ClientRequest::UpdateKnowledgeBase]
    );
    assert_eq!(state.status, "Updating knowledge base...");
}
