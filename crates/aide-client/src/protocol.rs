//! Socket wire protocol.
//!
//! Both directions use JSON text frames shaped `{"event": <name>, "data":
//! <payload>}`. Decoding is total: anything unrecognized or structurally
//! wrong becomes a [`ServerAction::Malformed`] the reducer records and
//! drops, so a misbehaving backend can never tear down client state.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use aide_core::actions::AnswerMeta;
use aide_core::actions::ClientRequest;
use aide_core::actions::ImageEvent;
use aide_core::actions::PythonResult;
use aide_core::actions::ServerAction;
use aide_core::state::PythonPhase;
use aide_core::state::QuestionId;
use aide_core::state::SourceMode;

use crate::error::Result;

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AnswerMetaPayload {
    #[serde(default)]
    source_mode: Option<String>,
    #[serde(default)]
    question_id: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    follow_ups: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ClarificationPayload {
    question: String,
    #[serde(default)]
    options: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PythonErrorPayload {
    error: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    error_details: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RagStatusPayload {
    status: String,
}

pub fn encode_client_request(request: &ClientRequest) -> Result<String> {
    Ok(serde_json::to_string(request)?)
}

pub fn decode_server_event(text: &str) -> ServerAction {
    let envelope = match serde_json::from_str::<Envelope>(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            return ServerAction::Malformed {
                event: "frame".to_string(),
                reason: format!("invalid frame: {err}"),
            }
        }
    };
    decode_envelope(envelope)
}

fn decode_envelope(envelope: Envelope) -> ServerAction {
    let Envelope { event, data } = envelope;
    match event.as_str() {
        "status" => match payload::<StatusPayload>(&event, data) {
            Ok(status) => ServerAction::Status {
                message: status.message,
            },
            Err(malformed) => malformed,
        },
        "answer_meta" => match payload::<AnswerMetaPayload>(&event, data) {
            Ok(meta) => ServerAction::AnswerMeta(AnswerMeta {
                source_mode: meta
                    .source_mode
                    .as_deref()
                    .map(SourceMode::from_wire)
                    .unwrap_or_default(),
                question_id: meta.question_id.map(QuestionId),
                sources: meta.sources,
                follow_ups: meta.follow_ups,
            }),
            Err(malformed) => malformed,
        },
        "answer_chunk" => match data {
            // Deltas usually arrive as a bare string; an object form with a
            // `text` field is accepted as well.
            Value::String(text) => ServerAction::AnswerChunk { text },
            other => match payload::<ChunkPayload>(&event, other) {
                Ok(chunk) => ServerAction::AnswerChunk { text: chunk.text },
                Err(malformed) => malformed,
            },
        },
        "generation_cancelled" => ServerAction::GenerationCancelled,
        "answer_end" => ServerAction::AnswerEnd,
        "clarification" => match payload::<ClarificationPayload>(&event, data) {
            Ok(clarification) => ServerAction::Clarification {
                question: clarification.question,
                options: clarification.options,
            },
            Err(malformed) => malformed,
        },
        "error" => match payload::<ErrorPayload>(&event, data) {
            Ok(error) => ServerAction::ServerError {
                message: error.message,
            },
            Err(malformed) => malformed,
        },
        "python_status" => match payload::<PythonPhase>(&event, data) {
            Ok(phase) => ServerAction::PythonStatus(phase),
            Err(malformed) => malformed,
        },
        "python_result" => match payload::<PythonResult>(&event, data) {
            Ok(result) => ServerAction::PythonResult(result),
            Err(malformed) => malformed,
        },
        "python_error" => match payload::<PythonErrorPayload>(&event, data) {
            Ok(error) => ServerAction::PythonError {
                error: error.error,
                code: error.code,
                error_details: error.error_details,
            },
            Err(malformed) => malformed,
        },
        "rag_status" => match payload::<RagStatusPayload>(&event, data) {
            Ok(rag) => ServerAction::RagStatus { status: rag.status },
            Err(malformed) => malformed,
        },
        "image" => match payload::<ImageEvent>(&event, data) {
            Ok(image) => ServerAction::Image(image),
            Err(malformed) => malformed,
        },
        _ => ServerAction::Malformed {
            event,
            reason: "unrecognized event name".to_string(),
        },
    }
}

fn payload<T: DeserializeOwned>(event: &str, data: Value) -> std::result::Result<T, ServerAction> {
    serde_json::from_value(data).map_err(|err| ServerAction::Malformed {
        event: event.to_string(),
        reason: format!("invalid payload: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use aide_core::actions::ClientRequest;
    use aide_core::actions::ServerAction;
    use aide_core::state::PythonPhase;
    use aide_core::state::QuestionId;
    use aide_core::state::SourceMode;

    use super::decode_server_event;
    use super::encode_client_request;

    #[test]
    fn decodes_answer_meta_with_wire_source_mode() {
        let action = decode_server_event(
            r#"{"event":"answer_meta","data":{"source_mode":"vector_store","question_id":"q1","sources":["https://a"],"follow_ups":["next?"]}}"#,
        );
        match action {
            ServerAction::AnswerMeta(meta) => {
                assert_eq!(meta.source_mode, SourceMode::KnowledgeBase);
                assert_eq!(meta.question_id, Some(QuestionId("q1".to_string())));
                assert_eq!(meta.sources, vec!["https://a".to_string()]);
                assert_eq!(meta.follow_ups, vec!["next?".to_string()]);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn decodes_status_and_python_error() {
        let action = decode_server_event(r#"{"event":"status","data":{"message":"Ready"}}"#);
        assert!(matches!(
            action,
            ServerAction::Status { message } if message == "Ready"
        ));

        let action = decode_server_event(
            r#"{"event":"python_error","data":{"error":"failed","code":"1/0","error_details":"ZeroDivisionError"}}"#,
        );
        match action {
            ServerAction::PythonError {
                error,
                code,
                error_details,
            } => {
                assert_eq!(error, "failed");
                assert_eq!(code, "1/0");
                assert_eq!(error_details.as_deref(), Some("ZeroDivisionError"));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn every_outbound_request_serializes_under_its_event_name() {
        let requests = vec![
            ClientRequest::ChatMessage {
                message: "q".to_string(),
                selected_fields: Vec::new(),
                image_b64: None,
            },
            ClientRequest::PythonCodeRequest {
                message: "/py q".to_string(),
                selected_fields: Vec::new(),
            },
            ClientRequest::DocumentQuestion {
                message: "q".to_string(),
                document_content: None,
                document_name: "d".to_string(),
                document_header: None,
                file_type: "text".to_string(),
            },
            ClientRequest::CancelGeneration,
            ClientRequest::NewDialog,
            ClientRequest::UpdateKnowledgeBase,
            ClientRequest::ProcessDocumentForRag {
                temp_path: "/tmp/t".to_string(),
            },
            ClientRequest::ClearChatDisplay,
            ClientRequest::LoadConversationHistory {
                messages: Vec::new(),
                selected_fields: Vec::new(),
            },
        ];

        for request in requests {
            let frame = encode_client_request(&request).expect("encode");
            let value: serde_json::Value = serde_json::from_str(&frame).expect("valid json");
            assert_eq!(value["event"], request.event_name());
        }
    }

    #[test]
    fn decodes_bare_string_chunk() {
        let action = decode_server_event(r#"{"event":"answer_chunk","data":"hello "}"#);
        assert!(matches!(
            action,
            ServerAction::AnswerChunk { text } if text == "hello "
        ));
    }

    #[test]
    fn decodes_object_chunk() {
        let action = decode_server_event(r#"{"event":"answer_chunk","data":{"text":"hi"}}"#);
        assert!(matches!(
            action,
            ServerAction::AnswerChunk { text } if text == "hi"
        ));
    }

    #[test]
    fn decodes_payload_free_events() {
        assert!(matches!(
            decode_server_event(r#"{"event":"answer_end"}"#),
            ServerAction::AnswerEnd
        ));
        assert!(matches!(
            decode_server_event(r#"{"event":"generation_cancelled"}"#),
            ServerAction::GenerationCancelled
        ));
    }

    #[test]
    fn decodes_python_status_phases() {
        let action = decode_server_event(
            r#"{"event":"python_status","data":{"status":"generating_code","attempt":3}}"#,
        );
        assert!(matches!(
            action,
            ServerAction::PythonStatus(PythonPhase::GeneratingCode { attempt: 3 })
        ));

        let action =
            decode_server_event(r#"{"event":"python_status","data":{"status":"security_check"}}"#);
        assert!(matches!(
            action,
            ServerAction::PythonStatus(PythonPhase::SecurityCheck)
        ));
    }

    #[test]
    fn decodes_python_result_payload_fields() {
        let action = decode_server_event(
            r#"{"event":"python_result","data":{"code":"df.sum()","table":{"columns":["a"],"rows":[[1]]}}}"#,
        );
        match action {
            ServerAction::PythonResult(result) => {
                assert_eq!(result.code.as_deref(), Some("df.sum()"));
                let table = result.table.expect("table decoded");
                assert_eq!(table.columns, vec!["a".to_string()]);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn decodes_clarification_and_error() {
        let action = decode_server_event(
            r#"{"event":"clarification","data":{"question":"which?","options":["a","b"]}}"#,
        );
        assert!(matches!(
            action,
            ServerAction::Clarification { question, options }
                if question == "which?" && options.len() == 2
        ));

        let action = decode_server_event(r#"{"event":"error","data":{"message":"nope"}}"#);
        assert!(matches!(
            action,
            ServerAction::ServerError { message } if message == "nope"
        ));
    }

    #[test]
    fn decodes_rag_status_and_image() {
        assert!(matches!(
            decode_server_event(r#"{"event":"rag_status","data":{"status":"ready"}}"#),
            ServerAction::RagStatus { status } if status == "ready"
        ));

        let action = decode_server_event(
            r#"{"event":"image","data":{"url":"u","image_b64":"b","extended_prompt":"p"}}"#,
        );
        match action {
            ServerAction::Image(image) => {
                assert_eq!(image.url.as_deref(), Some("u"));
                assert_eq!(image.image_b64.as_deref(), Some("b"));
                assert_eq!(image.extended_prompt.as_deref(), Some("p"));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_is_malformed_not_error() {
        let action = decode_server_event(r#"{"event":"telemetry","data":{}}"#);
        assert!(matches!(
            action,
            ServerAction::Malformed { event, .. } if event == "telemetry"
        ));
    }

    #[test]
    fn broken_frame_is_malformed_not_error() {
        let action = decode_server_event("not json at all");
        assert!(matches!(action, ServerAction::Malformed { .. }));
    }

    #[test]
    fn wrong_payload_shape_is_malformed() {
        let action = decode_server_event(r#"{"event":"status","data":{"msg":"oops"}}"#);
        assert!(matches!(
            action,
            ServerAction::Malformed { event, .. } if event == "status"
        ));
    }

    #[test]
    fn encodes_requests_under_their_event_names() {
        let frame = encode_client_request(&ClientRequest::CancelGeneration).expect("encode");
        assert_eq!(frame, r#"{"event":"cancel_generation"}"#);

        let frame = encode_client_request(&ClientRequest::ChatMessage {
            message: "hi".to_string(),
            selected_fields: vec!["HR".to_string()],
            image_b64: None,
        })
        .expect("encode");
        let value: serde_json::Value = serde_json::from_str(&frame).expect("valid json");
        assert_eq!(value["event"], "chat_message");
        assert_eq!(value["data"]["message"], "hi");
        assert_eq!(value["data"]["selected_fields"][0], "HR");
        assert!(value["data"].get("image_b64").is_none());
    }

    #[test]
    fn encodes_document_question_shape() {
        let frame = encode_client_request(&ClientRequest::DocumentQuestion {
            message: "summarize".to_string(),
            document_content: Some("content".to_string()),
            document_name: "notes.txt".to_string(),
            document_header: None,
            file_type: "text".to_string(),
        })
        .expect("encode");
        let value: serde_json::Value = serde_json::from_str(&frame).expect("valid json");
        assert_eq!(value["event"], "document_question");
        assert_eq!(value["data"]["file_type"], "text");
        assert_eq!(value["data"]["document_name"], "notes.txt");
    }
}
