pub(super) use super::reduce;
pub(super) use super::Effect;
pub(super) use super::CANCELLED_NOTICE;
pub(super) use super::CANCELLED_SUFFIX;
pub(super) use crate::actions::AnswerMeta;
pub(super) use crate::actions::ChatAction;
pub(super) use crate::actions::ClientRequest;
pub(super) use crate::actions::DisconnectReason;
pub(super) use crate::actions::DocumentUpload;
pub(super) use crate::actions::ImageEvent;
pub(super) use crate::actions::PythonResult;
pub(super) use crate::actions::ServerAction;
pub(super) use crate::actions::UserAction;
pub(super) use crate::state::Attachment;
pub(super) use crate::state::ChatMode;
pub(super) use crate::state::DocumentKind;
pub(super) use crate::state::Message;
pub(super) use crate::state::PythonPhase;
pub(super) use crate::state::QuestionId;
pub(super) use crate::state::Role;
pub(super) use crate::state::SessionPhase;
pub(super) use crate::state::SessionState;
pub(super) use crate::state::SourceMode;
pub(super) use crate::state::TableData;

mod modes;

fn state() -> SessionState {
    let mut state = SessionState::new();
    state.selected_fields = vec!["HR".to_string(), "IT".to_string()];
    state
}

fn run_server(state: &mut SessionState, action: ServerAction) {
    let effects = reduce(state, ChatAction::Server(action));
    assert!(effects.is_empty());
}

fn send(state: &mut SessionState, text: &str) -> Vec<Effect> {
    reduce(
        state,
        ChatAction::User(UserAction::Send {
            text: text.to_string(),
        }),
    )
}

fn meta(source_mode: SourceMode, question_id: Option<&str>) -> AnswerMeta {
    AnswerMeta {
        source_mode,
        question_id: question_id.map(|id| QuestionId(id.to_string())),
        sources: Vec::new(),
        follow_ups: Vec::new(),
    }
}

fn open_count(state: &SessionState) -> usize {
    state
        .transcript
        .iter()
        .filter(|message| !message.is_complete)
        .count()
}

fn emitted_requests(effects: &[Effect]) -> Vec<&ClientRequest> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Emit(request) => Some(request),
            _ => None,
        })
        .collect()
}
