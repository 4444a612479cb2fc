use std::io;
use std::path::PathBuf;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;

use aide_client::rest::UploadOutcome;
use aide_client::ApiClient;
use aide_core::actions::ChatAction;
use aide_core::actions::ClientRequest;
use aide_core::actions::DocumentUpload;
use aide_core::actions::ServerAction;
use aide_core::actions::UserAction;
use aide_core::history::NewSavedChat;
use aide_core::reducer::reduce;
use aide_core::reducer::Effect;
use aide_core::state::Attachment;
use aide_core::state::Message;
use aide_core::state::Role;
use aide_core::state::SessionState;
use aide_core::state::SourceMode;

pub struct Shell {
    pub runtime_handle: tokio::runtime::Handle,
    pub api: ApiClient,
    pub request_tx: UnboundedSender<ClientRequest>,
    pub action_tx: UnboundedSender<ChatAction>,
    pub action_rx: UnboundedReceiver<ChatAction>,
    pub initial_fields: Vec<String>,
}

struct TuiGuard;

impl Drop for TuiGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
    }
}

pub fn run(mut shell: Shell) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    let _guard = TuiGuard;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut state = SessionState::new();
    state.selected_fields = shell.initial_fields.clone();

    let mut input = String::new();
    let mut redraw = true;

    loop {
        while let Ok(action) = shell.action_rx.try_recv() {
            let effects = reduce(&mut state, action);
            apply_effects(&shell, effects);
            redraw = true;
        }

        if redraw {
            terminal.draw(|frame| draw(frame, &state, &input))?;
            redraw = false;
        }

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            redraw = true;
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => break,
            (KeyCode::Esc, _) => {
                let effects = reduce(&mut state, ChatAction::User(UserAction::Cancel));
                apply_effects(&shell, effects);
                redraw = true;
            }
            (KeyCode::Enter, _) => {
                let text = std::mem::take(&mut input);
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed == "/quit" || trimmed == "/exit" {
                    break;
                }
                if let Some(path) = trimmed.strip_prefix("/attach ") {
                    start_upload(&shell, &mut state, path.trim());
                } else {
                    let effects = reduce(
                        &mut state,
                        ChatAction::User(UserAction::Send {
                            text: trimmed.to_string(),
                        }),
                    );
                    apply_effects(&shell, effects);
                }
                redraw = true;
            }
            (KeyCode::Backspace, _) => {
                input.pop();
                redraw = true;
            }
            (KeyCode::Char(c), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
                input.push(c);
                redraw = true;
            }
            _ => {}
        }
    }

    Ok(())
}

fn apply_effects(shell: &Shell, effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::Emit(request) => {
                if shell.request_tx.send(request).is_err() {
                    tracing::warn!("socket closed; outgoing request dropped");
                }
            }
            // Callers redraw after every reduce; nothing extra to do here.
            Effect::RequestFrame => {}
            Effect::CopyToClipboard(text) => copy_to_clipboard(&text),
            Effect::PersistTranscript {
                title,
                messages,
                selected_fields,
            } => {
                let api = shell.api.clone();
                shell.runtime_handle.spawn(async move {
                    let chat = NewSavedChat {
                        title,
                        messages,
                        selected_fields,
                    };
                    if let Err(err) = api.save_chat_history(&chat).await {
                        tracing::warn!(%err, "auto-save failed");
                    }
                });
            }
            Effect::DeleteHistoryEntry(id) => {
                let api = shell.api.clone();
                shell.runtime_handle.spawn(async move {
                    if let Err(err) = api.delete_chat_history(id).await {
                        tracing::warn!(%err, id, "could not delete restored history entry");
                    }
                });
            }
        }
    }
}

fn copy_to_clipboard(text: &str) {
    match arboard::Clipboard::new() {
        Ok(mut clipboard) => {
            if let Err(err) = clipboard.set_text(text.to_string()) {
                tracing::warn!(%err, "clipboard write failed");
            }
        }
        Err(err) => tracing::warn!(%err, "clipboard unavailable"),
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

fn start_upload(shell: &Shell, state: &mut SessionState, raw_path: &str) {
    let path = PathBuf::from(raw_path);
    let filename = match path.file_name() {
        Some(name) => name.to_string_lossy().to_string(),
        None => {
            state.status = format!("Error: not a file path: {raw_path}");
            return;
        }
    };
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    // Images never leave the client before a question is asked.
    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        match std::fs::read(&path) {
            Ok(bytes) => {
                let upload = DocumentUpload::Image {
                    filename,
                    image_b64: BASE64.encode(bytes),
                };
                let _ = shell
                    .action_tx
                    .send(ChatAction::User(UserAction::AttachDocument(upload)));
            }
            Err(err) => {
                state.status = format!("Error: could not read {}: {err}", path.display());
            }
        }
        return;
    }

    state.status = "Uploading and processing file...".to_string();
    let api = shell.api.clone();
    let action_tx = shell.action_tx.clone();
    let mime = mime_for(&extension).to_string();
    shell.runtime_handle.spawn(async move {
        let outcome = async {
            let bytes = tokio::fs::read(&path).await?;
            api.upload_file(&filename, bytes, &mime).await
        }
        .await;

        let action = match outcome {
            Ok(outcome) => ChatAction::User(UserAction::AttachDocument(into_upload(outcome))),
            Err(err) => {
                tracing::warn!(%err, "file upload failed");
                ChatAction::Server(ServerAction::Status {
                    message: format!("Error: {err}"),
                })
            }
        };
        let _ = action_tx.send(action);
    });
}

fn into_upload(outcome: UploadOutcome) -> DocumentUpload {
    match outcome {
        UploadOutcome::RagDocument {
            filename,
            temp_path,
        } => DocumentUpload::RagDocument {
            filename,
            temp_path,
        },
        UploadOutcome::TableData { filename, data } => DocumentUpload::Table {
            filename,
            table: data,
        },
        UploadOutcome::Text { filename, content } => DocumentUpload::Text { filename, content },
        UploadOutcome::Sql { filename, content } => DocumentUpload::Sql { filename, content },
    }
}

fn mime_for(extension: &str) -> &'static str {
    match extension {
        "csv" => "text/csv",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" | "sql" => "text/plain",
        _ => "application/octet-stream",
    }
}

fn draw(frame: &mut Frame, state: &SessionState, input: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_transcript(frame, chunks[0], state);
    draw_input(frame, chunks[1], input);
    draw_status(frame, chunks[2], state);
}

fn draw_transcript(frame: &mut Frame, area: Rect, state: &SessionState) {
    let lines = transcript_lines(state);
    let inner_width = area.width.saturating_sub(2).max(1) as usize;
    let inner_height = area.height.saturating_sub(2) as usize;
    let wrapped: usize = lines
        .iter()
        .map(|line| {
            let len = line.width();
            if len == 0 {
                1
            } else {
                len.div_ceil(inner_width)
            }
        })
        .sum();
    let scroll = wrapped.saturating_sub(inner_height) as u16;

    let transcript = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Aide "))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(transcript, area);
}

fn draw_input(frame: &mut Frame, area: Rect, input: &str) {
    let widget = Paragraph::new(input)
        .block(Block::default().borders(Borders::ALL).title(" Message "));
    frame.render_widget(widget, area);
    frame.set_cursor_position(Position::new(
        area.x + 1 + input.chars().count() as u16,
        area.y + 1,
    ));
}

fn draw_status(frame: &mut Frame, area: Rect, state: &SessionState) {
    let phase = state.phase.label();
    let mode = state.chat_mode.label();
    let fields = if state.selected_fields.is_empty() {
        "all".to_string()
    } else {
        state.selected_fields.len().to_string()
    };
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", state.status),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("[{phase}] [{mode}] [fields: {fields}]"),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn transcript_lines(state: &SessionState) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for message in &state.transcript {
        lines.extend(message_lines(message));
        lines.push(Line::raw(""));
    }
    lines
}

fn message_lines(message: &Message) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let (name, name_style) = match message.role {
        Role::User => ("you", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Role::Assistant if message.is_error => {
            ("assistant", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
        }
        Role::Assistant => (
            "assistant",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
    };
    let mut header = vec![Span::styled(name.to_string(), name_style)];
    if message.source_mode != SourceMode::None {
        header.push(Span::styled(
            format!("  ({})", message.source_mode.label()),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if !message.is_complete {
        header.push(Span::styled(
            "  ...",
            Style::default().fg(Color::DarkGray),
        ));
    }
    lines.push(Line::from(header));

    let body_style = if message.is_error {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };
    for body_line in message.content.lines() {
        lines.push(Line::styled(body_line.to_string(), body_style));
    }

    if let Some(attachment) = message.attachment.as_ref() {
        lines.push(Line::styled(
            attachment_summary(attachment),
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::ITALIC),
        ));
    }

    if let Some(code_run) = message.code_run.as_ref() {
        lines.push(Line::styled(
            "--- code ---".to_string(),
            Style::default().fg(Color::DarkGray),
        ));
        for code_line in code_run.code.lines() {
            lines.push(Line::styled(
                code_line.to_string(),
                Style::default().fg(Color::Yellow),
            ));
        }
        if let Some(explanation) = code_run.explanation.as_ref() {
            for text in explanation.lines() {
                lines.push(Line::raw(text.to_string()));
            }
        }
        if let Some(details) = code_run.error_details.as_ref() {
            for text in details.lines() {
                lines.push(Line::styled(
                    text.to_string(),
                    Style::default().fg(Color::Red),
                ));
            }
        }
    }

    if !message.sources.is_empty() {
        lines.push(Line::styled(
            "sources:".to_string(),
            Style::default().fg(Color::DarkGray),
        ));
        for source in &message.sources {
            lines.push(Line::styled(
                format!("  - {source}"),
                Style::default().fg(Color::DarkGray),
            ));
        }
    }

    for (idx, option) in message.clarification_options.iter().enumerate() {
        lines.push(Line::styled(
            format!("  [{}] {option}", idx + 1),
            Style::default().fg(Color::Blue),
        ));
    }

    for follow_up in &message.follow_ups {
        lines.push(Line::styled(
            format!("  try: {follow_up}"),
            Style::default().fg(Color::DarkGray),
        ));
    }

    lines
}

fn attachment_summary(attachment: &Attachment) -> String {
    match attachment {
        Attachment::Plots { documents } => format!("[{} interactive plot(s)]", documents.len()),
        Attachment::Images { images } => format!("[{} image(s)]", images.len()),
        Attachment::Table(table) => format!(
            "[table: {} column(s), {} row(s)]",
            table.columns.len(),
            table.rows.len()
        ),
        Attachment::SingleValue { value } => format!("[value: {value}]"),
        Attachment::GeneratedImage(image) => match image.url.as_deref() {
            Some(url) => format!("[generated image: {url}]"),
            None => "[generated image]".to_string(),
        },
        Attachment::FilePreview { name, file_kind, .. } => {
            format!("[file: {name} ({})]", file_kind.label())
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use aide_core::state::Attachment;
    use aide_core::state::GeneratedImage;
    use aide_core::state::TableData;

    use super::attachment_summary;
    use super::mime_for;

    #[test]
    fn attachment_summaries_are_compact() {
        let table = Attachment::Table(TableData {
            columns: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec![serde_json::Value::from(1), serde_json::Value::from(2)]],
        });
        assert_eq!(attachment_summary(&table), "[table: 2 column(s), 1 row(s)]");

        let image = Attachment::GeneratedImage(GeneratedImage {
            url: Some("https://img/1".to_string()),
            ..GeneratedImage::default()
        });
        assert_eq!(attachment_summary(&image), "[generated image: https://img/1]");
    }

    #[test]
    fn mime_covers_supported_upload_types() {
        assert_eq!(mime_for("csv"), "text/csv");
        assert_eq!(mime_for("pdf"), "application/pdf");
        assert_eq!(mime_for("sql"), "text/plain");
        assert_eq!(mime_for("bin"), "application/octet-stream");
    }
}
