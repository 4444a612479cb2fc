//! Typed REST surface of the assistant backend.
//!
//! Every endpoint is an opaque collaborator: one thin method per call,
//! request and response bodies mirrored as serde structs, no behavior
//! beyond shuttling JSON (or raw bytes for the export endpoints).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use reqwest::multipart;
use reqwest::Client;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use aide_core::history::NewSavedChat;
use aide_core::history::SavedChat;
use aide_core::history::SavedChatSummary;
use aide_core::state::Message;
use aide_core::state::QuestionId;
use aide_core::state::TableData;

use crate::auth::TokenProvider;
use crate::error::ClientError;
use crate::error::Result;

static HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

fn shared_client() -> Client {
    HTTP_CLIENT
        .get_or_init(|| {
            Client::builder()
                .pool_idle_timeout(Duration::from_secs(300))
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to create HTTP client")
        })
        .clone()
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Arc<dyn TokenProvider>,
}

/// Outcome of a file upload, classified by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadOutcome {
    RagDocument {
        filename: String,
        temp_path: String,
    },
    TableData {
        filename: String,
        data: TableData,
    },
    Text {
        filename: String,
        content: String,
    },
    Sql {
        filename: String,
        content: String,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FavoriteQuestion {
    pub id: i64,
    pub question: String,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FavoriteGroup {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub questions: Vec<FavoriteQuestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerRating {
    Good,
    Poor,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginSessionEntry {
    pub id: i64,
    pub user_name: String,
    #[serde(default)]
    pub login_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub question_count: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatQuestionEntry {
    pub id: i64,
    #[serde(default)]
    pub user_name: Option<String>,
    pub question: String,
    #[serde(default)]
    pub source_mode: Option<String>,
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserSummaryEntry {
    pub user_name: String,
    #[serde(default)]
    pub session_count: i64,
    #[serde(default)]
    pub question_count: i64,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FaultyCodeEntry {
    pub id: i64,
    #[serde(default)]
    pub question: Option<String>,
    pub code: String,
    #[serde(default)]
    pub error_details: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupConfig {
    pub enabled: bool,
    pub backup_time: String,
    #[serde(default)]
    pub retention_daily: u32,
    #[serde(default)]
    pub retention_monthly: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackupStatus {
    pub enabled: bool,
    #[serde(default)]
    pub backup_time: Option<String>,
    #[serde(default)]
    pub last_backup: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_backup_success: Option<bool>,
    #[serde(default)]
    pub next_backup: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_storage_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackupInfo {
    pub name: String,
    #[serde(rename = "type", default)]
    pub backup_type: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeFieldsResponse {
    #[serde(default)]
    fields: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FieldDomainsResponse {
    #[serde(default)]
    domains: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AdminCheckResponse {
    #[serde(default)]
    is_admin: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Arc<dyn TokenProvider>) -> Self {
        Self {
            http: shared_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn bearer(&self) -> Result<String> {
        self.token.bearer_token()
    }

    async fn expect_ok(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = match response.json::<ErrorBody>().await {
            Ok(body) => body.detail,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            detail,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!(path, "GET");
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        Ok(Self::expect_ok(response).await?.json().await?)
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        debug!(path, method = %method, "request");
        let response = self
            .http
            .request(method, self.url(path))
            .bearer_auth(self.bearer()?)
            .json(body)
            .send()
            .await?;
        Ok(Self::expect_ok(response).await?.json().await?)
    }

    async fn send_no_body<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> Result<T> {
        debug!(path, method = %method, "request");
        let response = self
            .http
            .request(method, self.url(path))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        Ok(Self::expect_ok(response).await?.json().await?)
    }

    async fn export_bytes<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Vec<u8>> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(self.bearer()?)
            .json(body)
            .send()
            .await?;
        let response = Self::expect_ok(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // --- identity / feature flags -----------------------------------------

    pub async fn check_admin(&self) -> Result<bool> {
        let response: AdminCheckResponse = self.get_json("/check_admin").await?;
        Ok(response.is_admin)
    }

    pub async fn features(&self) -> Result<HashMap<String, bool>> {
        self.get_json("/admin/features").await
    }

    pub async fn set_features(&self, features: &HashMap<String, bool>) -> Result<()> {
        let _: serde_json::Value = self
            .send_json(reqwest::Method::PUT, "/admin/features", features)
            .await?;
        Ok(())
    }

    // --- knowledge fields -------------------------------------------------

    pub async fn knowledge_fields(&self) -> Result<Vec<String>> {
        let response: KnowledgeFieldsResponse = self.get_json("/knowledge_fields").await?;
        Ok(response.fields)
    }

    pub async fn field_sender_domains(&self, field: &str) -> Result<Vec<String>> {
        let response: FieldDomainsResponse = self
            .get_json(&format!("/admin/knowledge_field_domains?field={field}"))
            .await?;
        Ok(response.domains)
    }

    pub async fn set_field_sender_domains(&self, field: &str, domains: &[String]) -> Result<()> {
        let body = serde_json::json!({ "field": field, "domains": domains });
        let _: serde_json::Value = self
            .send_json(
                reqwest::Method::POST,
                "/admin/knowledge_field_domains",
                &body,
            )
            .await?;
        Ok(())
    }

    // --- favorites --------------------------------------------------------

    pub async fn favorites(&self) -> Result<Vec<FavoriteGroup>> {
        self.get_json("/favorites/").await
    }

    pub async fn create_favorite_group(&self, name: &str) -> Result<FavoriteGroup> {
        let body = serde_json::json!({ "name": name });
        self.send_json(reqwest::Method::POST, "/favorites/groups", &body)
            .await
    }

    pub async fn rename_favorite_group(&self, group_id: i64, name: &str) -> Result<()> {
        let body = serde_json::json!({ "name": name });
        let _: serde_json::Value = self
            .send_json(
                reqwest::Method::PUT,
                &format!("/favorites/groups/{group_id}"),
                &body,
            )
            .await?;
        Ok(())
    }

    pub async fn delete_favorite_group(&self, group_id: i64) -> Result<()> {
        let _: serde_json::Value = self
            .send_no_body(
                reqwest::Method::DELETE,
                &format!("/favorites/groups/{group_id}"),
            )
            .await?;
        Ok(())
    }

    pub async fn reorder_favorite_groups(&self, group_ids: &[i64]) -> Result<()> {
        let body = serde_json::json!({ "group_ids": group_ids });
        let _: serde_json::Value = self
            .send_json(reqwest::Method::PUT, "/favorites/groups/order", &body)
            .await?;
        Ok(())
    }

    pub async fn add_favorite_question(&self, question: &str, group_id: i64) -> Result<()> {
        let body = serde_json::json!({ "question": question, "group_id": group_id });
        let _: serde_json::Value = self
            .send_json(reqwest::Method::POST, "/favorites/questions", &body)
            .await?;
        Ok(())
    }

    pub async fn delete_favorite_question(&self, question_id: i64) -> Result<()> {
        let _: serde_json::Value = self
            .send_no_body(
                reqwest::Method::DELETE,
                &format!("/favorites/questions/{question_id}"),
            )
            .await?;
        Ok(())
    }

    pub async fn move_favorite_question(
        &self,
        question_id: i64,
        new_group_id: i64,
        new_order: i64,
    ) -> Result<()> {
        let body = serde_json::json!({
            "question_id": question_id,
            "new_group_id": new_group_id,
            "new_order": new_order,
        });
        let _: serde_json::Value = self
            .send_json(reqwest::Method::PUT, "/favorites/questions/move", &body)
            .await?;
        Ok(())
    }

    // --- chat history -----------------------------------------------------

    pub async fn chat_histories(&self) -> Result<Vec<SavedChatSummary>> {
        self.get_json("/chat_history/").await
    }

    pub async fn chat_history(&self, chat_id: i64) -> Result<SavedChat> {
        self.get_json(&format!("/chat_history/{chat_id}")).await
    }

    pub async fn save_chat_history(&self, chat: &NewSavedChat) -> Result<SavedChat> {
        self.send_json(reqwest::Method::POST, "/chat_history/", chat)
            .await
    }

    pub async fn delete_chat_history(&self, chat_id: i64) -> Result<()> {
        let _: serde_json::Value = self
            .send_no_body(reqwest::Method::DELETE, &format!("/chat_history/{chat_id}"))
            .await?;
        Ok(())
    }

    // --- uploads, export, rating -------------------------------------------

    pub async fn upload_file(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<UploadOutcome> {
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime)?;
        let form = multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(self.url("/uploadfile/"))
            .bearer_auth(self.bearer()?)
            .multipart(form)
            .send()
            .await?;
        Ok(Self::expect_ok(response).await?.json().await?)
    }

    pub async fn export_pdf(&self, messages: &[Message]) -> Result<Vec<u8>> {
        let body = serde_json::json!({ "messages": messages });
        self.export_bytes("/export/pdf", &body).await
    }

    pub async fn rate_answer(&self, question_id: &QuestionId, rating: AnswerRating) -> Result<()> {
        let body = serde_json::json!({ "question_id": question_id.0, "rating": rating });
        let _: serde_json::Value = self
            .send_json(reqwest::Method::POST, "/chat_questions/rate", &body)
            .await?;
        Ok(())
    }

    // --- admin logs ---------------------------------------------------------

    pub async fn login_sessions(&self) -> Result<Vec<LoginSessionEntry>> {
        self.get_json("/admin/login_sessions").await
    }

    pub async fn chat_questions(&self) -> Result<Vec<ChatQuestionEntry>> {
        self.get_json("/admin/chat_questions").await
    }

    pub async fn user_summary(&self) -> Result<Vec<UserSummaryEntry>> {
        self.get_json("/admin/user_summary").await
    }

    pub async fn faulty_code_logs(&self) -> Result<Vec<FaultyCodeEntry>> {
        self.get_json("/admin/faulty_code_logs").await
    }

    pub async fn export_login_sessions(&self) -> Result<Vec<u8>> {
        self.export_bytes("/admin/export_login_sessions", &serde_json::json!({}))
            .await
    }

    pub async fn export_chat_questions(&self) -> Result<Vec<u8>> {
        self.export_bytes("/admin/export_chat_questions", &serde_json::json!({}))
            .await
    }

    pub async fn export_faulty_code_logs(&self) -> Result<Vec<u8>> {
        self.export_bytes("/admin/export_faulty_code_logs", &serde_json::json!({}))
            .await
    }

    pub async fn cleanup_old_data(&self) -> Result<()> {
        let _: serde_json::Value = self
            .send_no_body(reqwest::Method::DELETE, "/admin/cleanup_old_data")
            .await?;
        Ok(())
    }

    // --- backups ------------------------------------------------------------

    pub async fn backup_status(&self) -> Result<BackupStatus> {
        self.get_json("/admin/backup/status").await
    }

    pub async fn backup_config(&self) -> Result<BackupConfig> {
        self.get_json("/admin/backup/config").await
    }

    pub async fn set_backup_config(&self, config: &BackupConfig) -> Result<()> {
        let _: serde_json::Value = self
            .send_json(reqwest::Method::PUT, "/admin/backup/config", config)
            .await?;
        Ok(())
    }

    pub async fn backups(&self) -> Result<Vec<BackupInfo>> {
        self.get_json("/admin/backup/list").await
    }

    pub async fn create_backup(&self, description: &str) -> Result<()> {
        let body = serde_json::json!({ "description": description });
        let _: serde_json::Value = self
            .send_json(reqwest::Method::POST, "/admin/backup/create", &body)
            .await?;
        Ok(())
    }

    pub async fn delete_backup(&self, name: &str) -> Result<()> {
        let _: serde_json::Value = self
            .send_no_body(reqwest::Method::DELETE, &format!("/admin/backup/{name}"))
            .await?;
        Ok(())
    }

    pub async fn cleanup_backups(&self) -> Result<()> {
        let _: serde_json::Value = self
            .send_no_body(reqwest::Method::POST, "/admin/backup/cleanup")
            .await?;
        Ok(())
    }

    pub async fn restore_backup(&self, name: &str) -> Result<()> {
        let _: serde_json::Value = self
            .send_no_body(reqwest::Method::POST, &format!("/admin/backup/{name}/restore"))
            .await?;
        Ok(())
    }
}
