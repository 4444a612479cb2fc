use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub chat: ChatConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub socket_url: String,
    pub api_url: String,
    pub access_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_url: "ws://localhost:8000/ws".to_string(),
            api_url: "http://localhost:8000".to_string(),
            access_token: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    pub selected_fields: Vec<String>,
    pub log_file: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            selected_fields: Vec::new(),
            log_file: None,
        }
    }
}
