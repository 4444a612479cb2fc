use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use aide_client::ApiClient;
use aide_client::ChatSocket;
use aide_client::StaticToken;
use aide_core::actions::ChatAction;
use aide_core::config::Config;

mod ui;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let cli = match parse_args(args)? {
        ParsedArgs::Run(cli) => cli,
        ParsedArgs::Help => {
            print_help();
            return Ok(());
        }
        ParsedArgs::Version => {
            println!("aide {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
    };

    let config_path = cli
        .config_path
        .clone()
        .unwrap_or_else(default_config_path);
    let mut config = load_config(&config_path)?;
    apply_overrides(&mut config, &cli);

    init_logging(&config)?;

    let token = resolve_token(&config).ok_or(
        "no access token configured; set server.access_token in config.toml \
         or the AIDE_ACCESS_TOKEN environment variable",
    )?;
    let token: Arc<StaticToken> = Arc::new(StaticToken::new(token));

    let runtime = tokio::runtime::Runtime::new()?;
    let api = ApiClient::new(config.server.api_url.clone(), token.clone());

    let socket = runtime.block_on(ChatSocket::connect(&config.server.socket_url, token.as_ref()))?;
    let (request_tx, mut server_events) = socket.split();

    // Single inbound queue: decoded server events and locally produced
    // actions (e.g. completed uploads) interleave in arrival order.
    let (action_tx, action_rx) = tokio::sync::mpsc::unbounded_channel::<ChatAction>();
    let forward_tx = action_tx.clone();
    runtime.spawn(async move {
        while let Some(event) = server_events.recv().await {
            if forward_tx.send(ChatAction::Server(event)).is_err() {
                break;
            }
        }
    });

    let initial_fields = runtime
        .block_on(api.knowledge_fields())
        .unwrap_or_else(|err| {
            tracing::warn!(%err, "could not load knowledge fields");
            config.chat.selected_fields.clone()
        });

    ui::run(ui::Shell {
        runtime_handle: runtime.handle().clone(),
        api,
        request_tx,
        action_tx,
        action_rx,
        initial_fields,
    })
}

struct CliArgs {
    config_path: Option<PathBuf>,
    socket_url: Option<String>,
    api_url: Option<String>,
    token: Option<String>,
}

enum ParsedArgs {
    Run(CliArgs),
    Help,
    Version,
}

fn parse_args(args: Vec<String>) -> Result<ParsedArgs, Box<dyn std::error::Error>> {
    let mut cli = CliArgs {
        config_path: None,
        socket_url: None,
        api_url: None,
        token: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" | "help" => return Ok(ParsedArgs::Help),
            "--version" | "-V" | "version" => return Ok(ParsedArgs::Version),
            "--config" => {
                let Some(value) = args.get(i + 1) else {
                    return Err("--config requires a path".into());
                };
                cli.config_path = Some(PathBuf::from(value));
                i += 2;
            }
            "--server" => {
                let Some(value) = args.get(i + 1) else {
                    return Err("--server requires a URL".into());
                };
                cli.socket_url = Some(value.clone());
                i += 2;
            }
            "--api" => {
                let Some(value) = args.get(i + 1) else {
                    return Err("--api requires a URL".into());
                };
                cli.api_url = Some(value.clone());
                i += 2;
            }
            "--token" => {
                let Some(value) = args.get(i + 1) else {
                    return Err("--token requires a value".into());
                };
                cli.token = Some(value.clone());
                i += 2;
            }
            other => {
                return Err(format!("unsupported argument: {other}").into());
            }
        }
    }

    Ok(ParsedArgs::Run(cli))
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aide")
        .join("config.toml")
}

fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = fs::read_to_string(path)?;
    let config = toml::from_str(&raw)?;
    Ok(config)
}

fn apply_overrides(config: &mut Config, cli: &CliArgs) {
    if let Some(url) = cli.socket_url.as_ref() {
        config.server.socket_url = url.clone();
    }
    if let Some(url) = cli.api_url.as_ref() {
        config.server.api_url = url.clone();
    }
    if let Some(token) = cli.token.as_ref() {
        config.server.access_token = Some(token.clone());
    }
}

fn resolve_token(config: &Config) -> Option<String> {
    config
        .server
        .access_token
        .clone()
        .or_else(|| env::var("AIDE_ACCESS_TOKEN").ok())
        .filter(|token| !token.trim().is_empty())
}

fn init_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let path = match config.chat.log_file.as_ref() {
        Some(path) => PathBuf::from(path),
        None => dirs::state_dir()
            .or_else(dirs::cache_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aide")
            .join("aide.log"),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(&path)?;

    // The alternate screen owns stdout; diagnostics go to a file instead.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn print_help() {
    println!("aide {}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  aide [--config PATH] [--server WS_URL] [--api HTTP_URL] [--token TOKEN]");
    println!("  aide --help");
    println!("  aide --version");
}
