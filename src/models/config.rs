use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub mirrors: MirrorConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub bot_token: String,
    pub operator_chat_id: i64,
    pub self_chat_id: Option<i64>,    // доверенный чат: сводки классификации не отправляются оператору
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

/// Где искать ссылки на посты и как распознавать хостинги контента
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,                // префикс для вложенных (crosspost) ссылок
    pub link_prefixes: Vec<String>,
    pub short_link_pattern: String,
    pub short_video_hosts: Vec<String>,  // link -> video
    pub image_hosts: Vec<String>,        // gif -> link
    pub image_host_pages: Vec<String>,   // страницы, из которых добывается og:video
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.reddit.com".to_string(),
            link_prefixes: vec![
                "https://www.reddit.com/".to_string(),
                "https://reddit.com/".to_string(),
            ],
            short_link_pattern: r"^/r/[^/]+/s/[A-Za-z0-9]+/?$".to_string(),
            short_video_hosts: vec![
                r"^https://v\.redd\.it/".to_string(),
                r"^https://(www\.)?youtube\.com/shorts/".to_string(),
            ],
            image_hosts: vec![r"^https://i\.imgur\.com/".to_string()],
            image_host_pages: vec![
                "https://imgur.com/".to_string(),
                "https://i.imgur.com/".to_string(),
            ],
        }
    }
}

/// Сторонние сервисы-зеркала, отдающие прямую ссылку на видео поста
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MirrorConfig {
    pub primary_url: String,
    pub secondary_url: String,
    pub secondary_cookie: Option<String>,
    pub rehost_base_url: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            primary_url: "https://rapidsave.com/info?url=".to_string(),
            secondary_url: "https://redditsave.com/info?url=".to_string(),
            secondary_cookie: None,
            rehost_base_url: "https://i.imgur.com".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FetcherConfig {
    pub max_attempts: usize,
    pub retry_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay_ms: 100,
            request_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub counter_path: String,
    pub failures_log: String,
    pub errors_log: String,
    pub temp_dir: String,
    pub log_dir: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            counter_path: "./id.txt".to_string(),
            failures_log: "./logs_fails.txt".to_string(),
            errors_log: "./logs_errors.txt".to_string(),
            temp_dir: ".".to_string(),
            log_dir: None,
        }
    }
}

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

/// Читает YAML-конфигурацию и накладывает поверх неё переменные окружения.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<AppConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let mut cfg: AppConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    apply_env_overrides(&mut cfg)?;
    if cfg.telegram.bot_token.trim().is_empty() {
        anyhow::bail!("telegram.bot_token is empty (set it in config or TELEGRAM_BOT_TOKEN)");
    }
    Ok(cfg)
}

fn apply_env_overrides(cfg: &mut AppConfig) -> anyhow::Result<()> {
    if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
        if !token.trim().is_empty() {
            cfg.telegram.bot_token = token;
        }
    }
    if let Ok(id) = std::env::var("OPERATOR_CHAT_ID") {
        cfg.telegram.operator_chat_id = id
            .trim()
            .parse()
            .context("OPERATOR_CHAT_ID is not an integer")?;
    }
    if let Ok(id) = std::env::var("SELF_CHAT_ID") {
        cfg.telegram.self_chat_id = Some(id.trim().parse().context("SELF_CHAT_ID is not an integer")?);
    }
    Ok(())
}
