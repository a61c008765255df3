use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log: LogConfig,
    pub item_bank_path: Option<String>,
}

/// Where and how much the service logs. `file_dir` is set only when file
/// output is switched on.
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub level: String,
    pub file_dir: Option<PathBuf>,
    pub retained_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_dir: None,
            retained_files: 14,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let file_logs = std::env::var("ENABLE_FILE_LOGS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let file_dir = file_logs.then(|| {
            std::env::var("LOG_DIR")
                .ok()
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./logs"))
        });

        Self {
            level: std::env::var("RUST_LOG").unwrap_or(defaults.level),
            file_dir,
            retained_files: std::env::var("LOG_RETAINED_FILES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.retained_files),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let item_bank_path = std::env::var("ITEM_BANK_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty());

        Self {
            host,
            port,
            log: LogConfig::from_env(),
            item_bank_path,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
