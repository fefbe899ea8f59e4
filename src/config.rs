// ⚙️ Configuration - environment driven, CLI flags override
//
// HISTORY_DATA          accounts file (.json or .csv)
// HISTORY_PAGE_SIZE     records per page (default 20)
// HISTORY_SUB_ACCOUNTS  include sub-accounts (default true)
// HISTORY_ADDR          server bind address (default 127.0.0.1:3000)

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryConfig {
    pub data_path: Option<PathBuf>,
    pub page_size: usize,
    pub with_sub_accounts: bool,
    pub server_addr: SocketAddr,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            data_path: None,
            page_size: DEFAULT_PAGE_SIZE,
            with_sub_accounts: true,
            server_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

impl HistoryConfig {
    /// Read from the process environment (call `dotenvy::dotenv()` first to pick up `.env`)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = HistoryConfig::default();

        if let Some(path) = lookup("HISTORY_DATA") {
            config.data_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup("HISTORY_PAGE_SIZE") {
            config.page_size = raw
                .trim()
                .parse()
                .with_context(|| format!("HISTORY_PAGE_SIZE must be a non-negative integer, got '{}'", raw))?;
        }
        if let Some(raw) = lookup("HISTORY_SUB_ACCOUNTS") {
            config.with_sub_accounts = parse_flag(&raw)
                .with_context(|| format!("HISTORY_SUB_ACCOUNTS must be true/false, got '{}'", raw))?;
        }
        if let Some(raw) = lookup("HISTORY_ADDR") {
            config.server_addr = raw
                .trim()
                .parse()
                .with_context(|| format!("HISTORY_ADDR must be host:port, got '{}'", raw))?;
        }

        Ok(config)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
