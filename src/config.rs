use std::fs::read_to_string;

use clap::Parser;
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match *self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct Log {
    #[serde(default)]
    pub level: LogLevel,
}

#[derive(Deserialize, Debug)]
pub struct ClientConfig {
    /// comma-separated `host:port` list with an optional trailing
    /// `/chroot/path`.
    pub connect_string: String,

    /// the timeout requested during the connect handshake, in
    /// milliseconds; the server may negotiate a different value.
    #[serde(default = "ClientConfig::session_timeout_ms")]
    pub session_timeout_ms: i32,

    /// upper bound on an accepted frame's payload length.
    #[serde(default = "ClientConfig::max_frame_len")]
    pub max_frame_len: usize,

    #[serde(default)]
    pub log: Log,
}

impl ClientConfig {
    fn session_timeout_ms() -> i32 {
        30_000
    }

    fn max_frame_len() -> usize {
        codec::MAX_FRAME_LEN
    }
}

#[derive(Parser)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
)]
pub struct Cli {
    /// specify the configuration file path.
    #[arg(long)]
    pub config: Option<String>,
}

impl ClientConfig {
    /// Loads from the path given on the command line, or the default
    /// configuration if none is specified.
    pub fn load() -> Self {
        let cfg_str = Cli::parse()
            .config
            .and_then(|path| read_to_string(path).ok())
            .unwrap_or_default();

        serde_json5::from_str(&cfg_str).expect("read config file failed!")
    }
}
