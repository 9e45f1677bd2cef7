//! Relay tuning knobs and the command-line surface of the `parley` binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Runtime settings shared by every connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// How long a single outbound send may take before that recipient is
    /// skipped for the message.
    pub send_timeout: Duration,

    /// Close a connection that sends nothing for this long. `None` keeps
    /// idle connections open indefinitely.
    pub idle_timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(5),
            idle_timeout: None,
        }
    }
}

/// Minimal real-time chat relay
#[derive(Parser, Debug, Clone)]
#[command(name = "parley", version, about = "Minimal real-time chat relay")]
pub struct Cli {
    /// Host to listen on
    #[arg(short = 'H', long, env = "PARLEY_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PARLEY_PORT", default_value_t = 6969)]
    pub port: u16,

    /// SQLite database for message history. Without it, history is off.
    #[arg(short, long, env = "PARLEY_DATABASE")]
    pub database: Option<PathBuf>,

    /// Per-recipient send timeout, in milliseconds
    #[arg(long, env = "PARLEY_SEND_TIMEOUT_MS", default_value_t = 5000)]
    pub send_timeout_ms: u64,

    /// Close connections idle for this many seconds (0 disables)
    #[arg(long, env = "PARLEY_IDLE_TIMEOUT_SECS", default_value_t = 0)]
    pub idle_timeout_secs: u64,
}

impl Cli {
    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The relay settings selected on the command line.
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            idle_timeout: (self.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(self.idle_timeout_secs)),
        }
    }
}
