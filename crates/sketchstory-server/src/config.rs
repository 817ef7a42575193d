use std::net::SocketAddr;

use clap::Parser;

/// Default number of strokes kept per session for late joiners.
pub const DEFAULT_MAX_HISTORY: usize = 1000;

/// Default capacity of each session's broadcast channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub max_history: usize,
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3030)),
            max_history: DEFAULT_MAX_HISTORY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "sketchstory-server")]
#[command(about = "WebSocket relay for shared SketchStory drawings")]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "SKETCHSTORY_ADDR", default_value = "0.0.0.0:3030")]
    pub addr: SocketAddr,
    /// Strokes kept per session and replayed to joiners (0 disables replay)
    #[arg(long, env = "SKETCHSTORY_MAX_HISTORY", default_value_t = DEFAULT_MAX_HISTORY)]
    pub max_history: usize,
    /// Broadcast channel capacity per session
    #[arg(long, env = "SKETCHSTORY_CHANNEL_CAPACITY", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            addr: cli.addr,
            max_history: cli.max_history,
            channel_capacity: cli.channel_capacity.max(1),
        }
    }
}
