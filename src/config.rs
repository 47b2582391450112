use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// DDS ledger web server
#[derive(Debug, Clone, Parser)]
#[command(name = "dds-server", version, about)]
pub struct ServerConfig {
    /// SQLite database file (created with the schema if missing)
    #[arg(long, env = "DDS_DATABASE", default_value = "dds.db")]
    pub database: PathBuf,

    /// Address to listen on
    #[arg(long, env = "DDS_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Log filter, e.g. `info` or `dds_ledger=debug,tower_http=debug`
    #[arg(long = "log", env = "DDS_LOG", default_value = "info")]
    pub log_filter: String,
}
