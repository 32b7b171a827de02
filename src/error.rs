use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("no DNS server configured")]
    NoDnsServer,

    #[error("no DNS resolver attached")]
    NoResolver,

    #[error("invalid hostname: {0:?}")]
    InvalidHostname(String),

    #[error("resolution failed: {0}")]
    Resolve(String),

    #[error("no DHCP client attached")]
    NoDhcpClient,
}

pub type Result<T> = std::result::Result<T, Error>;
