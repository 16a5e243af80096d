use thiserror::Error;

#[derive(Error, Debug)]
pub enum DrepError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown sync type: {0}")]
    UnknownSyncType(String),
}
