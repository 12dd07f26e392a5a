use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NavError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("edge table is full")]
    EdgeTableFull,
    #[error("unknown edge handle {0}")]
    UnknownEdgeHandle(u8),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing line sensors")]
    MissingSensors,
    #[error("missing drive")]
    MissingDrive,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
