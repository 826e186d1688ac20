//! Error types for provisioning operations.
//!
//! Each component boundary has its own error enum. Only [`ConfigError`]
//! reaches the process boundary; the others are absorbed by the host
//! orchestrator or the status store.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration could not be loaded. Fatal to the whole process.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON.
    #[error("failed to parse config file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The configuration file is not valid YAML.
    #[error("failed to parse config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The document parsed but a field is unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A remote session could not be established. Fatal to one host.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The host address did not resolve.
    #[error("cannot resolve {addr}: {reason}")]
    Resolve { addr: String, reason: String },

    /// TCP connection failed or timed out.
    #[error("failed to dial {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The private key file could not be read.
    #[error("failed to read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SSH handshake failed.
    #[error("SSH handshake with {addr} failed: {reason}")]
    Handshake { addr: String, reason: String },

    /// The server rejected the credentials.
    #[error("authentication as {username} failed: {reason}")]
    Authentication { username: String, reason: String },

    /// The connection task itself failed.
    #[error("connection task failed: {0}")]
    Task(String),
}

/// A step inside a phase failed.
#[derive(Error, Debug)]
pub enum PhaseError {
    /// A remote command exited unsuccessfully.
    #[error("failed to execute command '{command}': {reason}\nOutput: {output}")]
    Command {
        command: String,
        reason: String,
        output: String,
    },

    /// A local transient file could not be written.
    #[error("failed to write {path}: {source}")]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document could not be copied to the remote host.
    #[error("failed to upload {path}: {reason}")]
    Upload { path: String, reason: String },

    /// A document could not be rendered from configuration.
    #[error("failed to render {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Status store read or write failed. Never fatal.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// No record exists for the host.
    #[error("no status record for host {0}")]
    NotFound(String),

    /// Filesystem operation failed.
    #[error("status I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record could not be (de)serialized.
    #[error("status serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}
