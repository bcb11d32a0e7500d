//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`EmberError`] covers all failure modes including:
//! - GPU command execution failures reported by the graphics backend
//! - Asset decoding and lookup errors
//! - Scheduler and thread lifecycle errors
//!
//! Recoverable conditions (an asset that is not ready yet, a transient
//! resource that could not be allocated) are handled locally by the pipeline
//! stages; the variants here are what crosses a public API boundary.

use thiserror::Error;

/// The main error type for the Ember engine.
#[derive(Error, Debug)]
pub enum EmberError {
    // ========================================================================
    // GPU & Rendering Errors
    // ========================================================================
    /// The graphics backend rejected a recorded command.
    #[error("graphics backend error: {0}")]
    GraphicsBackend(String),

    /// A GPU resource could not be allocated (texture, buffer, framebuffer).
    #[error("out of GPU resources: {0}")]
    OutOfGpuResources(String),

    /// A framebuffer was incomplete at validation time.
    #[error("incomplete framebuffer: {0}")]
    IncompleteFramebuffer(String),

    // ========================================================================
    // Asset Errors
    // ========================================================================
    /// The requested asset was not found.
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// An asset blob failed to decode.
    #[error("asset decode error: {context}: {reason}")]
    AssetDecode {
        /// Which asset or format was being decoded
        context: String,
        /// What went wrong
        reason: String,
    },

    /// An asset scheme was used before being registered.
    #[error("asset scheme not registered: {0}")]
    SchemeNotRegistered(&'static str),

    // ========================================================================
    // Engine Lifecycle Errors
    // ========================================================================
    /// A pipeline thread could not be spawned.
    #[error("failed to start engine thread: {0}")]
    ThreadStart(String),

    /// The engine was started twice or driven after it stopped.
    #[error("invalid engine state: {0}")]
    InvalidState(&'static str),

    // ========================================================================
    // I/O & Configuration Errors
    // ========================================================================
    /// File or socket I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration document parsing error.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A configuration value could not be interpreted as the requested type.
    #[error("config type error: key {key} does not hold a {expected}")]
    ConfigType {
        /// The offending key
        key: String,
        /// The type the caller asked for
        expected: &'static str,
    },
}

/// Alias for `Result<T, EmberError>`.
pub type Result<T> = std::result::Result<T, EmberError>;
