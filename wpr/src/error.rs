// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::types::{DeviceId, HostId};

/// Problems with the static configuration. These are detected while the
/// application activates and are fatal to activation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("config parse error {0}")]
    Json(#[from] serde_json::Error),

    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("line {line}: duplicate capacity entry {src} -> {dst}")]
    DuplicateCapacity { line: usize, src: usize, dst: usize },

    #[error("invalid capacity {value} for {src} -> {dst}")]
    InvalidCapacity { src: usize, dst: usize, value: f64 },

    #[error("capacity table is empty")]
    EmptyCapacity,

    #[error("device index for {device}: {reason}")]
    DeviceIndex { device: String, reason: String },

    #[error("no capacity entry for link {0}")]
    MissingCapacity(String),

    #[error("invalid setting {0}")]
    Invalid(String),
}

/// Failures reported by the forwarding-state installer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallError {
    #[error("rejected {0}")]
    Rejected(String),

    #[error("unavailable {0}")]
    Unavailable(String),

    #[error("unknown intent {0}")]
    UnknownIntent(String),
}

/// Per-flow routing failures. None of these affect other flows.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("no path from {src} to {dst}")]
    NoPath { src: DeviceId, dst: DeviceId },

    #[error("unknown host {0}")]
    UnknownHost(HostId),

    #[error("install error {0}")]
    Install(#[from] InstallError),

    #[error("shutting down")]
    ShuttingDown,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("configuration error {0}")]
    Config(#[from] ConfigError),

    #[error("flow error {0}")]
    Flow(#[from] FlowError),
}
