// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Timeless Love

//! Configuration errors.

use std::fmt;
use std::path::PathBuf;

/// A single problem found while building [`Settings`](super::Settings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldIssue {
    /// Required variable absent or blank.
    Missing { key: &'static str },
    /// Variable present but could not be coerced into its type.
    Invalid { key: &'static str, reason: String },
}

impl FieldIssue {
    pub fn key(&self) -> &'static str {
        match self {
            FieldIssue::Missing { key } | FieldIssue::Invalid { key, .. } => key,
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldIssue::Missing { key } => write!(f, "{key} is required"),
            FieldIssue::Invalid { key, reason } => write!(f, "{key} is invalid ({reason})"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Every missing or malformed field, collected in declaration order.
    #[error("invalid settings: {}", join_issues(.issues))]
    Validation { issues: Vec<FieldIssue> },

    /// An override file exists but could not be read.
    #[error("failed to load env file {}: {source}", .path.display())]
    EnvFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Keys of required fields that were absent.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        match self {
            ConfigError::Validation { issues } => issues
                .iter()
                .filter(|issue| matches!(issue, FieldIssue::Missing { .. }))
                .map(FieldIssue::key)
                .collect(),
            ConfigError::EnvFile { .. } => Vec::new(),
        }
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
