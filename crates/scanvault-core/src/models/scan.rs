//! Scan lifecycle states and scan outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle state of an uploaded file.
///
/// The only legal moves are `pending -> scanning` and `scanning -> {clean, infected, error}`.
/// The three scan results are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Scanning,
    Clean,
    Infected,
    Error,
}

impl ScanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScanStatus::Clean | ScanStatus::Infected | ScanStatus::Error
        )
    }

    pub fn can_transition_to(self, next: ScanStatus) -> bool {
        match (self, next) {
            (ScanStatus::Pending, ScanStatus::Scanning) => true,
            (ScanStatus::Scanning, next) => next.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Scanning => "scanning",
            ScanStatus::Clean => "clean",
            ScanStatus::Infected => "infected",
            ScanStatus::Error => "error",
        }
    }

    /// Human-readable status line shown to clients.
    pub fn message(self) -> &'static str {
        match self {
            ScanStatus::Pending => "File uploaded successfully. Virus scan is pending.",
            ScanStatus::Scanning => "File is currently being scanned for viruses.",
            ScanStatus::Clean => "File is clean and safe to download.",
            ScanStatus::Infected => "File contains viruses and is not safe to download.",
            ScanStatus::Error => "Virus scan failed. Please contact support.",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a finished scan. Always one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScanVerdict {
    Clean,
    Infected,
    Error,
}

impl From<ScanVerdict> for ScanStatus {
    fn from(verdict: ScanVerdict) -> Self {
        match verdict {
            ScanVerdict::Clean => ScanStatus::Clean,
            ScanVerdict::Infected => ScanStatus::Infected,
            ScanVerdict::Error => ScanStatus::Error,
        }
    }
}

/// Structured result of one scan.
///
/// `threats` is non-empty only for `infected`; `error_detail` is present only for `error`.
/// Use the constructors so the shape always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScanOutcome {
    pub status: ScanVerdict,
    /// Wall-clock seconds spent scanning
    pub duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
    #[serde(default)]
    pub threats: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ScanOutcome {
    pub fn clean() -> Self {
        Self {
            status: ScanVerdict::Clean,
            duration_secs: 0.0,
            engine_version: None,
            threats: Vec::new(),
            error_detail: None,
        }
    }

    pub fn infected(threat: impl Into<String>) -> Self {
        Self {
            status: ScanVerdict::Infected,
            duration_secs: 0.0,
            engine_version: None,
            threats: vec![threat.into()],
            error_detail: None,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: ScanVerdict::Error,
            duration_secs: 0.0,
            engine_version: None,
            threats: Vec::new(),
            error_detail: Some(detail.into()),
        }
    }

    pub fn with_duration_secs(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_engine_version(mut self, version: Option<String>) -> Self {
        self.engine_version = version;
        self
    }

    pub fn is_clean(&self) -> bool {
        self.status == ScanVerdict::Clean
    }
}
