//! Build errors and their severity.
//!
//! Severity travels on the error value itself. A plugin that wants to stop
//! the build returns [`BuildError::critical`]; one that wants to flag a
//! problem without blocking the release returns [`BuildError::warning`].
//! Anything converted through `?` carries no marker and is treated as
//! critical, so an unexpected failure never produces a partial site quietly.

use crate::stage::Stage;
use std::fmt;
use thiserror::Error;

/// Explicit severity attached to a [`BuildError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Halts the build.
    Critical,
    /// Reported, but the build continues.
    Warning,
}

/// Result of inspecting an error's marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Critical,
    Warning,
    /// No marker. Halts the build like `Critical`.
    Unclassified,
}

impl Classification {
    pub fn halts(self) -> bool {
        !matches!(self, Classification::Warning)
    }
}

/// The underlying cause of a plugin failure.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("{0}")]
    Message(String),
    #[error("panicked: {0}")]
    Panicked(String),
    #[error("{}", format_joined(.0))]
    Multiple(Vec<BuildError>),
}

fn format_joined(errors: &[BuildError]) -> String {
    let mut out = format!("{} errors:", errors.len());
    for e in errors {
        out.push_str("\n  - ");
        out.push_str(&e.to_string());
    }
    out
}

/// An error returned from a plugin stage call.
#[derive(Debug)]
pub struct BuildError {
    marker: Option<Severity>,
    plugin: Option<String>,
    stage: Option<Stage>,
    kind: PluginError,
}

impl BuildError {
    fn new(marker: Option<Severity>, kind: PluginError) -> Self {
        Self {
            marker,
            plugin: None,
            stage: None,
            kind,
        }
    }

    /// A build-halting error.
    pub fn critical(msg: impl Into<String>) -> Self {
        Self::new(Some(Severity::Critical), PluginError::Message(msg.into()))
    }

    /// A reportable, non-halting error.
    pub fn warning(msg: impl Into<String>) -> Self {
        Self::new(Some(Severity::Warning), PluginError::Message(msg.into()))
    }

    /// An error with no severity marker.
    pub fn unclassified(msg: impl Into<String>) -> Self {
        Self::new(None, PluginError::Message(msg.into()))
    }

    pub(crate) fn panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::new(Some(Severity::Critical), PluginError::Panicked(msg))
    }

    /// Aggregate several errors into one.
    ///
    /// A single error is returned as-is. The joined error is a warning only
    /// when every part is a warning; otherwise it is critical.
    pub fn join(mut errors: Vec<BuildError>) -> Option<BuildError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => {
                let marker = if errors.iter().all(|e| e.severity() == Severity::Warning) {
                    Severity::Warning
                } else {
                    Severity::Critical
                };
                Some(Self::new(Some(marker), PluginError::Multiple(errors)))
            }
        }
    }

    /// Replace the severity marker.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.marker = Some(severity);
        self
    }

    /// Attach the plugin and stage that produced this error, unless the
    /// error already names them.
    pub fn in_plugin(mut self, plugin: &str, stage: Option<Stage>) -> Self {
        if self.plugin.is_none() {
            self.plugin = Some(plugin.to_string());
        }
        if self.stage.is_none() {
            self.stage = stage;
        }
        self
    }

    /// Effective severity: the marker, or `Critical` when absent.
    pub fn severity(&self) -> Severity {
        self.marker.unwrap_or(Severity::Critical)
    }

    pub fn plugin(&self) -> Option<&str> {
        self.plugin.as_deref()
    }

    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn kind(&self) -> &PluginError {
        &self.kind
    }

    /// The individual causes of a joined error, or just this error.
    pub fn causes(&self) -> Vec<&BuildError> {
        match &self.kind {
            PluginError::Multiple(errors) => errors.iter().flat_map(|e| e.causes()).collect(),
            _ => vec![self],
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.plugin, self.stage) {
            (Some(p), Some(s)) => write!(f, "[{p}/{s}] {}", self.kind),
            (Some(p), None) => write!(f, "[{p}] {}", self.kind),
            _ => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            PluginError::Io(e) => Some(e),
            PluginError::Json(e) => Some(e),
            PluginError::Toml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PluginError> for BuildError {
    fn from(kind: PluginError) -> Self {
        Self::new(None, kind)
    }
}

impl From<std::io::Error> for BuildError {
    fn from(e: std::io::Error) -> Self {
        PluginError::from(e).into()
    }
}

impl From<serde_json::Error> for BuildError {
    fn from(e: serde_json::Error) -> Self {
        PluginError::from(e).into()
    }
}

impl From<toml::de::Error> for BuildError {
    fn from(e: toml::de::Error) -> Self {
        PluginError::from(e).into()
    }
}

/// Inspect an error's severity marker.
pub fn classify(err: &BuildError) -> Classification {
    match err.marker {
        Some(Severity::Critical) => Classification::Critical,
        Some(Severity::Warning) => Classification::Warning,
        None => Classification::Unclassified,
    }
}
