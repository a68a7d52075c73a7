//! Error types shared across the model.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Everything that can stop a run.
#[derive(Debug, Error)]
pub enum ModelError {
    /// I/O failure on a named file.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed raster header, matrix or attribute table.
    #[error("grid error ({context}): {message}")]
    Grid { context: String, message: String },

    /// Setup problems, collected before aborting.
    #[error("setup failed with {} problem(s):\n  {}", .0.len(), .0.join("\n  "))]
    Setup(Vec<String>),

    /// Lookup outside a response table, or a malformed value during an update.
    #[error("domain error for species {species} at cell {cell}: {message}")]
    Domain {
        species: String,
        cell: String,
        message: String,
    },

    /// A planting pushed total cover past tolerance.
    #[error("planting error at row {row}, col {col}: {message}")]
    Planting { row: usize, col: usize, message: String },

    /// Configuration file could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ModelError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn grid(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Grid {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Problems carried by a setup error, or the message of any other error.
    pub fn problems(&self) -> Vec<String> {
        match self {
            Self::Setup(problems) => problems.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// Accumulates setup problems so they can be reported together.
#[derive(Debug, Default)]
pub struct Problems {
    items: Vec<String>,
}

impl Problems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, problem: impl Into<String>) {
        self.items.push(problem.into());
    }

    /// Record the error of `result` (flattening nested setup errors) and hand back the value.
    pub fn take<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.items.extend(err.problems());
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `Ok(value)` when nothing was recorded, otherwise every problem at once.
    pub fn finish<T>(self, value: T) -> Result<T> {
        if self.items.is_empty() {
            Ok(value)
        } else {
            Err(ModelError::Setup(self.items))
        }
    }
}
