use std::{fmt, path::PathBuf};

use super::columns::Role;

/// Why a single encoding candidate did not yield a table.
#[derive(Debug, thiserror::Error)]
pub enum AttemptFailure {
    #[error("bytes are not valid {0}")]
    Undecodable(&'static str),

    #[error("no header keyword in the first {scanned} lines")]
    NoHeader { scanned: usize },

    #[error("unreadable header record: {0}")]
    Csv(#[from] csv::Error),
}

/// A candidate encoding together with the reason it was rejected.
#[derive(Debug)]
pub struct FailedAttempt {
    pub encoding: &'static str,
    pub failure: AttemptFailure,
}

impl fmt::Display for FailedAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.encoding, self.failure)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no encoding produced a table for {} [{}]", .path.display(), join(.attempts))]
    Exhausted {
        path: PathBuf,
        attempts: Vec<FailedAttempt>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("missing columns for {} (found headers: {headers:?})", join(.missing))]
    MissingRoles { missing: Vec<Role>, headers: Vec<String> },
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
