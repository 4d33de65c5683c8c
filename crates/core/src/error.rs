//! Error taxonomy for the personalization engine.
//!
//! Four failure classes: parse faults in directive or auxiliary rows,
//! references to unknown namespaces/collections/keys, path-resolution
//! faults, and watch-service faults. Propagation policy: a bad row is
//! skipped and logged, a bad auxiliary file aborts only its own directive,
//! a missing control file yields an empty pass for its category.

use std::path::PathBuf;

use thiserror::Error;

/// Namespace-to-filesystem resolution failures.
#[derive(Error, Debug)]
pub enum PathError {
    /// The namespace is not rooted in the addressing scheme (or the path is
    /// not under the source root).
    #[error("namespace '{0}' is outside the root addressing scheme")]
    OutsideRoot(String),

    /// Resolution landed inside the generated-output root. Personalizing a
    /// generated file would feed the engine its own output.
    #[error("'{0}' resolves inside the generated-output root")]
    InsideGenerated(String),

    /// Two candidate files satisfy the namespace: a flat source file and a
    /// directory's default source file. Never guessed, always reported.
    #[error("namespace '{namespace}' is ambiguous: both {} and {} exist", flat.display(), nested.display())]
    Ambiguous {
        namespace: String,
        flat: PathBuf,
        nested: PathBuf,
    },
}

/// Errors raised while loading, merging, or regenerating personalizations.
#[derive(Error, Debug)]
pub enum PersonalizeError {
    /// Malformed directive or auxiliary row.
    #[error("parse error: {0}")]
    Parse(String),

    /// Unknown namespace, collection, or key.
    #[error("reference error: {0}")]
    Reference(String),

    /// Namespace/path resolution failure.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Watch subscribe/unsubscribe on a vanished path.
    #[error("watch error: {0}")]
    Watch(String),

    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for personalization operations.
pub type Result<T> = std::result::Result<T, PersonalizeError>;
