//! Merging independent sub-query results into one snapshot

use tracing::{error, warn};

use crate::error::{classify, describe, AppError, FailureKind, Result};
use crate::models::{NoteKind, OptionalRows, SectionNote};

/// Collects the outcome of each sub-query of a snapshot build.
///
/// A connection failure in any section fails the build. Every other failure
/// leaves its field empty and records a note.
#[derive(Debug, Default)]
pub(crate) struct Sections {
    notes: Vec<SectionNote>,
}

impl Sections {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Settle a required section: `Ok(None)` when it degraded.
    pub(crate) fn settle<T>(
        &mut self,
        section: &'static str,
        result: std::result::Result<T, sqlx::Error>,
    ) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                let kind = self.failure(section, &err)?;
                self.note(section, kind, describe(&err));
                Ok(None)
            }
        }
    }

    /// Settle a section backed by an optional extension. A missing extension
    /// is an explicit empty result rather than an absent field.
    pub(crate) fn settle_optional<T>(
        &mut self,
        section: &'static str,
        result: std::result::Result<Vec<T>, sqlx::Error>,
    ) -> Result<Option<OptionalRows<T>>> {
        match result {
            Ok(rows) => Ok(Some(OptionalRows::available(rows))),
            Err(err) => match self.failure(section, &err)? {
                NoteKind::Unavailable => {
                    self.note(section, NoteKind::Unavailable, describe(&err));
                    Ok(Some(OptionalRows::unavailable()))
                }
                NoteKind::Failed => {
                    self.note(section, NoteKind::Failed, describe(&err));
                    Ok(None)
                }
            },
        }
    }

    /// Number of sections that degraded so far.
    pub(crate) fn degraded(&self) -> usize {
        self.notes.len()
    }

    pub(crate) fn into_notes(self) -> Vec<SectionNote> {
        self.notes
    }

    fn failure(&self, section: &'static str, err: &sqlx::Error) -> Result<NoteKind> {
        match classify(err) {
            FailureKind::Connection => {
                error!(section, error = %err, "Database unreachable, snapshot aborted");
                Err(AppError::ConnectionError(describe(err)))
            }
            FailureKind::SourceUnavailable => {
                warn!(section, error = %err, "Statistics source unavailable");
                Ok(NoteKind::Unavailable)
            }
            FailureKind::Query => {
                warn!(section, error = %err, "Statistics query failed");
                Ok(NoteKind::Failed)
            }
        }
    }

    fn note(&mut self, section: &'static str, kind: NoteKind, message: String) {
        self.notes.push(SectionNote {
            section,
            kind,
            message,
        });
    }
}
