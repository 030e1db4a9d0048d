use core_text::{DiffEngine, DiffError, DiffPart, char_len};
use std::time::Instant;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Added,
    Removed,
    Common,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSegment {
    pub kind: SegmentKind,
    pub text: String,
}

impl EditSegment {
    /// Map one diff part. A part flagged both added and removed has no meaning
    /// and is rejected.
    pub fn from_part(part: DiffPart) -> Result<Self, DiffError> {
        let kind = match (part.added, part.removed) {
            (false, false) => SegmentKind::Common,
            (true, false) => SegmentKind::Added,
            (false, true) => SegmentKind::Removed,
            (true, true) => {
                return Err(DiffError::Malformed(
                    "part flagged both added and removed".into(),
                ));
            }
        };
        Ok(Self {
            kind,
            text: part.value,
        })
    }
}

/// One recognized text mutation.
///
/// Invariant: `Common`+`Added` segments concatenate to the new snapshot and
/// `Common`+`Removed` segments concatenate to the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRecord {
    pub timestamp: Instant,
    pub segments: Vec<EditSegment>,
}

impl EditRecord {
    pub fn old_text(&self) -> String {
        self.collect(SegmentKind::Removed)
    }

    pub fn new_text(&self) -> String {
        self.collect(SegmentKind::Added)
    }

    pub fn added_chars(&self) -> usize {
        self.count(SegmentKind::Added)
    }

    pub fn removed_chars(&self) -> usize {
        self.count(SegmentKind::Removed)
    }

    fn collect(&self, side: SegmentKind) -> String {
        self.segments
            .iter()
            .filter(|s| s.kind == SegmentKind::Common || s.kind == side)
            .map(|s| s.text.as_str())
            .collect()
    }

    fn count(&self, kind: SegmentKind) -> usize {
        self.segments
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| char_len(&s.text))
            .sum()
    }
}

/// Aggregate edit statistics over a log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditTotals {
    pub edits: usize,
    pub added_chars: usize,
    pub removed_chars: usize,
}

/// Chronological edit records of the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditLog {
    records: Vec<EditRecord>,
}

impl EditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[EditRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&EditRecord> {
        self.records.last()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn totals(&self) -> EditTotals {
        self.records.iter().fold(
            EditTotals {
                edits: self.records.len(),
                ..EditTotals::default()
            },
            |mut acc, r| {
                acc.added_chars += r.added_chars();
                acc.removed_chars += r.removed_chars();
                acc
            },
        )
    }

    fn push(&mut self, record: EditRecord) -> &EditRecord {
        self.records.push(record);
        let idx = self.records.len() - 1;
        &self.records[idx]
    }
}

/// Turns snapshot pairs into edit records through a pluggable diff engine.
pub struct EditRecorder {
    engine: Box<dyn DiffEngine>,
}

impl std::fmt::Debug for EditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditRecorder").finish_non_exhaustive()
    }
}

impl EditRecorder {
    pub fn new(engine: Box<dyn DiffEngine>) -> Self {
        Self { engine }
    }

    /// Diff `old` against `new` and append the record to `log`.
    ///
    /// Returns `None` without touching the log when the snapshots are equal or
    /// when the engine fails; engine faults are logged at debug and swallowed.
    pub fn record<'a>(
        &self,
        log: &'a mut EditLog,
        old: &str,
        new: &str,
        now: Instant,
    ) -> Option<&'a EditRecord> {
        if old == new {
            return None;
        }
        let segments = match self.segments(old, new, now) {
            Ok(segments) => segments,
            Err(err) => {
                debug!(target: "session.edit", error = %err, "edit_record_skipped");
                return None;
            }
        };
        let record = log.push(EditRecord {
            timestamp: now,
            segments,
        });
        trace!(
            target: "session.edit",
            segments = record.segments.len(),
            added = record.added_chars(),
            removed = record.removed_chars(),
            "edit_recorded"
        );
        Some(record)
    }

    fn segments(&self, old: &str, new: &str, now: Instant) -> Result<Vec<EditSegment>, DiffError> {
        let parts = self.engine.diff(old, new)?;
        let segments = parts
            .into_iter()
            .map(EditSegment::from_part)
            .collect::<Result<Vec<_>, _>>()?;
        let record = EditRecord {
            timestamp: now,
            segments,
        };
        // Engines are pluggable; reject output that does not rebuild both sides.
        if record.old_text() != old || record.new_text() != new {
            return Err(DiffError::Malformed(
                "segments do not reconstruct snapshots".into(),
            ));
        }
        Ok(record.segments)
    }
}
