//! The note-format convention linking imported transactions to generated rules.

/// Marker the import pipeline writes ahead of the counterparty name,
/// unless the operator configures another one.
pub const DEFAULT_MARKER: &str = "Original account name:";

/// The convention for recording a counterparty name inside a transaction note.
///
/// The import pipeline appends `<marker> <name>` as one line of the note.
/// The same text is embedded verbatim in the triggers of generated rules, so
/// extraction, rule generation, and coverage parsing all go through this one
/// type and cannot drift apart.
#[derive(Debug, Clone)]
pub struct NoteFormat {
    marker: String,
}

impl Default for NoteFormat {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

impl NoteFormat {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into().trim().to_string(),
        }
    }

    /// Extract the counterparty name from a note.
    ///
    /// The marker may appear anywhere in the note; the name is the remainder
    /// of that line, trimmed. Returns `None` when the marker is absent or
    /// nothing follows it.
    pub fn extract<'a>(&self, note: &'a str) -> Option<&'a str> {
        let start = note.find(&self.marker)? + self.marker.len();
        let rest = &note[start..];
        let line = match rest.find('\n') {
            Some(end) => &rest[..end],
            None => rest,
        };
        let name = line.trim();
        (!name.is_empty()).then_some(name)
    }

    /// The exact trigger value embedded in generated rules.
    pub fn fragment(&self, name: &str) -> String {
        format!("{} {}", self.marker, name)
    }

    /// Recover the counterparty name from a trigger value this system
    /// generated. Values of any other shape return `None`.
    pub fn parse_fragment<'a>(&self, value: &'a str) -> Option<&'a str> {
        let name = value.strip_prefix(&self.marker)?.trim();
        (!name.is_empty()).then_some(name)
    }
}
