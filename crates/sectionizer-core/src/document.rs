use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::SectionizeError;

/// Key under which the reference block is stored in processed output.
pub const REFERENCES_KEY: &str = "References";

/// Heading used when a document has no detectable headings at all.
pub const FALLBACK_HEADING: &str = "text";

// ── SectionMap ──────────────────────────────────────────────────────────

/// Insertion-ordered heading → body mapping.
///
/// Order mirrors reading order. Inserting an existing heading overwrites its
/// body in place, keeping the original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionMap {
    entries: Vec<(String, String)>,
}

impl SectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, heading: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == heading)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, heading: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == heading)
    }

    /// Insert or overwrite. Returns the previous body if the heading existed.
    pub fn insert(&mut self, heading: String, body: String) -> Option<String> {
        if let Some((_, existing)) = self.entries.iter_mut().find(|(k, _)| *k == heading) {
            return Some(std::mem::replace(existing, body));
        }
        self.entries.push((heading, body));
        None
    }

    /// Remove a heading, preserving the order of the remaining entries.
    pub fn remove(&mut self, heading: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == heading)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The last entry in reading order.
    pub fn last(&self) -> Option<(&str, &str)> {
        self.entries.last().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Remove entries for which `keep` returns `false`, returning them in order.
    pub fn extract_if_not<F>(&mut self, mut keep: F) -> Vec<(String, String)>
    where
        F: FnMut(&str) -> bool,
    {
        let (kept, removed): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|(k, _)| keep(k));
        self.entries = kept;
        removed
    }
}

impl FromIterator<(String, String)> for SectionMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut map = SectionMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for SectionMap {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for SectionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SectionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SectionMapVisitor;

        impl<'de> Visitor<'de> for SectionMapVisitor {
            type Value = SectionMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of heading to section text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<SectionMap, A::Error> {
                let mut map = SectionMap::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    map.insert(k, v);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(SectionMapVisitor)
    }
}

// ── Rejected fragments ──────────────────────────────────────────────────

/// Text dropped from a document, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectedFragment {
    /// A single body line that failed the line classifier.
    Line { heading: String, text: String },
    /// A whole span: invalid, dropped by keyword, or cut off by a halt.
    Span { heading: String, body: String },
}

impl RejectedFragment {
    pub fn heading(&self) -> &str {
        match self {
            RejectedFragment::Line { heading, .. } | RejectedFragment::Span { heading, .. } => {
                heading
            }
        }
    }
}

// ── Classified document ─────────────────────────────────────────────────

/// The final artifact of one classification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedDocument {
    pub sections: SectionMap,
    pub rejected: Vec<RejectedFragment>,
    pub references: Option<String>,
    /// `true` when no heading was found and the whole text became one section.
    pub fallback: bool,
}

impl ClassifiedDocument {
    /// Sections in reading order with the reference block appended last.
    pub fn to_processed_map(&self) -> SectionMap {
        let mut map = self.sections.clone();
        if let Some(refs) = &self.references {
            map.insert(REFERENCES_KEY.to_string(), refs.clone());
        }
        map
    }
}

// ── Raw input shapes ────────────────────────────────────────────────────

/// A `text` field holding either one string or a list of fragments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    One(String),
    Many(Vec<String>),
}

impl TextField {
    fn into_joined(self) -> String {
        match self {
            TextField::One(s) => s,
            TextField::Many(parts) => parts.join("\n"),
        }
    }
}

/// The container shapes upstream extraction produces, normalized once here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    /// A plain text file.
    PlainText(String),
    /// `{"response": {"docs": [{"text": ...}, ...]}}`; the first doc is used.
    Envelope(Vec<TextField>),
    /// `{"text": ...}`
    Object(TextField),
    /// `[...]` of fragments or `{"text": ...}` objects, joined in order.
    List(Vec<TextField>),
}

#[derive(Deserialize)]
struct EnvelopeDoc {
    text: TextField,
}

#[derive(Deserialize)]
struct EnvelopeResponse {
    docs: Vec<EnvelopeDoc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListEntry {
    Fragment(String),
    Object { text: TextField },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonShape {
    Envelope { response: EnvelopeResponse },
    Object { text: TextField },
    List(Vec<ListEntry>),
}

impl RawInput {
    /// Parse one of the JSON container shapes.
    pub fn from_json_str(content: &str) -> Result<Self, SectionizeError> {
        let shape: JsonShape = serde_json::from_str(content).map_err(|e| {
            SectionizeError::Malformed(format!("unrecognized document shape: {}", e))
        })?;
        Ok(match shape {
            JsonShape::Envelope { response } => {
                RawInput::Envelope(response.docs.into_iter().map(|d| d.text).collect())
            }
            JsonShape::Object { text } => RawInput::Object(text),
            JsonShape::List(entries) => RawInput::List(
                entries
                    .into_iter()
                    .map(|e| match e {
                        ListEntry::Fragment(s) => TextField::One(s),
                        ListEntry::Object { text } => text,
                    })
                    .collect(),
            ),
        })
    }

    /// Read a document from disk: `.json` files are parsed as one of the
    /// container shapes, anything else is plain text.
    pub fn from_path(path: &Path) -> Result<Self, SectionizeError> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json_str(&content)
        } else {
            Ok(RawInput::PlainText(content))
        }
    }

    /// Normalize to the canonical full-text string.
    pub fn into_text(self) -> Result<String, SectionizeError> {
        let text = match self {
            RawInput::PlainText(s) => s,
            RawInput::Envelope(docs) => docs
                .into_iter()
                .next()
                .ok_or_else(|| SectionizeError::Malformed("response has no docs".to_string()))?
                .into_joined(),
            RawInput::Object(field) => field.into_joined(),
            RawInput::List(fields) => fields
                .into_iter()
                .map(TextField::into_joined)
                .collect::<Vec<_>>()
                .join("\n"),
        };

        if text.trim().is_empty() {
            return Err(SectionizeError::Malformed("document text is empty".to_string()));
        }
        Ok(text)
    }
}
