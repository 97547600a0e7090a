//! Core data types shared across the pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Dense integer key identifying one harvested record.
///
/// Record ids are assigned by the upstream source. They double as the
/// partition key and as the prefix of every storage key written for the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Key of the record's JSON object, the completion marker.
    #[must_use]
    pub fn record_key(self) -> String {
        format!("{}.json", self.0)
    }

    /// Key of an asset of the given kind.
    #[must_use]
    pub fn asset_key(self, kind: AssetKind) -> String {
        format!("{}.{}", self.0, kind.extension())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Structured metadata extracted from a record's page.
///
/// Serialized as `{"owner": .., "genes": .., "gen": ..}`. Field order is part
/// of the on-disk shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Owner handle as displayed on the page.
    pub owner: String,
    /// `0x` followed by the concatenated hex gene segments.
    #[serde(rename = "genes")]
    pub genome_hex: String,
    /// Generation number as displayed (kept as text).
    #[serde(rename = "gen")]
    pub generation: String,
}

impl Record {
    /// Serialize with one tab per indentation level.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(128);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(buf)
    }

    /// Parse a record previously written with [`Record::to_json_bytes`].
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Kind of binary side-resource captured while a page loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Raster image, stored as `.png`.
    Image,
    /// Vector graphic, stored as `.svg`.
    Vector,
}

impl AssetKind {
    /// File extension used in the storage key.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Image => "png",
            Self::Vector => "svg",
        }
    }

    /// Infer the kind from a resource URL.
    ///
    /// For absolute URLs the path's extension decides; anything that does not
    /// parse as a URL is searched for the extension instead.
    #[must_use]
    pub fn from_url(raw: &str) -> Option<Self> {
        let (haystack, whole_path) = match url::Url::parse(raw) {
            Ok(parsed) => (parsed.path().to_ascii_lowercase(), true),
            Err(_) => (raw.to_ascii_lowercase(), false),
        };
        let has = |ext: &str| {
            if whole_path {
                haystack.ends_with(ext)
            } else {
                haystack.contains(ext)
            }
        };
        if has(".svg") {
            Some(Self::Vector)
        } else if has(".png") {
            Some(Self::Image)
        } else {
            None
        }
    }

    /// Infer the kind from a response MIME type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/svg+xml" => Some(Self::Vector),
            "image/png" => Some(Self::Image),
            _ => None,
        }
    }
}

/// A binary blob observed during rendering, tied to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Inferred kind.
    pub kind: AssetKind,
    /// URL the blob was loaded from.
    pub source_url: String,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}
