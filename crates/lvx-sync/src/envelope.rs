// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Patch envelope decoding.
//!
//! The collaborator posts a URL-encoded JSON object whose values are
//! themselves JSON text (double encoding). Only the outer layer is decoded
//! here; sector and object documents stay as text until the applier decodes
//! them one entry at a time, so one bad entry cannot sink the request.

use std::collections::BTreeMap;

use percent_encoding::percent_decode;
use serde_json::{Map, Value};

use crate::EnvelopeError;

/// Fixed acknowledgement body, sent before the patch is applied.
pub const ACK_BODY: &str = "Processed. ";

/// Updates and deletions for one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    /// Index → entity document, ascending by index.
    pub updates: BTreeMap<usize, String>,
    /// Indices to remove, as received (unsorted, possibly out of range).
    pub deletions: Vec<i64>,
}

/// One decoded patch request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    /// Archive to mount (`GOBPath`).
    pub gob_path: Option<String>,
    /// Level to select (`LEVPath`).
    pub lev_path: Option<String>,
    /// Full reload requested; every other operation is ignored.
    pub reset: bool,
    /// Reposition the camera after regenerating objects.
    pub update_camera: bool,
    /// `Sectors` / `SectorsDel`.
    pub sectors: Option<Batch>,
    /// `Objects` / `ObjectsDel`.
    pub objects: Option<Batch>,
}

impl Envelope {
    /// Decode a raw request body: URL decoding, then [`from_json`](Self::from_json).
    pub fn from_body(body: &[u8]) -> Result<Self, EnvelopeError> {
        let text = url_decode(body)?;
        Self::from_json(&text)
    }

    /// Decode the outer JSON object.
    ///
    /// Values are expected to be JSON strings. Any other JSON value is taken
    /// as its own serialized text. `Reset` requires `LEVPath`; `Sectors`
    /// requires `SectorsDel`; `Objects` requires `ObjectsDel`. A deletion list
    /// without its update key is ignored.
    pub fn from_json(text: &str) -> Result<Self, EnvelopeError> {
        let mut doc: Map<String, Value> =
            serde_json::from_str(text).map_err(EnvelopeError::Malformed)?;

        let mut envelope = Self {
            reset: doc.contains_key("Reset"),
            update_camera: doc.contains_key("UpdateCamera"),
            gob_path: doc.remove("GOBPath").map(into_text),
            lev_path: doc.remove("LEVPath").map(into_text),
            ..Self::default()
        };

        if envelope.reset {
            if envelope.lev_path.is_none() {
                return Err(EnvelopeError::MissingKey("LEVPath"));
            }
            return Ok(envelope);
        }

        envelope.sectors = batch(&mut doc, "Sectors", "SectorsDel")?;
        envelope.objects = batch(&mut doc, "Objects", "ObjectsDel")?;
        Ok(envelope)
    }
}

/// Decode `application/x-www-form-urlencoded` style text: `+` is a space,
/// `%XX` is a byte.
pub fn url_decode(body: &[u8]) -> Result<String, std::str::Utf8Error> {
    let spaced: Vec<u8> = body
        .iter()
        .map(|&byte| if byte == b'+' { b' ' } else { byte })
        .collect();
    Ok(percent_decode(&spaced).decode_utf8()?.into_owned())
}

fn into_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn is_blank(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text == "null"
}

fn batch(
    doc: &mut Map<String, Value>,
    updates_key: &'static str,
    deletions_key: &'static str,
) -> Result<Option<Batch>, EnvelopeError> {
    let Some(updates) = doc.remove(updates_key).map(into_text) else {
        return Ok(None);
    };
    let deletions = doc
        .remove(deletions_key)
        .map(into_text)
        .ok_or(EnvelopeError::MissingKey(deletions_key))?;

    let mut out = Batch::default();
    if !is_blank(&updates) {
        let entries: BTreeMap<usize, Value> =
            serde_json::from_str(&updates).map_err(|source| EnvelopeError::Payload {
                key: updates_key,
                source,
            })?;
        out.updates = entries
            .into_iter()
            .map(|(index, document)| (index, into_text(document)))
            .collect();
    }
    if !is_blank(&deletions) {
        out.deletions =
            serde_json::from_str(&deletions).map_err(|source| EnvelopeError::Payload {
                key: deletions_key,
                source,
            })?;
    }
    Ok(Some(out))
}
