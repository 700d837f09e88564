// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy for patch handling.

use lvx_graph::{EntityKey, GraphError};
use lvx_scene_port::{RenderError, RenderHandle};
use thiserror::Error;

/// The request as a whole is unusable. Nothing was applied.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Body bytes are not UTF-8 once percent escapes are decoded.
    #[error("body is not valid UTF-8 after URL decoding: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    /// Body is not a JSON object.
    #[error("envelope is not a JSON object: {0}")]
    Malformed(#[source] serde_json::Error),
    /// A declared operation lacks a key it depends on.
    #[error("missing required key `{0}`")]
    MissingKey(&'static str),
    /// An operation's payload has the wrong shape.
    #[error("`{key}` payload is malformed: {source}")]
    Payload {
        /// Envelope key holding the payload.
        key: &'static str,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
}

/// One sector/object entry was skipped; the rest of the envelope proceeds.
#[derive(Debug, Error)]
pub enum EntryError {
    /// The entry's document did not decode.
    #[error("{kind} {index}: {source}")]
    Decode {
        /// `"sector"` or `"object"`.
        kind: &'static str,
        /// Requested index.
        index: usize,
        /// Decoder error.
        #[source]
        source: GraphError,
    },
    /// A deletion named an index outside the collection.
    #[error("{kind} {index}: cannot delete, collection holds {count}")]
    OutOfRange {
        /// `"sector"` or `"object"`.
        kind: &'static str,
        /// Requested index as received.
        index: i64,
        /// Collection size at the time.
        count: usize,
    },
}

/// A structural key was tracked twice without an untrack in between.
///
/// Either two live entities share content or the applier skipped a destroy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The key already mapped to a live handle; the new handle replaced it.
    #[error("key {key} already tracked by {previous}; now tracking {current}")]
    AlreadyTracked {
        /// Key tracked twice.
        key: EntityKey,
        /// Handle that was displaced.
        previous: RenderHandle,
        /// Handle now tracked.
        current: RenderHandle,
    },
}

/// Problem met while regenerating one entity.
#[derive(Debug, Error)]
pub enum GateIssue {
    /// The renderer refused the entity.
    #[error("{kind} {index}: {source}")]
    Render {
        /// `"sector"` or `"object"`.
        kind: &'static str,
        /// Collection index.
        index: usize,
        /// Renderer error.
        #[source]
        source: RenderError,
    },
    /// The entity's structural key could not be computed.
    #[error("{kind} {index}: {source}")]
    Key {
        /// `"sector"` or `"object"`.
        kind: &'static str,
        /// Collection index.
        index: usize,
        /// Encoding error.
        #[source]
        source: GraphError,
    },
    /// The entity's key collided with a live one.
    #[error("{kind} {index}: {source}")]
    Identity {
        /// `"sector"` or `"object"`.
        kind: &'static str,
        /// Collection index.
        index: usize,
        /// Collision details.
        #[source]
        source: IdentityError,
    },
}
