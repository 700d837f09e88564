// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structural keys: content-derived identity for rendered entities.

use std::fmt;

use ciborium::ser::into_writer;
use serde::Serialize;

use crate::GraphError;

/// 32-byte BLAKE3 digest of an entity's canonical encoding.
///
/// Two entities with identical serialized content share a key regardless of
/// their position in the level. Derived state (wall back-references, portal
/// links) is never part of the encoding.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EntityKey(pub [u8; 32]);

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell entities apart in logs.
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Compute the structural key of any serializable value.
///
/// Map keys in `serde_json::Map` are ordered, so the CBOR encoding is canonical
/// for the document types in this crate.
pub fn structural_key<T>(value: &T) -> Result<EntityKey, GraphError>
where
    T: Serialize + ?Sized,
{
    let mut bytes = Vec::new();
    into_writer(value, &mut bytes).map_err(|err| GraphError::Encode(err.to_string()))?;
    Ok(EntityKey(blake3::hash(&bytes).into()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_ignores_map_insertion_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"A":1,"B":2}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"B":2,"A":1}"#).unwrap();
        assert_eq!(structural_key(&a).unwrap(), structural_key(&b).unwrap());
    }

    #[test]
    fn key_differs_on_content() {
        let a = structural_key(&json!({"Layer": 1})).unwrap();
        let b = structural_key(&json!({"Layer": 2})).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_short_hex() {
        let key = EntityKey([0xab; 32]);
        assert_eq!(key.to_string(), "abababababababab");
    }
}
