//! Opaque continuation tokens.
//!
//! A cursor is the base64url encoding of a small JSON document naming the
//! sort order it was minted under and the key of the last item delivered.
//! When a secret is configured the payload is followed by `.` and an
//! HMAC-SHA256 tag, so clients cannot forge positions.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use tracing::warn;

use super::sort::{KeyValue, SortKey, SortOrder};
use crate::error::{PacerError, Result};

type HmacSha256 = Hmac<Sha256>;

const CURSOR_VERSION: u8 = 1;

/// Upper bound on token length, applied when minting and when decoding so
/// that every cursor handed out can be resumed from. Roughly 6 KiB of
/// text key fits.
pub const MAX_CURSOR_LEN: usize = 8192;

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Payload {
    v: u8,
    s: String,
    k: Vec<KeyValue>,
}

/// Encodes and decodes cursors.
#[derive(Clone)]
pub struct CursorCodec {
    signer: Option<HmacSha256>,
}

impl CursorCodec {
    /// A codec producing unsigned cursors.
    pub fn unsigned() -> Self {
        Self { signer: None }
    }

    /// A codec that signs cursors with `secret` and rejects any cursor
    /// whose tag does not verify.
    pub fn signed(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(PacerError::Config("cursor secret must not be empty".to_string()));
        }
        let signer = HmacSha256::new_from_slice(secret)
            .map_err(|e| PacerError::Config(format!("invalid cursor secret: {}", e)))?;
        Ok(Self {
            signer: Some(signer),
        })
    }

    pub fn is_signed(&self) -> bool {
        self.signer.is_some()
    }

    /// Mint a cursor pointing just after `key` in `sort`.
    pub fn encode(&self, sort: &dyn SortOrder, key: &[KeyValue]) -> Result<String> {
        if !sort.accepts(key) {
            return Err(PacerError::InvalidCursor(format!(
                "key does not fit sort {}",
                sort.id()
            )));
        }

        let payload = Payload {
            v: CURSOR_VERSION,
            s: sort.id().to_string(),
            k: key.to_vec(),
        };
        let json = serde_json::to_vec(&payload)
            .map_err(|e| PacerError::InvalidCursor(format!("cannot encode cursor: {}", e)))?;
        let body = URL_SAFE_NO_PAD.encode(json);

        let token = match &self.signer {
            Some(signer) => {
                let tag = sign(signer, body.as_bytes());
                format!("{}.{}", body, URL_SAFE_NO_PAD.encode(tag))
            }
            None => body,
        };

        // A shortened text key would resume at the wrong position, so an
        // oversized key is refused outright.
        if token.len() > MAX_CURSOR_LEN {
            warn!(sort = sort.id(), len = token.len(), "Sort key too long for a cursor");
            return Err(PacerError::InvalidCursor(format!(
                "sort key too long for a cursor ({} bytes encoded)",
                token.len()
            )));
        }

        Ok(token)
    }

    /// Recover the key a cursor points after, provided it was minted
    /// under `sort`.
    pub fn decode(&self, token: &str, sort: &dyn SortOrder) -> Result<SortKey> {
        self.decode_inner(token, sort).map_err(|reason| {
            warn!(sort = sort.id(), reason = %reason, "Rejected cursor");
            PacerError::InvalidCursor(reason)
        })
    }

    fn decode_inner(&self, token: &str, sort: &dyn SortOrder) -> std::result::Result<SortKey, String> {
        if token.is_empty() {
            return Err("empty cursor".to_string());
        }
        if token.len() > MAX_CURSOR_LEN {
            return Err(format!("cursor longer than {} bytes", MAX_CURSOR_LEN));
        }

        let body = match (&self.signer, token.split_once('.')) {
            (Some(signer), Some((body, tag))) => {
                let tag = URL_SAFE_NO_PAD
                    .decode(tag)
                    .map_err(|e| format!("bad signature encoding: {}", e))?;
                let mut mac = signer.clone();
                mac.update(body.as_bytes());
                mac.verify_slice(&tag)
                    .map_err(|_| "signature mismatch".to_string())?;
                body
            }
            (Some(_), None) => return Err("missing signature".to_string()),
            (None, Some(_)) => return Err("unexpected signature".to_string()),
            (None, None) => token,
        };

        let json = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| format!("bad encoding: {}", e))?;
        let payload: Payload =
            serde_json::from_slice(&json).map_err(|e| format!("bad payload: {}", e))?;

        if payload.v != CURSOR_VERSION {
            return Err(format!("unsupported version {}", payload.v));
        }
        if payload.s != sort.id() {
            return Err(format!("minted for {}, not {}", payload.s, sort.id()));
        }
        if !sort.accepts(&payload.k) {
            return Err("key does not fit sort".to_string());
        }

        Ok(payload.k)
    }
}

impl Default for CursorCodec {
    fn default() -> Self {
        Self::unsigned()
    }
}

impl fmt::Debug for CursorCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorCodec")
            .field("signed", &self.is_signed())
            .finish()
    }
}

fn sign(signer: &HmacSha256, data: &[u8]) -> Vec<u8> {
    let mut mac = signer.clone();
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::sorts::{ListItemsSort, ListsSort};
    use chrono::{TimeZone, Utc};

    fn created_key(secs: i64, id: i64) -> SortKey {
        vec![
            KeyValue::Time(Utc.timestamp_opt(secs, 0).unwrap()),
            KeyValue::Int(id),
        ]
    }

    #[test]
    fn test_decode_returns_encoded_key() {
        let codec = CursorCodec::unsigned();
        let key = created_key(1_700_000_000, 42);

        let token = codec.encode(&ListItemsSort::Created, &key).unwrap();
        assert_eq!(codec.decode(&token, &ListItemsSort::Created).unwrap(), key);
    }

    #[test]
    fn test_token_is_url_safe() {
        let codec = CursorCodec::signed(b"secret").unwrap();
        let token = codec
            .encode(&ListsSort::Name, &[KeyValue::from("my ?/+ list"), KeyValue::Int(3)])
            .unwrap();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
    }

    #[test]
    fn test_cross_sort_cursor_rejected() {
        let codec = CursorCodec::unsigned();
        let token = codec
            .encode(&ListItemsSort::Created, &created_key(10, 1))
            .unwrap();

        // Same columns, different order.
        assert!(matches!(
            codec.decode(&token, &ListItemsSort::Updated),
            Err(PacerError::InvalidCursor(_))
        ));
        // Same column names, different list type.
        assert!(matches!(
            codec.decode(&token, &ListsSort::Created),
            Err(PacerError::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_malformed_cursors_rejected() {
        let codec = CursorCodec::unsigned();
        let sort = ListItemsSort::Default;
        let oversized = "A".repeat(MAX_CURSOR_LEN + 1);

        for token in ["", "not base64!", "aGVsbG8", oversized.as_str()] {
            assert!(
                matches!(codec.decode(token, &sort), Err(PacerError::InvalidCursor(_))),
                "token {:?} should be rejected",
                token
            );
        }
    }

    #[test]
    fn test_wrong_shape_rejected() {
        let codec = CursorCodec::unsigned();
        let forged = URL_SAFE_NO_PAD.encode(r#"{"v":1,"s":"list_items.default","k":[{"s":"1"}]}"#);
        assert!(codec.decode(&forged, &ListItemsSort::Default).is_err());

        let too_long = URL_SAFE_NO_PAD
            .encode(r#"{"v":1,"s":"list_items.default","k":[{"i":1},{"i":2}]}"#);
        assert!(codec.decode(&too_long, &ListItemsSort::Default).is_err());
    }

    #[test]
    fn test_out_of_range_value_rejected() {
        let codec = CursorCodec::unsigned();
        let forged = URL_SAFE_NO_PAD
            .encode(r#"{"v":1,"s":"list_items.default","k":[{"i":99999999999999999999}]}"#);
        assert!(codec.decode(&forged, &ListItemsSort::Default).is_err());
    }

    #[test]
    fn test_unknown_version_rejected() {
        let codec = CursorCodec::unsigned();
        let forged = URL_SAFE_NO_PAD.encode(r#"{"v":2,"s":"list_items.default","k":[{"i":1}]}"#);
        assert!(codec.decode(&forged, &ListItemsSort::Default).is_err());
    }

    #[test]
    fn test_encode_rejects_mismatched_key() {
        let codec = CursorCodec::unsigned();
        assert!(codec
            .encode(&ListItemsSort::Created, &[KeyValue::Int(1)])
            .is_err());
    }

    #[test]
    fn test_signed_cursor_tamper_detected() {
        let codec = CursorCodec::signed(b"cursor-secret").unwrap();
        let token = codec.encode(&ListItemsSort::Default, &[KeyValue::Int(5)]).unwrap();
        assert!(codec.decode(&token, &ListItemsSort::Default).is_ok());

        let (_, tag) = token.split_once('.').unwrap();
        let forged_body = URL_SAFE_NO_PAD.encode(r#"{"v":1,"s":"list_items.default","k":[{"i":1}]}"#);
        let forged = format!("{}.{}", forged_body, tag);
        assert!(codec.decode(&forged, &ListItemsSort::Default).is_err());
    }

    #[test]
    fn test_signed_and_unsigned_do_not_mix() {
        let signed = CursorCodec::signed(b"cursor-secret").unwrap();
        let unsigned = CursorCodec::unsigned();
        let sort = ListItemsSort::Default;

        let signed_token = signed.encode(&sort, &[KeyValue::Int(5)]).unwrap();
        let unsigned_token = unsigned.encode(&sort, &[KeyValue::Int(5)]).unwrap();

        assert!(unsigned.decode(&signed_token, &sort).is_err());
        assert!(signed.decode(&unsigned_token, &sort).is_err());

        let other = CursorCodec::signed(b"another-secret").unwrap();
        assert!(other.decode(&signed_token, &sort).is_err());
    }

    #[test]
    fn test_long_multibyte_text_key_decodes() {
        let codec = CursorCodec::signed(b"cursor-secret").unwrap();
        let key = vec![KeyValue::Text("é".repeat(1500)), KeyValue::Int(9)];

        let token = codec.encode(&ListsSort::Name, &key).unwrap();
        assert!(token.len() > 1024);
        assert_eq!(codec.decode(&token, &ListsSort::Name).unwrap(), key);
    }

    #[test]
    fn test_encode_refuses_what_decode_would_reject() {
        let codec = CursorCodec::unsigned();
        let key = vec![KeyValue::Text("x".repeat(MAX_CURSOR_LEN)), KeyValue::Int(1)];
        assert!(matches!(
            codec.encode(&ListsSort::Name, &key),
            Err(PacerError::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(CursorCodec::signed(b""), Err(PacerError::Config(_))));
    }
}
