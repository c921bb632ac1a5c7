//! # Record Identity and Domain Types
//!
//! Records are addressed by an opaque, store-assigned identity. On the wire
//! the identity is a string; inside the store it is a [`DocumentId`], a
//! 128-bit ULID from [`ferroid`]. The string form is the 26-character
//! Crockford Base32 encoding of the ULID.
//!
//! Conversion is strict in one direction only: [`parse_document_id`] rejects
//! empty, malformed and non-canonical strings with [`Error::InvalidArgument`]
//! so that every identity has exactly one spelling, while
//! [`format_document_id`] is total.
//!
//! Identities are handed out by [`next_document_id`], which never returns a
//! value lower than or equal to the previously issued one. A store that
//! remembers its last issued identity therefore never reuses an identity,
//! even one that has since been deleted. Once the watermark reaches the
//! largest ULID nothing more is issued.

use crate::{Error, Result, proto};
use ferroid::{base32::Base32UlidExt, id::ULID};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Native identity type of a stored document.
pub type DocumentId = ULID;

/// Parses the wire form of a record identity.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `raw` is empty or is not a valid
/// Base32 ULID.
pub fn parse_document_id(raw: &str) -> Result<DocumentId> {
    if raw.is_empty() {
        return Err(Error::invalid_argument("The blog ID must not be empty"));
    }

    let malformed = || Error::invalid_argument(format!("Malformed blog ID: {raw}"));
    let id = DocumentId::decode(raw).map_err(|_| malformed())?;

    // Lowercase and overflowing leading characters decode too; only the
    // canonical spelling names a record.
    if format_document_id(&id) != raw {
        return Err(malformed());
    }

    Ok(id)
}

/// Renders a record identity in its wire form.
pub fn format_document_id(id: &DocumentId) -> String {
    id.encode().to_string()
}

/// Produces a fresh identity strictly greater than `last`.
///
/// The identity is a ULID for the current wall-clock millisecond. If that is
/// not above `last` (clock went backwards, or an earlier identity in the same
/// millisecond drew a larger random part), `last` is bumped by one instead.
///
/// Returns `None` once `last` is the largest representable identity.
pub fn next_document_id(last: Option<DocumentId>) -> Option<DocumentId> {
    let candidate = DocumentId::from_datetime(SystemTime::now());

    match last {
        Some(last) if candidate <= last => {
            last.to_raw().checked_add(1).map(DocumentId::from_raw)
        }
        _ => Some(candidate),
    }
}

/// The mutable body of a record: everything except its identity.
///
/// Updates always replace all three fields together.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFields {
    pub author: String,
    pub title: String,
    pub content: String,
}

/// A persisted record together with its identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub id: DocumentId,
    pub fields: RecordFields,
}

impl From<proto::Blog> for RecordFields {
    fn from(blog: proto::Blog) -> Self {
        Self {
            author: blog.author,
            title: blog.title,
            content: blog.content,
        }
    }
}

impl From<Record> for proto::Blog {
    fn from(record: Record) -> Self {
        Self {
            id: format_document_id(&record.id),
            author: record.fields.author,
            title: record.fields.title,
            content: record.fields.content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_id_is_invalid_argument() {
        let err = parse_document_id("").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn malformed_ids_are_invalid_argument() {
        for raw in ["not-an-id", "0123456789012345678901234", "000000000000@0000000000000"] {
            let err = parse_document_id(raw).unwrap_err();
            assert!(
                matches!(err, Error::InvalidArgument { .. }),
                "{raw} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn non_canonical_spellings_are_invalid_argument() {
        let wire = format_document_id(&next_document_id(None).unwrap());
        let max = format_document_id(&DocumentId::from_raw(u128::MAX));
        assert_eq!(max, "7ZZZZZZZZZZZZZZZZZZZZZZZZZ");
        assert!(parse_document_id(&max).is_ok());

        for raw in [wire.to_ascii_lowercase(), "ZZZZZZZZZZZZZZZZZZZZZZZZZZ".to_string()] {
            let err = parse_document_id(&raw).unwrap_err();
            assert!(
                matches!(err, Error::InvalidArgument { .. }),
                "{raw} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn formatted_ids_parse_back() {
        let id = next_document_id(None).unwrap();
        let wire = format_document_id(&id);
        assert_eq!(wire.len(), 26);
        assert_eq!(parse_document_id(&wire).unwrap(), id);
    }

    #[test]
    fn issued_ids_strictly_increase() {
        let mut last = None;
        for _ in 0..10_000 {
            let id = next_document_id(last).unwrap();
            if let Some(prev) = last {
                assert!(id > prev);
            }
            last = Some(id);
        }
    }

    #[test]
    fn ids_after_a_future_watermark_are_still_greater() {
        let far_future = DocumentId::from_raw(u128::MAX - 1);
        let id = next_document_id(Some(far_future)).unwrap();
        assert!(id > far_future);
    }

    #[test]
    fn exhausted_identity_space_issues_nothing() {
        assert_eq!(next_document_id(Some(DocumentId::from_raw(u128::MAX))), None);
    }

    #[test]
    fn record_converts_to_wire_blog() {
        let id = next_document_id(None).unwrap();
        let blog = proto::Blog::from(Record {
            id,
            fields: RecordFields {
                author: "Thopv".to_string(),
                title: "New Blog".to_string(),
                content: "Hello world".to_string(),
            },
        });
        assert_eq!(blog.id, format_document_id(&id));
        assert_eq!(blog.author, "Thopv");
        assert_eq!(RecordFields::from(blog).title, "New Blog");
    }

    #[test]
    fn fields_serialize_as_plain_document() {
        let fields = RecordFields {
            author: "a".to_string(),
            title: "t".to_string(),
            content: "c".to_string(),
        };
        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(json, r#"{"author":"a","title":"t","content":"c"}"#);
    }
}
