//! # Pagination Module
//!
//! Two ways to page through a list, chosen per request:
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┬───────────────────────────┐
//! │ Mode         │ Selected by                  │ Response carries          │
//! ├──────────────┼──────────────────────────────┼───────────────────────────┤
//! │ Cursor       │ default, or `cursor=<token>` │ next_cursor, prev_cursor, │
//! │              │                              │ has_more                  │
//! │ Page         │ `page=<n>`                   │ pagination { current_page,│
//! │              │                              │ last_page, per_page,      │
//! │              │                              │ total }                   │
//! └──────────────┴──────────────────────────────┴───────────────────────────┘
//! ```
//!
//! A cursor is an opaque base64url token wrapping an offset into the ordered
//! result. Supplying both `cursor` and `page` is rejected.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ValidationError, ValidationErrors};

/// Page size when the client asks for none.
pub const DEFAULT_PER_PAGE: usize = 15;

/// Upper bound on `per_page`; larger values are clamped.
pub const MAX_PER_PAGE: usize = 100;

const CURSOR_PREFIX: &str = "offset:";

// =============================================================================
// Cursor Codec
// =============================================================================

/// Encodes an offset as an opaque cursor token.
pub fn encode_cursor(offset: usize) -> String {
    URL_SAFE_NO_PAD.encode(format!("{CURSOR_PREFIX}{offset}"))
}

/// Decodes a cursor token back into an offset.
pub fn decode_cursor(token: &str) -> Result<usize, ValidationError> {
    let invalid = || ValidationError::InvalidFormat {
        field: "cursor".to_string(),
        reason: "is not a valid cursor".to_string(),
    };

    let bytes = URL_SAFE_NO_PAD.decode(token.trim()).map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    text.strip_prefix(CURSOR_PREFIX)
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or_else(invalid)
}

// =============================================================================
// Page Request
// =============================================================================

/// A validated pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    Cursor { offset: usize, per_page: usize },
    Page { page: usize, per_page: usize },
}

impl PageRequest {
    /// Builds a request from raw query parameters.
    pub fn from_params(
        cursor: Option<&str>,
        page: Option<i64>,
        per_page: Option<i64>,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let per_page = match per_page {
            None => Some(DEFAULT_PER_PAGE),
            Some(n) if n < 1 => {
                errors.push(ValidationError::MustBePositive {
                    field: "per_page".to_string(),
                });
                None
            }
            Some(n) => Some(usize::try_from(n).unwrap_or(MAX_PER_PAGE).min(MAX_PER_PAGE)),
        };

        let cursor = cursor.filter(|c| !c.trim().is_empty());
        if cursor.is_some() && page.is_some() {
            errors.push(ValidationError::Conflicting {
                field: "cursor".to_string(),
                other: "page".to_string(),
            });
            return Err(errors);
        }

        let request = match (cursor, page) {
            (_, Some(page)) if page < 1 => {
                errors.push(ValidationError::MustBePositive {
                    field: "page".to_string(),
                });
                None
            }
            (_, Some(page)) => per_page.map(|per_page| PageRequest::Page {
                page: usize::try_from(page).unwrap_or(usize::MAX),
                per_page,
            }),
            (Some(token), None) => errors
                .check(decode_cursor(token))
                .zip(per_page)
                .map(|(offset, per_page)| PageRequest::Cursor { offset, per_page }),
            (None, None) => per_page.map(|per_page| PageRequest::Cursor {
                offset: 0,
                per_page,
            }),
        };

        match request {
            Some(request) if errors.is_empty() => Ok(request),
            _ => Err(errors),
        }
    }

    pub fn per_page(&self) -> usize {
        match *self {
            PageRequest::Cursor { per_page, .. } | PageRequest::Page { per_page, .. } => per_page,
        }
    }

    /// Zero-based index of the first item on this page.
    pub fn offset(&self) -> usize {
        match *self {
            PageRequest::Cursor { offset, .. } => offset,
            PageRequest::Page { page, per_page } => page.saturating_sub(1).saturating_mul(per_page),
        }
    }

    /// Stable fragment for cache keys.
    pub fn cache_key(&self) -> String {
        match *self {
            PageRequest::Cursor { offset, per_page } => format!("cursor={offset}:per_page={per_page}"),
            PageRequest::Page { page, per_page } => format!("page={page}:per_page={per_page}"),
        }
    }

    /// Describes the page this request selects out of `total` items.
    pub fn page_info(&self, total: usize) -> PageInfo {
        let per_page = self.per_page();
        match *self {
            PageRequest::Cursor { offset, .. } => {
                let has_more = offset.saturating_add(per_page) < total;
                PageInfo::Cursor {
                    next_cursor: has_more.then(|| encode_cursor(offset + per_page)),
                    prev_cursor: (offset > 0).then(|| encode_cursor(offset.saturating_sub(per_page))),
                    has_more,
                }
            }
            PageRequest::Page { page, .. } => PageInfo::Page {
                pagination: Pagination {
                    current_page: page,
                    last_page: total.div_ceil(per_page).max(1),
                    per_page,
                    total,
                },
            },
        }
    }
}

// =============================================================================
// Page Info
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Pagination {
    pub current_page: usize,
    pub last_page: usize,
    pub per_page: usize,
    pub total: usize,
}

/// Pagination metadata, flattened into list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum PageInfo {
    Cursor {
        next_cursor: Option<String>,
        prev_cursor: Option<String>,
        has_more: bool,
    },
    Page {
        pagination: Pagination,
    },
}

/// Cuts one page out of an already ordered list.
pub fn paginate<T>(items: Vec<T>, request: &PageRequest) -> (Vec<T>, PageInfo) {
    let total = items.len();
    let info = request.page_info(total);
    let page = items
        .into_iter()
        .skip(request.offset())
        .take(request.per_page())
        .collect();
    (page, info)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_codec() {
        let token = encode_cursor(30);
        assert!(!token.contains('='));
        assert_eq!(decode_cursor(&token).unwrap(), 30);
        assert!(decode_cursor("%%%").is_err());
        assert!(decode_cursor(&URL_SAFE_NO_PAD.encode("page:3")).is_err());
    }

    #[test]
    fn test_defaults_to_first_cursor_page() {
        let req = PageRequest::from_params(None, None, None).unwrap();
        assert_eq!(
            req,
            PageRequest::Cursor {
                offset: 0,
                per_page: DEFAULT_PER_PAGE
            }
        );
    }

    #[test]
    fn test_per_page_is_clamped_and_checked() {
        let req = PageRequest::from_params(None, None, Some(500)).unwrap();
        assert_eq!(req.per_page(), MAX_PER_PAGE);
        assert!(PageRequest::from_params(None, None, Some(0)).is_err());
    }

    #[test]
    fn test_cursor_and_page_conflict() {
        let token = encode_cursor(15);
        let errors = PageRequest::from_params(Some(&token), Some(2), None).unwrap_err();
        assert!(errors.to_field_map().contains_key("cursor"));
    }

    #[test]
    fn test_page_zero_rejected() {
        assert!(PageRequest::from_params(None, Some(0), None).is_err());
    }

    #[test]
    fn test_cursor_mode_walks_forward_and_back() {
        let items: Vec<u32> = (0..40).collect();
        let first = PageRequest::from_params(None, None, Some(15)).unwrap();
        let (page, info) = paginate(items.clone(), &first);
        assert_eq!(page.len(), 15);

        let PageInfo::Cursor {
            next_cursor: Some(next),
            prev_cursor: None,
            has_more: true,
        } = info
        else {
            panic!("unexpected first page info");
        };

        let second = PageRequest::from_params(Some(&next), None, Some(15)).unwrap();
        let (page, info) = paginate(items.clone(), &second);
        assert_eq!(page[0], 15);
        let PageInfo::Cursor {
            next_cursor: Some(next),
            prev_cursor: Some(prev),
            ..
        } = info
        else {
            panic!("unexpected second page info");
        };
        assert_eq!(decode_cursor(&prev).unwrap(), 0);

        let third = PageRequest::from_params(Some(&next), None, Some(15)).unwrap();
        let (page, info) = paginate(items, &third);
        assert_eq!(page.len(), 10);
        assert!(matches!(
            info,
            PageInfo::Cursor {
                next_cursor: None,
                has_more: false,
                ..
            }
        ));
    }

    #[test]
    fn test_page_mode() {
        let items: Vec<u32> = (0..31).collect();
        let req = PageRequest::from_params(None, Some(3), Some(15)).unwrap();
        let (page, info) = paginate(items, &req);
        assert_eq!(page, vec![30]);
        assert_eq!(
            info,
            PageInfo::Page {
                pagination: Pagination {
                    current_page: 3,
                    last_page: 3,
                    per_page: 15,
                    total: 31
                }
            }
        );
    }

    #[test]
    fn test_empty_page_mode_has_one_page() {
        let req = PageRequest::from_params(None, Some(1), None).unwrap();
        let (_, info) = paginate(Vec::<u32>::new(), &req);
        let PageInfo::Page { pagination } = info else {
            panic!("expected page info");
        };
        assert_eq!(pagination.last_page, 1);
        assert_eq!(pagination.total, 0);
    }

    #[test]
    fn test_page_info_serializes_flat() {
        let info = PageRequest::Cursor {
            offset: 0,
            per_page: 15,
        }
        .page_info(3);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["has_more"], false);
        assert!(json["next_cursor"].is_null());
    }
}
