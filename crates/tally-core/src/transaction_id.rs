//! Transaction identifiers.
//!
//! ```text
//!   TXN-20261016103001123-3f2a9c1d-b81e44a0
//!       └──── UTC ms ────┘ └ actor ┘ └ rand ┘
//! ```
//!
//! The timestamp makes ids sort roughly by creation time, the actor prefix
//! keeps tenants apart, and the random suffix separates calls in the same
//! millisecond. Uniqueness is still checked against storage before use.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const TRANSACTION_ID_PREFIX: &str = "TXN";

const ACTOR_PREFIX_LEN: usize = 8;
const RANDOM_SUFFIX_LEN: usize = 8;

/// Generates a candidate transaction id for `actor_id` at `now`.
pub fn generate_transaction_id(actor_id: &str, now: DateTime<Utc>) -> String {
    let mut actor: String = actor_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(ACTOR_PREFIX_LEN)
        .collect();
    if actor.is_empty() {
        actor.push('0');
    }

    let random = Uuid::new_v4().simple().to_string();

    format!(
        "{}-{}-{}-{}",
        TRANSACTION_ID_PREFIX,
        now.format("%Y%m%d%H%M%S%3f"),
        actor,
        &random[..RANDOM_SUFFIX_LEN]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format() {
        let now = Utc.timestamp_millis_opt(1_791_973_801_123).unwrap();
        let id = generate_transaction_id("550e8400-e29b-41d4-a716-446655440000", now);

        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "TXN");
        assert_eq!(parts[1], now.format("%Y%m%d%H%M%S%3f").to_string());
        assert_eq!(parts[1].len(), 17);
        assert_eq!(parts[2], "550e8400");
        assert_eq!(parts[3].len(), 8);
        assert!(parts[3].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_same_millisecond_differs() {
        let now = Utc::now();
        assert_ne!(
            generate_transaction_id("u1", now),
            generate_transaction_id("u1", now)
        );
    }
}
