//! Custom types for common data structures

use chrono::{DateTime as ChronoDateTime, Utc};

/// Database DateTime type used across all Shipyard crates
///
/// This is the canonical datetime type for every `created_at`, `updated_at`
/// and lifecycle timestamp column.
///
/// # Example
/// ```rust
/// use shipyard_core::DBDateTime;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// pub struct Response {
///     pub created_at: DBDateTime,
/// }
/// ```
pub type DBDateTime = ChronoDateTime<Utc>;

/// Current time in the canonical database representation.
///
/// Truncated to microseconds so values read back from PostgreSQL compare
/// equal to the values that were written.
pub fn db_now() -> DBDateTime {
    let now = Utc::now();
    let micros = now.timestamp_micros();
    ChronoDateTime::<Utc>::from_timestamp_micros(micros).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_now_has_microsecond_precision() {
        let now = db_now();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn test_db_now_is_monotonic_enough() {
        let a = db_now();
        let b = db_now();
        assert!(b >= a);
    }
}
