//! Boundary token generation.

use rand::Rng;

/// Prefix shared by every generated boundary.
const BOUNDARY_PREFIX: &str = "----formrelay";

/// Generates a fresh multipart boundary.
///
/// The token combines the current time in nanoseconds with 64 random bits.
/// Uniqueness is best-effort: a collision needs the literal token inside
/// part content.
#[must_use]
pub fn generate_boundary() -> String {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default()
        .unsigned_abs();
    let random: u64 = rand::thread_rng().r#gen();
    format!("{BOUNDARY_PREFIX}{nanos:x}{random:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_shape() {
        let boundary = generate_boundary();
        assert!(boundary.starts_with(BOUNDARY_PREFIX));
        // RFC 2046 caps boundaries at 70 characters.
        assert!(boundary.len() <= 70);
        assert!(
            boundary[BOUNDARY_PREFIX.len()..]
                .chars()
                .all(|c| c.is_ascii_hexdigit())
        );
    }

    #[test]
    fn test_boundaries_differ() {
        assert_ne!(generate_boundary(), generate_boundary());
    }
}
