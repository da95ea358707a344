//! UUID utilities
//!
//! Ids are stored as hyphenated lowercase text in SQLite.

use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse UUID from string
pub fn parse(s: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}

/// Parse a UUID read from a database column, naming the column on failure
pub fn parse_column(column: &str, value: &str) -> crate::Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| crate::Error::Internal(format!("Invalid UUID in column {}: {}", column, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_v4() {
        assert_eq!(generate().get_version_num(), 4);
    }

    #[test]
    fn test_parse_column_reports_column_name() {
        let err = parse_column("org_id", "not-a-uuid").unwrap_err();
        assert!(err.to_string().contains("org_id"));
    }
}
