use crate::error::{DriveFsError, Result};

/// Reject empty strings.
pub fn not_empty(value: &str, name: &'static str) -> Result<()> {
    if value.is_empty() {
        return Err(DriveFsError::InvalidArgument {
            name,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Reject empty or whitespace-only strings.
pub fn not_blank(value: &str, name: &'static str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DriveFsError::InvalidArgument {
            name,
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_rejected() {
        assert!(not_blank("key", "api_key").is_ok());
        assert!(not_blank("", "api_key").is_err());
        assert!(not_blank(" \t", "api_key").is_err());
    }

    #[test]
    fn whitespace_is_not_empty() {
        assert!(not_empty(" ", "path").is_ok());
        let err = not_empty("", "path").unwrap_err();
        assert!(matches!(err, DriveFsError::InvalidArgument { name: "path", .. }));
    }
}
