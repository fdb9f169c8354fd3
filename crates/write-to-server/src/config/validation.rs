//! Settings validation.

use super::Settings;
use crate::error::{Error, Result};

/// Validate the settings.
pub fn validate(settings: &Settings) -> Result<()> {
    if settings.connection_strings.is_empty() {
        return Err(Error::Config(
            "connection_strings must contain at least one entry".into(),
        ));
    }

    for (name, value) in &settings.connection_strings {
        if name.trim().is_empty() {
            return Err(Error::Config("connection string name is empty".into()));
        }
        if value.trim().is_empty() {
            return Err(Error::Config(format!(
                "connection string '{}' is empty",
                name
            )));
        }
    }

    if settings.bulk.batch_size == 0 {
        return Err(Error::Config("bulk.batch_size must be at least 1".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        Settings::default().with_connection_string(
            "ShopContext",
            "Server=tcp:localhost,1433;Database=shop;User Id=sa;Password=pw",
        )
    }

    #[test]
    fn test_valid_settings() {
        assert!(validate(&valid_settings()).is_ok());
    }

    #[test]
    fn test_no_connection_strings() {
        assert!(validate(&Settings::default()).is_err());
    }

    #[test]
    fn test_empty_connection_string() {
        let settings = valid_settings().with_connection_string("Empty", "  ");
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn test_zero_batch_size() {
        let mut settings = valid_settings();
        settings.bulk.batch_size = 0;
        assert!(validate(&settings).is_err());
    }
}
