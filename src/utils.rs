use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

/// Get the configuration directory path for FocusPilot
/// If profile is Dev, uses "focuspilot-dev" instead of "focuspilot"
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    let app_name = match profile {
        Profile::Dev => "focuspilot-dev",
        Profile::Prod => "focuspilot",
    };
    ProjectDirs::from("com", "focuspilot", app_name).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory path for FocusPilot
/// If profile is Dev, uses "focuspilot-dev" instead of "focuspilot"
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    let app_name = match profile {
        Profile::Dev => "focuspilot-dev",
        Profile::Prod => "focuspilot",
    };
    ProjectDirs::from("com", "focuspilot", app_name).map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}

/// Parse a date string in ISO 8601 format (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<chrono::NaiveDate, chrono::ParseError> {
    chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
}

/// Parse a time-of-day string (HH:MM)
pub fn parse_time(time_str: &str) -> Result<chrono::NaiveTime, chrono::ParseError> {
    chrono::NaiveTime::parse_from_str(time_str, "%H:%M")
}

/// Fresh opaque identifier for stored items.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_dates() {
        assert!(parse_date("2024-01-10").is_ok());
        assert!(parse_date("01/10/2024").is_err());
    }

    #[test]
    fn parses_clock_times() {
        assert_eq!(
            parse_time("09:30").unwrap(),
            chrono::NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert!(parse_time("9:3pm").is_err());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }
}
