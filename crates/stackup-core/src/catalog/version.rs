//! CLI / catalog version compatibility

use semver::Version;

/// Compare the running CLI against the catalog's `minCliVersion`.
///
/// Returns a warning message when the CLI is older than required, or when
/// either version string cannot be parsed. `None` means compatible.
pub fn check_compatibility(
    cli_version: &str,
    min_cli_version: Option<&str>,
    upgrade_command: &str,
) -> Option<String> {
    let required = min_cli_version?;

    let (cli, required_version) = match (
        Version::parse(cli_version.trim_start_matches('v')),
        Version::parse(required.trim_start_matches('v')),
    ) {
        (Ok(cli), Ok(req)) => (cli, req),
        _ => {
            return Some(format!(
                "Could not compare CLI version '{}' with catalog requirement '{}'",
                cli_version, required
            ))
        }
    };

    if cli < required_version {
        Some(format!(
            "This catalog requires CLI {} or newer (running {}).\nUpgrade with: {}",
            required_version, cli, upgrade_command
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_requirement_is_compatible() {
        assert!(check_compatibility("0.1.0", None, "cargo install").is_none());
    }

    #[test]
    fn test_newer_cli_is_compatible() {
        assert!(check_compatibility("0.3.0", Some("0.2.1"), "cargo install").is_none());
        assert!(check_compatibility("0.2.1", Some("v0.2.1"), "cargo install").is_none());
    }

    #[test]
    fn test_older_cli_warns_with_upgrade_command() {
        let warning = check_compatibility("0.1.0", Some("0.2.0"), "cargo install stackup-tools")
            .unwrap();
        assert!(warning.contains("0.2.0"));
        assert!(warning.contains("cargo install stackup-tools"));
    }

    #[test]
    fn test_unparseable_version_warns() {
        assert!(check_compatibility("dev", Some("0.2.0"), "x").is_some());
    }
}
