//! Configuration loading: TOML file, then `DEVICEHUB__*` environment overrides

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use devicehub_core::DeviceHubConfig;

pub const CONFIG_ENV: &str = "DEVICEHUB_CONFIG";
const ENV_PREFIX: &str = "DEVICEHUB";
const CONFIG_FILE: &str = "devicehub.toml";

/// Resolve the config path: first CLI argument, then `DEVICEHUB_CONFIG`, then
/// the per-user config directory
pub fn config_path(arg: Option<String>) -> PathBuf {
    if let Some(path) = arg.or_else(|| std::env::var(CONFIG_ENV).ok()) {
        return PathBuf::from(shellexpand::tilde(&path).into_owned());
    }
    ProjectDirs::from("com", "DeviceHub", "devicehub")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

pub fn load(path: &Path) -> Result<DeviceHubConfig> {
    let settings = Config::builder()
        .add_source(
            File::from(path)
                .format(FileFormat::Toml)
                .required(false),
        )
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("reading configuration from {}", path.display()))?;

    let config: DeviceHubConfig = settings
        .try_deserialize()
        .with_context(|| format!("parsing configuration from {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use devicehub_core::domain::Orientation;

    fn write_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("devicehub-{}-{}.toml", name, std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_full_file() {
        let path = write_config(
            "full",
            r#"
[backend]
url = "https://erp.example.com"
login = "agent@Warehouse"
password = "secret"

[[queues]]
name = "LABELS"
printer_name = "Zebra"
raw_mode = true

[[queues]]
name = "DOCS"
printer_name = "Laser"
paper_size = "A4"
orientation = "landscape"

[scale]
scale_id = "SCALE01"
vendor_id = 2338
product_id = 32771

[intervals]
error_wait_ms = 2000
"#,
        );

        let config = load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.queues.len(), 2);
        assert!(config.queues[0].raw_mode);
        assert_eq!(config.queues[1].orientation, Orientation::Landscape);
        assert_eq!(config.scale.as_ref().map(|s| s.vendor_id), Some(0x0922));
        assert_eq!(config.intervals.error_wait_ms, 2000);
        assert_eq!(config.intervals.printer_polling_ms, 5000);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let path = write_config(
            "invalid",
            r#"
[backend]
url = "ftp://erp"
login = "agent"
"#,
        );
        let result = load(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }

    #[test]
    fn test_explicit_path_wins() {
        assert_eq!(
            config_path(Some("/etc/devicehub.toml".to_string())),
            PathBuf::from("/etc/devicehub.toml")
        );
    }
}
