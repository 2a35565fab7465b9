use crate::core::link::LinkConfig;
use crate::core::tokens::TokenOptions;
use crate::domain::model::LockState;
use crate::utils::error::{Result, SphincterError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub serial: SerialConfig,
    pub tokens: TokensConfig,
    pub http: HttpConfig,
    pub hook: Option<HookConfig>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub device: Option<String>,
    pub baud_rate: u32,
    pub reconnect_interval_secs: u64,
    pub read_timeout_ms: u64,
    pub initial_state: LockState,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: None,
            baud_rate: 9600,
            reconnect_interval_secs: 5,
            read_timeout_ms: 1000,
            initial_state: LockState::Error,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokensConfig {
    pub hashfile: Option<String>,
    pub salt: String,
    pub watch: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookConfig {
    pub locked_url: Option<String>,
    pub unlocked_url: Option<String>,
    #[serde(default = "default_hook_timeout")]
    pub timeout_secs: u64,
}

fn default_hook_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl DaemonConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| SphincterError::Config {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${HOOK_TOKEN})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| SphincterError::Config {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn device(&self) -> Result<&str> {
        self.serial
            .device
            .as_deref()
            .ok_or_else(|| SphincterError::MissingConfig {
                field: "serial.device".to_string(),
            })
    }

    pub fn hashfile(&self) -> Result<&str> {
        self.tokens
            .hashfile
            .as_deref()
            .ok_or_else(|| SphincterError::MissingConfig {
                field: "tokens.hashfile".to_string(),
            })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        validation::validate_socket_addr("http.bind", &self.http.bind)
    }

    pub fn link_config(&self) -> Result<LinkConfig> {
        Ok(LinkConfig {
            device: self.device()?.to_string(),
            baud_rate: self.serial.baud_rate,
            reconnect_interval: Duration::from_secs(self.serial.reconnect_interval_secs),
            read_timeout: Duration::from_millis(self.serial.read_timeout_ms),
            initial_state: self.serial.initial_state,
        })
    }

    pub fn token_options(&self) -> TokenOptions {
        TokenOptions {
            salt: self.tokens.salt.clone(),
            watch: self.tokens.watch,
        }
    }
}

impl Validate for DaemonConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("serial.device", self.device()?)?;
        validation::validate_range("serial.baud_rate", self.serial.baud_rate, 50, 4_000_000)?;
        validation::validate_positive_number(
            "serial.reconnect_interval_secs",
            self.serial.reconnect_interval_secs,
            1,
        )?;
        validation::validate_positive_number("serial.read_timeout_ms", self.serial.read_timeout_ms, 1)?;

        validation::validate_path("tokens.hashfile", self.hashfile()?)?;
        self.bind_addr()?;

        if let Some(hook) = &self.hook {
            if hook.locked_url.is_none() && hook.unlocked_url.is_none() {
                return Err(SphincterError::Config {
                    message: "[hook] needs at least one of locked_url, unlocked_url".to_string(),
                });
            }
            if let Some(url) = &hook.locked_url {
                validation::validate_url("hook.locked_url", url)?;
            }
            if let Some(url) = &hook.unlocked_url {
                validation::validate_url("hook.unlocked_url", url)?;
            }
            validation::validate_positive_number("hook.timeout_secs", hook.timeout_secs, 1)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[serial]
device = "/dev/ttyACM0"
baud_rate = 115200
reconnect_interval_secs = 3
initial_state = "LOCKED"

[tokens]
hashfile = "/etc/sphincter/hashes"
watch = true

[http]
bind = "127.0.0.1:8081"

[hook]
locked_url = "https://api.example.org/space?open=0"
unlocked_url = "https://api.example.org/space?open=1"

[logging]
format = "json"
"#;

        let config = DaemonConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.device().unwrap(), "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.serial.initial_state, LockState::Locked);
        assert!(config.tokens.watch);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.hook.as_ref().unwrap().timeout_secs, 5);
        assert!(config.validate().is_ok());

        let link = config.link_config().unwrap();
        assert_eq!(link.reconnect_interval, Duration::from_secs(3));
        assert_eq!(link.read_timeout, Duration::from_millis(1000));
    }

    #[test]
    fn test_defaults_apply_to_minimal_config() {
        let config = DaemonConfig::from_toml_str(
            "[serial]\ndevice = \"/dev/ttyUSB0\"\n[tokens]\nhashfile = \"./hashes\"\n",
        )
        .unwrap();

        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.initial_state, LockState::Error);
        assert_eq!(config.http.bind, "0.0.0.0:8080");
        assert!(config.hook.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_device_fails_validation() {
        let config = DaemonConfig::from_toml_str("[tokens]\nhashfile = \"./hashes\"\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SphincterError::MissingConfig { ref field } if field == "serial.device"));
    }

    #[test]
    fn test_bad_values_fail_validation() {
        let base = "[serial]\ndevice = \"/dev/ttyUSB0\"\n[tokens]\nhashfile = \"./hashes\"\n";

        let config = DaemonConfig::from_toml_str(&format!("{}[http]\nbind = \":8080\"\n", base)).unwrap();
        assert!(config.validate().is_err());

        let config =
            DaemonConfig::from_toml_str(&format!("{}[hook]\nlocked_url = \"ftp://x\"\n", base)).unwrap();
        assert!(config.validate().is_err());

        let config = DaemonConfig::from_toml_str(&format!("{}[hook]\n", base)).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SPHINCTER_TEST_DEVICE", "/dev/ttyS3");

        let config = DaemonConfig::from_toml_str(
            "[serial]\ndevice = \"${SPHINCTER_TEST_DEVICE}\"\n[tokens]\nhashfile = \"h\"\n",
        )
        .unwrap();
        assert_eq!(config.device().unwrap(), "/dev/ttyS3");

        std::env::remove_var("SPHINCTER_TEST_DEVICE");
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[serial]\ndevice = \"/dev/pts/6\"\n[tokens]\nhashfile = \"./hashes\"\n")
            .unwrap();

        let config = DaemonConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.device().unwrap(), "/dev/pts/6");
    }

    #[test]
    fn test_example_config_is_valid() {
        let config =
            DaemonConfig::from_toml_str(include_str!("../../sphincterd.example.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert!(config.hook.is_none());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = DaemonConfig::from_toml_str("[serial\n").unwrap_err();
        assert!(matches!(err, SphincterError::Config { .. }));
    }
}
