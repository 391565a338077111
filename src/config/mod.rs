//! Configuration loading and validation.
//!
//! One TOML file: the local pseudo-server identity, the uplink block,
//! trusted servers, oper grants, and the service-bot blocks. Process-level
//! validation failures abort startup; a broken bot block fails only that
//! bot's load.

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Our own pseudo-server.
    pub server: ServerConfig,
    /// The uplink to connect to.
    pub uplink: UplinkConfig,
    /// Trusted-server names for the u-line check.
    #[serde(default)]
    pub ulines: Vec<String>,
    /// Service bots to create at startup.
    #[serde(default)]
    pub bots: Vec<BotConfig>,
    /// Accounts granted command privileges.
    #[serde(default)]
    pub opers: Vec<OperConfig>,
}

/// Identity of the services pseudo-server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name presented to the network.
    pub name: String,
    /// Description presented to the network.
    pub description: String,
    /// TS6 numeric: a digit followed by two characters from `[A-Z0-9]`.
    pub numeric: String,
}

/// The uplink block.
#[derive(Debug, Clone, Deserialize)]
pub struct UplinkConfig {
    /// Uplink hostname or address.
    pub host: String,
    /// Uplink port.
    pub port: u16,
    /// Link password.
    pub password: String,
    /// Protocol name message handlers are registered under.
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "ts6".to_string()
}

/// One service-bot block.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Nickname of the bot.
    pub nick: String,
    /// Ident.
    #[serde(default = "default_bot_user")]
    pub user: String,
    /// Hostname.
    #[serde(default = "default_bot_host")]
    pub host: String,
    /// Real-name field.
    #[serde(default)]
    pub realname: String,
}

fn default_bot_user() -> String {
    "services".to_string()
}

fn default_bot_host() -> String {
    "services.host".to_string()
}

/// One oper grant: an account name and the privileges it carries.
#[derive(Debug, Clone, Deserialize)]
pub struct OperConfig {
    /// Account display name.
    pub name: String,
    /// Privilege strings; `"*"` grants everything.
    #[serde(default)]
    pub privs: Vec<String>,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Process-level validation; failure here aborts startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.name.is_empty() {
            return Err(ConfigError::Invalid {
                field: "server.name",
                reason: "must not be empty".into(),
            });
        }
        let numeric = self.server.numeric.as_bytes();
        let numeric_ok = numeric.len() == 3
            && numeric[0].is_ascii_digit()
            && numeric[1..]
                .iter()
                .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase());
        if !numeric_ok {
            return Err(ConfigError::Invalid {
                field: "server.numeric",
                reason: format!(
                    "{:?} is not a digit followed by two characters from [A-Z0-9]",
                    self.server.numeric
                ),
            });
        }
        if self.uplink.host.is_empty() {
            return Err(ConfigError::Invalid {
                field: "uplink.host",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// Validate one bot block. An invalid block fails that bot's load only;
/// the process keeps running with the bots that did validate.
pub fn validate_bot(bot: &BotConfig) -> Result<(), ConfigError> {
    if bot.nick.is_empty() {
        return Err(ConfigError::Invalid {
            field: "bots.nick",
            reason: "must not be empty".into(),
        });
    }
    if bot.nick.contains(' ') {
        return Err(ConfigError::Invalid {
            field: "bots.nick",
            reason: format!("{:?} contains whitespace", bot.nick),
        });
    }
    Ok(())
}

#[cfg(test)]
impl Config {
    /// A minimal in-memory configuration for tests.
    pub(crate) fn for_tests() -> Self {
        Self {
            server: ServerConfig {
                name: "services.straylight.net".into(),
                description: "Straylight IRC Services".into(),
                numeric: "0SL".into(),
            },
            uplink: UplinkConfig {
                host: "127.0.0.1".into(),
                port: 7000,
                password: "hunter2".into(),
                protocol: "ts6".into(),
            },
            ulines: Vec::new(),
            bots: Vec::new(),
            opers: vec![OperConfig {
                name: "case".into(),
                privs: vec!["*".into()],
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const GOOD: &str = r#"
        [server]
        name = "services.straylight.net"
        description = "Straylight IRC Services"
        numeric = "0SL"

        [uplink]
        host = "hub.straylight.net"
        port = 7000
        password = "hunter2"

        ulines = ["stats.straylight.net"]

        [[bots]]
        nick = "NickServ"
        realname = "Nickname Services"

        [[opers]]
        name = "case"
        privs = ["*"]
    "#;

    #[test]
    fn loads_a_complete_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(GOOD.as_bytes()).unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.numeric, "0SL");
        assert_eq!(config.uplink.protocol, "ts6");
        assert_eq!(config.bots[0].user, "services");
        assert_eq!(config.ulines, vec!["stats.straylight.net"]);
    }

    #[test]
    fn rejects_a_malformed_numeric() {
        let mut config: Config = toml::from_str(GOOD).unwrap();
        for bad in ["SL0", "0sl", "0SLX", ""] {
            config.server.numeric = bad.into();
            let err = config.validate().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::Invalid {
                    field: "server.numeric",
                    ..
                }
            ));
        }
    }

    #[test]
    fn bot_validation_fails_only_that_bot() {
        let good = BotConfig {
            nick: "ChanServ".into(),
            user: "services".into(),
            host: "services.host".into(),
            realname: String::new(),
        };
        assert!(validate_bot(&good).is_ok());

        let bad = BotConfig {
            nick: "".into(),
            ..good.clone()
        };
        assert!(validate_bot(&bad).is_err());

        let spaced = BotConfig {
            nick: "Nick Serv".into(),
            ..good
        };
        assert!(validate_bot(&spaced).is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Config::load("/nonexistent/wintermute.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
