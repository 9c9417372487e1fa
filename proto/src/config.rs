use std::env;
use std::path::PathBuf;

use serde_derive::{Deserialize, Serialize};

/// Runtime knobs shared by the binary's commands. Every field is filled from
/// an environment variable with a built-in default, so a bare invocation
/// always gets a complete configuration; command-line flags override on top.
#[derive(Serialize, Deserialize, Default, Clone, PartialEq, Eq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileBankConfig {
    /// Root directory for all persistent state.
    #[serde(default)]
    pub home: String,
    /// Address a local server instance binds to.
    #[serde(default)]
    pub bind_address: String,
    /// Port a local server instance binds to.
    #[serde(default)]
    pub bind_port: u16,
    /// Port assumed for remote servers when none is given.
    #[serde(default)]
    pub server_port: u16,
}

impl FileBankConfig {
    pub fn build() -> Result<FileBankConfig, &'static str> {
        let home = match env::var("FILEBANK_HOME") {
            Ok(value) => value,
            Err(_) => {
                let user_home =
                    env::var("HOME").map_err(|_| "cannot determine user home directory")?;
                format!("{user_home}/.filebankd")
            }
        };

        Ok(FileBankConfig {
            home,
            bind_address: env::var("FILEBANK_BIND_ADDRESS").unwrap_or("0.0.0.0".to_string()),
            bind_port: env::var("FILEBANK_BIND_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5500),
            server_port: env::var("FILEBANK_SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5500),
        })
    }

    pub fn home_path(&self) -> PathBuf {
        PathBuf::from(&self.home)
    }
}
