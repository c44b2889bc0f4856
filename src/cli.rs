use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::domain::{CTVConfig, CTVError};

#[derive(Parser, Debug)]
#[command(version, about = "Browse, filter and reset the counters of a dataflow controller.")]
pub struct Args {
    /// Base url of the controller api
    #[arg(short, long, env = "CTV_URL", default_value = "http://localhost:8080/nifi-api")]
    pub url: String,

    /// Bearer token sent with every request
    #[arg(long, env = "CTV_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Show the reset actions without asking the server for the user's authorities
    #[arg(long, conflicts_with = "no_privileged")]
    pub privileged: bool,

    /// Never show the reset actions
    #[arg(long)]
    pub no_privileged: bool,

    /// Where to write the log, `~` and env vars are expanded
    #[arg(long, default_value = "ctv.log")]
    pub log_file: String,

    /// Terminal event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    pub poll: u64,

    /// Widest a column gets, in characters
    #[arg(long, default_value_t = 60)]
    pub max_column_width: usize,
}

impl Args {
    pub fn into_config(self) -> Result<CTVConfig, CTVError> {
        let log_file = shellexpand::full(&self.log_file)
            .map_err(|e| CTVError::InvalidConfig(format!("log file: {e}")))?;
        if self.max_column_width < 3 {
            return Err(CTVError::InvalidConfig(
                "max column width must be at least 3".into(),
            ));
        }
        let privileged = match (self.privileged, self.no_privileged) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        Ok(CTVConfig {
            base_url: self.url,
            token: self.token,
            request_timeout: Duration::from_secs(self.timeout),
            event_poll_time: self.poll,
            max_column_width: self.max_column_width,
            privileged,
            log_file: PathBuf::from(log_file.as_ref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Args::try_parse_from(["ctv"]).unwrap().into_config().unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.privileged, None);
        assert_eq!(config.log_file, PathBuf::from("ctv.log"));
    }

    #[test]
    fn privilege_override() {
        let config = Args::try_parse_from(["ctv", "--privileged"])
            .unwrap()
            .into_config()
            .unwrap();
        assert_eq!(config.privileged, Some(true));
        let config = Args::try_parse_from(["ctv", "--no-privileged"])
            .unwrap()
            .into_config()
            .unwrap();
        assert_eq!(config.privileged, Some(false));
        assert!(Args::try_parse_from(["ctv", "--privileged", "--no-privileged"]).is_err());
    }

    #[test]
    fn rejects_tiny_columns() {
        let args = Args::try_parse_from(["ctv", "--max-column-width", "2"]).unwrap();
        assert!(matches!(args.into_config(), Err(CTVError::InvalidConfig(_))));
    }

    #[test]
    fn url_and_timeout() {
        let config = Args::try_parse_from(["ctv", "-u", "https://nifi:8443/nifi-api", "--timeout", "5"])
            .unwrap()
            .into_config()
            .unwrap();
        assert_eq!(config.base_url, "https://nifi:8443/nifi-api");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }
}
