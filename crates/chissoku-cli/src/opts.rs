//! Command line options

use clap::Parser;
use std::path::PathBuf;

use chissoku_core::config::{ConfigError, OutputInterval, SessionConfig};
use chissoku_core::protocol::DEFAULT_BAUD_RATE;

#[derive(Parser, Debug)]
#[command(name = "chissoku", version, about = "A CO2 sensor reader", disable_version_flag = true)]
pub struct Opts {
    /// The serial device, like '/dev/ttyACM0'
    pub device: Option<String>,

    /// Don't output readings to stdout
    #[arg(short = 'n', long = "no-stdout")]
    pub no_stdout: bool,

    /// Interval (seconds) between outputs
    #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
    pub interval: i64,

    /// Also store readings in this SQLite database
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Serial baud rate
    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud_rate: u32,

    /// Don't output any process logs to stderr
    #[arg(long)]
    pub quiet: bool,

    /// List USB serial ports and exit
    #[arg(long)]
    pub list_ports: bool,

    /// Show program version
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    version: Option<bool>,
}

impl Opts {
    /// Validate and convert into a session configuration
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let interval = OutputInterval::from_secs(self.interval)?;
        let config = SessionConfig {
            device: self.device.clone().unwrap_or_default(),
            baud_rate: self.baud_rate,
            interval,
            ..SessionConfig::default()
        };
        config.validate()?;
        if self.no_stdout && self.db.is_none() {
            return Err(ConfigError::NoSink);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Opts {
        Opts::try_parse_from(std::iter::once("chissoku").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let opts = parse(&["/dev/ttyACM0"]);
        let config = opts.session_config().unwrap();
        assert_eq!(config.device, "/dev/ttyACM0");
        assert_eq!(config.interval.as_duration(), Duration::from_secs(1));
        assert_eq!(config.baud_rate, 115200);
        assert!(!opts.quiet);
    }

    #[test]
    fn test_interval_flag() {
        let opts = parse(&["-i", "30", "/dev/ttyACM0"]);
        assert_eq!(
            opts.session_config().unwrap().interval.as_duration(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_non_positive_interval() {
        assert_eq!(
            parse(&["--interval", "0", "/dev/ttyACM0"]).session_config().unwrap_err(),
            ConfigError::NonPositiveInterval(0)
        );
        assert_eq!(
            parse(&["-i", "-2", "/dev/ttyACM0"]).session_config().unwrap_err(),
            ConfigError::NonPositiveInterval(-2)
        );
    }

    #[test]
    fn test_short_version_flag() {
        for flag in ["-v", "--version"] {
            let err = Opts::try_parse_from(["chissoku", flag]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        }
    }

    #[test]
    fn test_missing_device() {
        assert_eq!(
            parse(&[]).session_config().unwrap_err(),
            ConfigError::MissingDevice
        );
    }

    #[test]
    fn test_no_output_selected() {
        assert_eq!(
            parse(&["-n", "/dev/ttyACM0"]).session_config().unwrap_err(),
            ConfigError::NoSink
        );
        assert!(parse(&["-n", "--db", "co2.sqlite3", "/dev/ttyACM0"])
            .session_config()
            .is_ok());
    }
}
