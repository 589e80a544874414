use crate::reconnect::ReconnectPolicy;
use crate::timing::TimingRequest;
use crate::trigger::{TriggerChannel, TriggerConfig, TriggerEdge};
use anyhow::{anyhow, Context, Result};
use confique::Config;
use log::LevelFilter;
use std::path::Path;
use std::time::Duration;

#[derive(Config, Debug, Clone)]
pub struct Conf {
    #[config(nested)]
    pub acquisition: AcquisitionSettings,
    #[config(nested)]
    pub trigger: TriggerSettings,
    #[config(nested)]
    pub reconnect: ReconnectSettings,
    #[config(nested)]
    pub logging: LoggingSettings,
}

#[derive(Config, Debug, Clone)]
pub struct AcquisitionSettings {
    /// Input channels, 1 to 16.
    #[config(default = [1])]
    pub channels: Vec<u16>,
    #[config(default = 1000, env = "PICOLOG_POINTS_PER_CHANNEL")]
    pub points_per_channel: u32,
    /// Block duration in µs.
    #[config(default = 1000000, env = "PICOLOG_RECORD_US")]
    pub record_us: u32,
}

#[derive(Config, Debug, Clone)]
pub struct TriggerSettings {
    #[config(default = false)]
    pub enabled: bool,
    /// Channel number or `PL1000_CHANNEL_n`.
    #[config(default = 1)]
    pub channel: TriggerChannel,
    /// 0 rising, 1 falling.
    #[config(default = 0)]
    pub direction: u16,
    #[config(default = 2048)]
    pub threshold: u16,
    #[config(default = 100)]
    pub hysteresis: u16,
    /// Percent of the block, negative for pre-trigger.
    #[config(default = 10.0)]
    pub delay: f32,
    #[config(default = false)]
    pub auto: bool,
    #[config(default = 0)]
    pub auto_ms: u16,
}

#[derive(Config, Debug, Clone)]
pub struct ReconnectSettings {
    #[config(default = false)]
    pub enabled: bool,
    #[config(default = 10000)]
    pub timeout_ms: u64,
    #[config(default = 3)]
    pub count: u32,
}

#[derive(Config, Debug, Clone)]
pub struct LoggingSettings {
    /// off, error, warn, info, debug or trace.
    #[config(default = "info", env = "PICOLOG_LOG_LEVEL")]
    pub level: String,
}

impl Conf {
    /// Load defaults, then the TOML file if given, with environment variables on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Conf::builder().env();
        if let Some(path) = path {
            if !path.exists() {
                return Err(anyhow!("config file {} not found", path.display()));
            }
            builder = builder.file(path);
        }
        let conf = builder.load().context("failed to load configuration")?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn validate(&self) -> Result<()> {
        self.timing_request()
            .validate()
            .context("invalid [acquisition] settings")?;
        self.trigger
            .channel
            .resolve()
            .context("invalid [trigger] channel")?;
        if self.trigger.direction > 1 {
            return Err(anyhow!(
                "invalid [trigger] direction {}, expected 0 or 1",
                self.trigger.direction
            ));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn timing_request(&self) -> TimingRequest {
        TimingRequest::new(
            self.acquisition.channels.clone(),
            self.acquisition.points_per_channel,
            self.acquisition.record_us,
        )
    }

    pub fn trigger_config(&self) -> TriggerConfig {
        TriggerConfig {
            enabled: self.trigger.enabled,
            channel: self.trigger.channel.clone(),
            edge: TriggerEdge::from_code(self.trigger.direction),
            threshold: self.trigger.threshold,
            hysteresis: self.trigger.hysteresis,
            delay_percent: self.trigger.delay,
            auto_trigger: self.trigger.auto,
            auto_ms: self.trigger.auto_ms,
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: self.reconnect.enabled,
            cooldown: Duration::from_millis(self.reconnect.timeout_ms),
            count: self.reconnect.count,
        }
    }

    pub fn log_level(&self) -> Result<LevelFilter> {
        self.logging
            .level
            .parse::<LevelFilter>()
            .map_err(|_| anyhow!("invalid [logging] level {:?}", self.logging.level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(name: &str, body: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("picolog1000-{}-{}.toml", name, std::process::id()));
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults() {
        let conf = Conf::builder().load().unwrap();
        assert_eq!(conf.acquisition.channels, vec![1]);
        assert_eq!(conf.acquisition.points_per_channel, 1000);
        assert_eq!(conf.acquisition.record_us, 1_000_000);
        assert_eq!(conf.trigger.channel, TriggerChannel::Index(1));
        assert_eq!(conf.trigger.threshold, 2048);
        assert!(!conf.reconnect.enabled);
        conf.validate().unwrap();
    }

    #[test]
    fn file_overrides() {
        let path = write_config(
            "overrides",
            r#"
[acquisition]
channels = [1, 2, 5]
points_per_channel = 10000
record_us = 200000

[trigger]
enabled = true
channel = "PL1000_CHANNEL_5"
direction = 1
delay = -50.0

[reconnect]
enabled = true
timeout_ms = 500
count = 4

[logging]
level = "debug"
"#,
        );
        let conf = Conf::builder().file(&path).load().unwrap();
        fs::remove_file(&path).ok();
        conf.validate().unwrap();
        assert_eq!(conf.acquisition.channels, vec![1, 2, 5]);
        let trig = conf.trigger_config();
        assert!(trig.enabled);
        assert_eq!(trig.channel.resolve().unwrap(), 5);
        assert_eq!(trig.edge, TriggerEdge::Falling);
        assert_eq!(trig.delay_percent, -50.0);
        let policy = conf.reconnect_policy();
        assert_eq!(policy.cooldown, Duration::from_millis(500));
        assert_eq!(policy.count, 4);
        assert_eq!(conf.log_level().unwrap(), LevelFilter::Debug);
    }

    #[test]
    fn rejects_bad_values() {
        let path = write_config(
            "bad",
            r#"
[acquisition]
channels = [1, 1]
"#,
        );
        let conf = Conf::builder().file(&path).load().unwrap();
        fs::remove_file(&path).ok();
        assert!(conf.validate().is_err());

        let mut conf = Conf::builder().load().unwrap();
        conf.logging.level = "loud".into();
        assert!(conf.validate().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Conf::load(Some(Path::new("/nonexistent/picolog.toml"))).is_err());
    }
}
