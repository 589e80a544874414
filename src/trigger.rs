use crate::error::PicoError;
use crate::pl1000::{input_from_name, input_name, MAX_CHANNELS};
use serde::Deserialize;
use std::fmt;

/// Trigger source, either a channel number or a `PL1000_CHANNEL_n` name.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum TriggerChannel {
    Index(u16),
    Name(String),
}

impl TriggerChannel {
    /// Channel number handed to the unit. Indices are passed through unchecked.
    pub fn resolve(&self) -> Result<u16, PicoError> {
        match self {
            TriggerChannel::Index(ch) => Ok(*ch),
            TriggerChannel::Name(name) => input_from_name(name).ok_or_else(|| {
                PicoError::ArgumentOutOfRange(format!("unknown input name {}", name))
            }),
        }
    }
}

impl Default for TriggerChannel {
    fn default() -> Self {
        TriggerChannel::Index(1)
    }
}

impl fmt::Display for TriggerChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerChannel::Index(ch) if (*ch as usize) <= MAX_CHANNELS => {
                f.write_str(input_name(*ch).unwrap_or("PL1000_CHANNEL_?"))
            }
            TriggerChannel::Index(ch) => write!(f, "{}", ch),
            TriggerChannel::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TriggerEdge {
    #[default]
    Rising,
    Falling,
}

impl TriggerEdge {
    pub fn code(self) -> u16 {
        match self {
            TriggerEdge::Rising => 0,
            TriggerEdge::Falling => 1,
        }
    }

    pub fn from_code(code: u16) -> Self {
        if code == 0 {
            TriggerEdge::Rising
        } else {
            TriggerEdge::Falling
        }
    }
}

/// Trigger setup as applied with `pl1000SetTrigger`.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerConfig {
    pub enabled: bool,
    pub channel: TriggerChannel,
    pub edge: TriggerEdge,
    /// ADC counts.
    pub threshold: u16,
    /// ADC counts.
    pub hysteresis: u16,
    /// Percent of the block; negative values are pre-trigger.
    pub delay_percent: f32,
    pub auto_trigger: bool,
    pub auto_ms: u16,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channel: TriggerChannel::default(),
            edge: TriggerEdge::Rising,
            threshold: 2048,
            hysteresis: 100,
            delay_percent: 10.0,
            auto_trigger: false,
            auto_ms: 1000,
        }
    }
}

/// Trigger arguments in the order and width the vendor call expects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerArgs {
    pub enabled: u16,
    pub auto_trigger: u16,
    pub auto_ms: u16,
    pub channel: u16,
    pub direction: u16,
    pub threshold: u16,
    pub hysteresis: u16,
    pub delay: f32,
}

impl TriggerConfig {
    pub fn to_args(&self) -> Result<TriggerArgs, PicoError> {
        Ok(TriggerArgs {
            enabled: self.enabled as u16,
            auto_trigger: self.auto_trigger as u16,
            auto_ms: self.auto_ms,
            channel: self.channel.resolve()?,
            direction: self.edge.code(),
            threshold: self.threshold,
            hysteresis: self.hysteresis,
            delay: self.delay_percent,
        })
    }
}
