use crate::config::Conf;
use crate::error::PicoError;
use crate::pl1000::{PicoInfo, Pl1000Api};
use crate::session::{DeviceSession, ReadStatus};
use crate::utils::{channels_from_str, channels_to_str, Counter};
use log::{debug, error, log, warn, Level, LevelFilter};
use ndarray::Array2;
use time::OffsetDateTime;

const UNKNOWN_TYPE: &str = "Unknown PicoLog device";

/// Published state of a logger device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceState {
    Init,
    On,
    Open,
    Standby,
    Running,
    Fault,
    Close,
}

/// Everything a remote client can read from one logger device.
#[derive(Clone, Debug)]
pub struct Attributes {
    pub name: String,
    pub state: DeviceState,
    pub device_type: String,
    pub info: String,
    /// Ping round trip in seconds, -1.0 when the unit did not answer.
    pub ping: f64,
    pub scale: f64,
    pub trigger: u32,
    pub overflow: u16,
    /// ms
    pub sampling: f64,
    pub record_in_progress: bool,
    pub data_ready: bool,
    pub record_us: u32,
    pub points_per_channel: u32,
    pub channels: String,
    pub start_time: Option<OffsetDateTime>,
    pub stop_time: Option<OffsetDateTime>,
    pub last_status: String,
    pub message: String,
    pub captures: usize,
}

/// A PicoLog unit as seen by the control system: session plus adapter bookkeeping.
pub struct LoggerDevice<D: Pl1000Api> {
    name: String,
    session: DeviceSession<D>,
    conf: Conf,
    state: DeviceState,
    device_type: String,
    record_initiated: bool,
    data_ready: bool,
    message: String,
    counter: Counter,
}

impl<D: Pl1000Api> LoggerDevice<D> {
    pub fn new(name: &str, device: D, conf: Conf) -> Self {
        let session = DeviceSession::with_policy(device, conf.reconnect_policy());
        Self {
            name: name.to_string(),
            session,
            conf,
            state: DeviceState::Init,
            device_type: UNKNOWN_TYPE.to_string(),
            record_initiated: false,
            data_ready: false,
            message: String::new(),
            counter: Counter::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn conf(&self) -> &Conf {
        &self.conf
    }

    pub fn session(&self) -> &DeviceSession<D> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DeviceSession<D> {
        &mut self.session
    }

    pub fn record_in_progress(&self) -> bool {
        self.record_initiated
    }

    pub fn data_ready(&self) -> bool {
        self.data_ready
    }

    pub fn counter(&self) -> &Counter {
        &self.counter
    }

    fn report(&mut self, level: Level, msg: String) {
        log!(level, "{} {}", self.name, msg);
        self.message = msg;
    }

    fn fault(&mut self, what: &str, e: &PicoError) {
        self.record_initiated = false;
        self.data_ready = false;
        self.state = DeviceState::Fault;
        self.report(Level::Warn, format!("{}: {}", what, e));
    }

    /// Open the unit, read its info and apply the configured timing and trigger.
    pub fn init(&mut self) -> Result<(), PicoError> {
        self.state = DeviceState::Init;
        self.record_initiated = false;
        self.data_ready = false;
        let res = self.try_init();
        match &res {
            Ok(()) => {
                self.state = DeviceState::Standby;
                let msg = format!("{} has been initialized", self.device_type);
                self.report(Level::Info, msg);
            }
            Err(e) => {
                self.state = DeviceState::Fault;
                self.report(Level::Error, format!("Exception initializing PicoLog: {}", e));
            }
        }
        res
    }

    fn try_init(&mut self) -> Result<(), PicoError> {
        self.state = DeviceState::On;
        self.session.open()?;
        self.state = DeviceState::Open;
        let info = self.session.unit_info(&PicoInfo::ALL)?;
        self.device_type = info.variant().unwrap_or(UNKNOWN_TYPE).to_string();
        self.apply_config()?;
        Ok(())
    }

    /// Stop and release the unit.
    pub fn delete(&mut self) {
        if self.session.is_open() {
            let _ = self.session.stop();
        }
        let _ = self.session.close();
        self.record_initiated = false;
        self.state = DeviceState::Close;
        self.report(Level::Info, "PicoLog has been deleted".into());
    }

    fn apply_config(&mut self) -> Result<bool, PicoError> {
        let request = self.conf.timing_request();
        let trigger = self.conf.trigger_config();
        let matches = self.session.configure(&request, &trigger)?;
        if let Some(buffer) = self.session.buffer() {
            debug!(
                "{} buffer {:?}, scale {} V per count",
                self.name,
                buffer.data.dim(),
                self.session.scale()
            );
        }
        Ok(matches)
    }

    /// Stop any capture and apply the current configuration again.
    pub fn reconfigure(&mut self) -> Result<bool, PicoError> {
        self.stop_recording();
        let res = self.apply_config();
        self.record_initiated = false;
        self.data_ready = false;
        match &res {
            Ok(_) => {
                self.state = DeviceState::Standby;
                debug!("{} New config applied", self.name);
            }
            Err(e) => self.fault("Config error", e),
        }
        res
    }

    /// Start a capture.
    ///
    /// With `mode > 0` a record already in progress blocks the start; with `mode > 1` the
    /// unit must also report ready.
    pub fn start(&mut self, mode: u8) -> bool {
        if mode > 0 && self.record_initiated {
            self.report(Level::Info, "Can not start - record in progress".into());
            return false;
        }
        if mode > 1 && !matches!(self.session.ready(), Ok(true)) {
            self.report(Level::Info, "Can not start - device not ready".into());
            return false;
        }
        match self.session.start() {
            Ok(true) => {
                self.record_initiated = true;
                self.data_ready = false;
                self.state = DeviceState::Running;
                self.report(Level::Info, "Recording started".into());
                true
            }
            Ok(false) => false,
            Err(e) => {
                self.fault("Recording start error", &e);
                false
            }
        }
    }

    /// Stop, reconfigure and start in one step.
    pub fn start_recording(&mut self) -> bool {
        if self.reconfigure().is_err() {
            return false;
        }
        self.start(0)
    }

    pub fn stop_recording(&mut self) {
        match self.session.stop() {
            Ok(()) => {
                self.record_initiated = false;
                self.data_ready = false;
                self.state = DeviceState::Standby;
                self.report(Level::Info, "Recording stopped".into());
            }
            Err(e) => self.fault("Recording stop error", &e),
        }
    }

    /// Start or stop depending on the requested flag; no-op if already there.
    pub fn set_record_in_progress(&mut self, value: bool) {
        match (value, self.record_initiated) {
            (true, false) => {
                self.start_recording();
            }
            (false, true) => self.stop_recording(),
            _ => (),
        }
    }

    fn apply_timing(&mut self) -> Result<bool, PicoError> {
        let request = self.conf.timing_request();
        let res = self.session.set_timing(&request);
        self.data_ready = false;
        if let Err(e) = &res {
            self.fault("Timing error", e);
        }
        res
    }

    /// Set the channel list from its text form, e.g. `"[1, 2, 5]"`.
    pub fn set_channels(&mut self, text: &str) -> Result<bool, PicoError> {
        self.conf.acquisition.channels = channels_from_str(text);
        self.apply_timing()
    }

    pub fn set_points_per_channel(&mut self, points: u32) -> Result<bool, PicoError> {
        self.conf.acquisition.points_per_channel = points;
        self.apply_timing()
    }

    pub fn set_record_us(&mut self, record_us: u32) -> Result<bool, PicoError> {
        self.conf.acquisition.record_us = record_us;
        self.apply_timing()
    }

    pub fn set_log_level(&mut self, level: LevelFilter) {
        log::set_max_level(level);
        self.conf.logging.level = level.to_string().to_lowercase();
        self.report(Level::Info, format!("Log level set to {}", level));
    }

    /// One tick of the host loop. Returns true when a capture finished in this tick.
    pub fn poll(&mut self) -> bool {
        if self.session.maintain() {
            self.report(Level::Info, "Device reconnected".into());
            if self.state == DeviceState::Running {
                self.record_initiated = false;
                self.state = DeviceState::Standby;
            }
        } else if !self.session.is_usable()
            && !matches!(self.state, DeviceState::Fault | DeviceState::Close)
        {
            self.record_initiated = false;
            self.data_ready = false;
            self.state = DeviceState::Fault;
            self.report(Level::Error, "Device lost, reconnect given up".into());
            return false;
        }
        if !self.record_initiated {
            return false;
        }
        let res = match self.session.ready() {
            Ok(true) => self.session.read(),
            Ok(false) => return false,
            Err(e) => Err(e),
        };
        match res {
            Ok(ReadStatus::NotReady) => false,
            Ok(status) => {
                self.record_initiated = false;
                self.data_ready = true;
                self.state = DeviceState::Standby;
                let samples = self.session.buffer().map_or(0, |b| b.valid_points * b.n_channels());
                self.counter.increment(samples);
                if let ReadStatus::Partial { delivered } = status {
                    warn!("{} Partial capture, {} points per channel", self.name, delivered);
                }
                self.report(Level::Info, "Recording finished, data is ready".into());
                true
            }
            Err(e) => {
                self.fault("Reading data error", &e);
                false
            }
        }
    }

    pub fn snapshot(&mut self) -> Attributes {
        let ping = self.session.ping().map_or(-1.0, |d| d.as_secs_f64());
        let timing = self.session.timing();
        Attributes {
            name: self.name.clone(),
            state: self.state,
            device_type: self.device_type.clone(),
            info: self.session.info().to_string(),
            ping,
            scale: self.session.scale(),
            trigger: self.session.trigger_index(),
            overflow: self.session.overflow(),
            sampling: timing.map_or(0.0, |t| t.sampling_ms),
            record_in_progress: self.record_initiated,
            data_ready: self.data_ready,
            record_us: timing.map_or(0, |t| t.record_us),
            points_per_channel: timing.map_or(0, |t| t.points),
            channels: channels_to_str(&self.conf.acquisition.channels),
            start_time: self.session.started_at(),
            stop_time: self.session.read_at(),
            last_status: self.session.last_status().to_string(),
            message: self.message.clone(),
            captures: self.counter.n_captures,
        }
    }

    fn check_channel(&mut self, channel: u16) -> bool {
        if !self.data_ready {
            self.report(Level::Info, format!("Data is not ready for channel {}", channel));
            return false;
        }
        if !self.conf.acquisition.channels.contains(&channel) {
            self.report(
                Level::Info,
                format!("Channel {} is not set for measurements", channel),
            );
            return false;
        }
        true
    }

    /// Samples of one channel; empty when no data is ready or the channel is not recorded.
    pub fn channel_data(&mut self, channel: u16) -> Vec<u16> {
        if !self.check_channel(channel) {
            return Vec::new();
        }
        self.session
            .buffer()
            .and_then(|b| b.channel_data(channel))
            .map(|row| row.to_vec())
            .unwrap_or_default()
    }

    /// Sample times in ms of one channel.
    pub fn channel_times(&mut self, channel: u16) -> Vec<f32> {
        if !self.check_channel(channel) {
            return Vec::new();
        }
        self.session
            .buffer()
            .and_then(|b| b.channel_times(channel))
            .map(|row| row.to_vec())
            .unwrap_or_default()
    }

    pub fn raw_data(&self) -> Option<&Array2<u16>> {
        if !self.data_ready {
            warn!("{} Data is not ready", self.name);
            return None;
        }
        self.session.buffer().map(|b| &b.data)
    }

    pub fn times(&self) -> Option<&Array2<f32>> {
        if !self.data_ready {
            warn!("{} Data is not ready", self.name);
            return None;
        }
        self.session.buffer().map(|b| &b.times)
    }
}

impl<D: Pl1000Api> Drop for LoggerDevice<D> {
    fn drop(&mut self) {
        if self.session.is_open() {
            if let Err(e) = self.session.close() {
                error!("{} Close on drop failed: {}", self.name, e);
            }
        }
    }
}
