use crate::capture::CaptureBuffer;
use crate::error::{PicoError, Warning};
use crate::pl1000::{BlockMethod, Handle, PicoInfo, PicoStatus, Pl1000Api};
use crate::reconnect::{ReconnectPolicy, ReconnectTracker};
use crate::timing::{self, Timing, TimingPlan, TimingRequest};
use crate::trigger::{TriggerArgs, TriggerConfig};
use crate::unit_info::UnitInfo;
use crate::utils::timer_is_coarse;
use log::{debug, error, info, warn};
use std::thread;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

/// Full scale input voltage of the 1000 series.
pub const INPUT_RANGE_V: f64 = 2.5;
pub const DEFAULT_MAX_ADC: u16 = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Open,
    Configured,
    Running,
    DataReady,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadStatus {
    /// No capture finished; nothing was transferred.
    NotReady,
    Complete,
    /// Only a prefix of the block holds valid samples.
    Partial { delivered: u32 },
}

/// One opened PicoLog 1000 unit.
///
/// Callers serialize access; the session does no locking of its own.
pub struct DeviceSession<D: Pl1000Api> {
    device: D,
    handle: Option<Handle>,
    state: SessionState,
    last_status: PicoStatus,
    max_adc: u16,
    timing: Option<Timing>,
    last_request: Option<TimingRequest>,
    trigger: Option<TriggerConfig>,
    buffer: Option<CaptureBuffer>,
    block_method: BlockMethod,
    overflow: u16,
    trigger_index: u32,
    started_at: Option<OffsetDateTime>,
    read_at: Option<OffsetDateTime>,
    info: UnitInfo,
    warnings: Vec<Warning>,
    reconnect: ReconnectTracker,
    usable: bool,
    poll_interval: Duration,
    coarse_timer: Option<bool>,
}

impl<D: Pl1000Api> DeviceSession<D> {
    pub fn new(device: D) -> Self {
        Self::with_policy(device, ReconnectPolicy::default())
    }

    pub fn with_policy(device: D, policy: ReconnectPolicy) -> Self {
        Self {
            device,
            handle: None,
            state: SessionState::Closed,
            last_status: PicoStatus::Ok,
            max_adc: DEFAULT_MAX_ADC,
            timing: None,
            last_request: None,
            trigger: None,
            buffer: None,
            block_method: BlockMethod::Single,
            overflow: 0,
            trigger_index: 0,
            started_at: None,
            read_at: None,
            info: UnitInfo::default(),
            warnings: Vec::new(),
            reconnect: ReconnectTracker::new(policy),
            usable: true,
            poll_interval: Duration::from_millis(1),
            coarse_timer: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// False once automatic reconnects have been given up.
    pub fn is_usable(&self) -> bool {
        self.usable
    }

    pub fn last_status(&self) -> PicoStatus {
        self.last_status
    }

    pub fn max_adc(&self) -> u16 {
        self.max_adc
    }

    /// Volts per ADC count.
    pub fn scale(&self) -> f64 {
        INPUT_RANGE_V / self.max_adc as f64
    }

    pub fn timing(&self) -> Option<&Timing> {
        self.timing.as_ref()
    }

    pub fn trigger(&self) -> Option<&TriggerConfig> {
        self.trigger.as_ref()
    }

    pub fn buffer(&self) -> Option<&CaptureBuffer> {
        self.buffer.as_ref()
    }

    pub fn overflow(&self) -> u16 {
        self.overflow
    }

    pub fn trigger_index(&self) -> u32 {
        self.trigger_index
    }

    pub fn started_at(&self) -> Option<OffsetDateTime> {
        self.started_at
    }

    pub fn read_at(&self) -> Option<OffsetDateTime> {
        self.read_at
    }

    pub fn info(&self) -> &UnitInfo {
        &self.info
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn reconnect(&self) -> &ReconnectTracker {
        &self.reconnect
    }

    pub fn set_reconnect_policy(&mut self, policy: ReconnectPolicy) {
        self.reconnect.set_policy(policy);
    }

    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    pub fn set_block_method(&mut self, method: BlockMethod) {
        self.block_method = method;
    }

    /// Skip the timer probe in `wait`; `true` selects counted fixed-delay polling.
    pub fn set_coarse_timer(&mut self, coarse: bool) {
        self.coarse_timer = Some(coarse);
    }

    fn require_open(&self) -> Result<Handle, PicoError> {
        self.handle.ok_or(PicoError::DeviceNotOpen)
    }

    fn observe<T>(&mut self, res: &Result<T, PicoStatus>) {
        self.last_status = match res {
            Ok(_) => PicoStatus::Ok,
            Err(status) => *status,
        };
        self.reconnect.observe(res.as_ref().map(|_| ()).map_err(|s| *s));
    }

    /// Run one vendor call against the open handle and record its status.
    fn call<T>(
        &mut self,
        f: impl FnOnce(&mut D, Handle) -> Result<T, PicoStatus>,
    ) -> Result<T, PicoError> {
        let handle = self.require_open()?;
        let res = f(&mut self.device, handle);
        self.observe(&res);
        res.map_err(PicoError::from)
    }

    fn warn(&mut self, warning: Warning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn open(&mut self) -> Result<(), PicoError> {
        if self.handle.is_some() {
            warn!("open ignored, device is already open");
            return Ok(());
        }
        let res = self.device.open_unit();
        self.observe(&res);
        let handle = res?;
        self.handle = Some(handle);
        match self.call(|d, h| d.max_value(h)) {
            Ok(max_count) => {
                self.max_adc = max_count;
            }
            Err(e) => {
                let _ = self.device.close_unit(handle);
                self.handle = None;
                return Err(e);
            }
        }
        self.state = SessionState::Open;
        self.usable = true;
        debug!("Device has been opened, max ADC {}", self.max_adc);
        Ok(())
    }

    fn halt_if_running(&mut self) -> Result<(), PicoError> {
        if self.state == SessionState::Running {
            self.call(|d, h| d.stop(h))?;
            info!("Running capture stopped before applying new settings");
            self.state = SessionState::Configured;
        }
        Ok(())
    }

    fn apply_timing(
        &mut self,
        request: &TimingRequest,
        plan: TimingPlan,
    ) -> Result<bool, PicoError> {
        for w in plan.warnings {
            self.warn(w);
        }
        let channels: Vec<i16> = request.channels.iter().map(|&c| c as i16).collect();
        let mut record_us = plan.record_us;
        let mut points = plan.points;
        self.call(|d, h| d.set_interval(h, &mut record_us, &mut points, &channels))?;

        if points != plan.points {
            self.warn(Warning::TimingCorrected {
                field: "points per channel",
                requested: plan.points as u64,
                actual: points as u64,
            });
        }
        if record_us != plan.record_us {
            self.warn(Warning::TimingCorrected {
                field: "record time us",
                requested: plan.record_us as u64,
                actual: record_us as u64,
            });
        }

        let timing = Timing::new(request.channels.clone(), points, record_us);
        debug!(
            "Timing: {} channels {:?}; sampling {} ms; {} points; duration {} us",
            timing.channels.len(),
            timing.channels,
            timing.sampling_ms,
            timing.points,
            timing.record_us
        );
        let matches = timing.matches(request);
        // the old buffer goes away here, any pending read of it is void
        self.buffer = Some(CaptureBuffer::new(&timing));
        self.timing = Some(timing);
        self.last_request = Some(request.clone());
        Ok(matches)
    }

    fn apply_trigger(&mut self, trigger: &TriggerConfig, args: TriggerArgs) -> Result<(), PicoError> {
        self.call(|d, h| {
            d.set_trigger(
                h,
                args.enabled,
                args.auto_trigger,
                args.auto_ms,
                args.channel,
                args.direction,
                args.threshold,
                args.hysteresis,
                args.delay,
            )
        })?;
        self.trigger = Some(trigger.clone());
        Ok(())
    }

    /// Apply timing only. Returns false when the unit runs with corrected values.
    pub fn set_timing(&mut self, request: &TimingRequest) -> Result<bool, PicoError> {
        self.require_open()?;
        self.warnings.clear();
        let res = timing::plan(request).and_then(|plan| {
            self.halt_if_running()?;
            self.apply_timing(request, plan)
        });
        match res {
            Ok(matches) => {
                self.state = SessionState::Configured;
                Ok(matches)
            }
            Err(e) => {
                self.state = SessionState::Error;
                Err(e)
            }
        }
    }

    /// Apply a trigger setup. A rejected trigger leaves the session untouched.
    pub fn set_trigger(&mut self, trigger: &TriggerConfig) -> Result<(), PicoError> {
        self.require_open()?;
        let args = trigger.to_args()?;
        self.apply_trigger(trigger, args)
    }

    fn try_configure(
        &mut self,
        request: &TimingRequest,
        trigger: &TriggerConfig,
    ) -> Result<bool, PicoError> {
        let plan = timing::plan(request)?;
        let args = trigger.to_args()?;
        self.halt_if_running()?;
        let matches = self.apply_timing(request, plan)?;
        self.apply_trigger(trigger, args)?;
        Ok(matches)
    }

    /// Apply timing, then trigger. Returns false when the timing was corrected.
    ///
    /// Any failure, a rejected request included, leaves the session in `Error`.
    pub fn configure(
        &mut self,
        request: &TimingRequest,
        trigger: &TriggerConfig,
    ) -> Result<bool, PicoError> {
        self.require_open()?;
        self.warnings.clear();
        let res = self.try_configure(request, trigger);
        match res {
            Ok(matches) => {
                self.state = SessionState::Configured;
                Ok(matches)
            }
            Err(e) => {
                error!("Configure failed: {}", e);
                self.state = SessionState::Error;
                Err(e)
            }
        }
    }

    /// Start a block capture. Returns false if one is already running.
    pub fn start(&mut self) -> Result<bool, PicoError> {
        self.require_open()?;
        match self.state {
            SessionState::Running => {
                warn!("Start rejected, record in progress");
                Ok(false)
            }
            SessionState::Configured | SessionState::DataReady => {
                let points = self.timing.as_ref().map_or(0, |t| t.points);
                let method = self.block_method;
                if let Err(e) = self.call(|d, h| d.run(h, points, method)) {
                    self.state = SessionState::Error;
                    return Err(e);
                }
                self.started_at = Some(OffsetDateTime::now_utc());
                self.state = SessionState::Running;
                debug!("Recording started");
                Ok(true)
            }
            state => Err(PicoError::InvalidState { op: "start", state }),
        }
    }

    /// Ask the unit once whether the running block is complete.
    pub fn ready(&mut self) -> Result<bool, PicoError> {
        self.require_open()?;
        match self.state {
            SessionState::Running => self.call(|d, h| d.ready(h)),
            SessionState::DataReady => Ok(true),
            _ => Ok(false),
        }
    }

    /// Poll `ready` until it reports true or `timeout` has passed.
    pub fn wait(&mut self, timeout: Duration) -> Result<bool, PicoError> {
        if self.state != SessionState::Running {
            return self.ready();
        }
        let coarse = *self.coarse_timer.get_or_insert_with(timer_is_coarse);
        let poll = self.poll_interval.max(Duration::from_micros(100));
        if coarse {
            // elapsed time can't be trusted, count fixed-delay polls instead
            let polls = (timeout.as_secs_f64() / poll.as_secs_f64()).ceil() as u64;
            for _ in 0..polls {
                if self.ready()? {
                    return Ok(true);
                }
                thread::sleep(poll);
            }
            return self.ready();
        }
        let t0 = Instant::now();
        loop {
            if self.ready()? {
                return Ok(true);
            }
            let elapsed = t0.elapsed();
            if elapsed >= timeout {
                return Ok(false);
            }
            thread::sleep(poll.min(timeout - elapsed));
        }
    }

    /// Transfer the finished block into the capture buffer.
    pub fn read(&mut self) -> Result<ReadStatus, PicoError> {
        self.require_open()?;
        if self.state != SessionState::Running {
            debug!("Read ignored in state {:?}", self.state);
            return Ok(ReadStatus::NotReady);
        }
        match self.ready() {
            Ok(true) => (),
            Ok(false) => {
                warn!("Read - device is not ready");
                return Ok(ReadStatus::NotReady);
            }
            Err(e) => {
                self.state = SessionState::Error;
                return Err(e);
            }
        }
        let Some(mut buffer) = self.buffer.take() else {
            return Err(PicoError::InvalidState {
                op: "read",
                state: self.state,
            });
        };
        let points = buffer.points() as u32;
        let res = self.call(|d, h| d.get_values(h, buffer.raw_mut(), points));
        let got = match res {
            Ok(got) => got,
            Err(e) => {
                self.buffer = Some(buffer);
                self.state = SessionState::Error;
                return Err(e);
            }
        };
        buffer.deinterleave(got.delivered as usize);
        self.buffer = Some(buffer);
        self.read_at = Some(OffsetDateTime::now_utc());
        self.overflow = got.overflow;
        self.trigger_index = got.trigger_index;
        // timing corrections stay until the next configure
        self.warnings
            .retain(|w| !matches!(w, Warning::PartialCapture { .. }));
        self.state = SessionState::DataReady;
        if got.delivered < points {
            self.warn(Warning::PartialCapture {
                delivered: got.delivered,
                requested: points,
            });
            Ok(ReadStatus::Partial {
                delivered: got.delivered,
            })
        } else {
            Ok(ReadStatus::Complete)
        }
    }

    /// Cancel a pending capture.
    pub fn stop(&mut self) -> Result<(), PicoError> {
        self.require_open()?;
        self.call(|d, h| d.stop(h))?;
        if self.timing.is_some() {
            self.state = SessionState::Configured;
        }
        Ok(())
    }

    /// Release the unit. Closing a closed session only logs.
    pub fn close(&mut self) -> Result<(), PicoError> {
        let Some(handle) = self.handle.take() else {
            info!("Close ignored, device is not open ({})", self.last_status);
            self.state = SessionState::Closed;
            return Ok(());
        };
        self.state = SessionState::Closed;
        let res = self.device.close_unit(handle);
        self.observe(&res);
        res?;
        debug!("Device has been closed");
        Ok(())
    }

    /// Round trip time of a ping, `None` if the unit did not answer.
    pub fn ping(&mut self) -> Option<Duration> {
        let handle = self.handle?;
        let t0 = Instant::now();
        let res = match self.device.ping_unit(handle) {
            Err(PicoStatus::Busy) => Ok(()),
            other => other,
        };
        self.observe(&res);
        res.ok().map(|_| t0.elapsed())
    }

    /// Query info fields one by one; a failing field does not stop the rest.
    pub fn unit_info(&mut self, fields: &[PicoInfo]) -> Result<UnitInfo, PicoError> {
        let handle = self.require_open()?;
        let mut result = UnitInfo::default();
        for &field in fields {
            let res = self.device.get_unit_info(handle, field);
            self.observe(&res);
            if let Err(status) = &res {
                debug!("Info field {} unavailable: {}", field.name(), status);
            }
            self.info.insert(field, res.clone());
            result.insert(field, res);
        }
        Ok(result)
    }

    pub fn set_digital_output(&mut self, number: i16, on: bool) -> Result<(), PicoError> {
        self.call(|d, h| d.set_do(h, on as i16, number))
    }

    pub fn set_pulse_width(&mut self, period: u16, cycle: u8) -> Result<(), PicoError> {
        self.call(|d, h| d.set_pulse_width(h, period, cycle))
    }

    /// Housekeeping from the poll loop: reconnect when the unit went missing.
    ///
    /// Returns true when a reconnect attempt was made and succeeded.
    pub fn maintain(&mut self) -> bool {
        let now = Instant::now();
        if !self.reconnect.due(now) {
            return false;
        }
        warn!(
            "Device not found {} times, reconnecting",
            self.reconnect.not_found_count()
        );
        let res = self.reconnect_now();
        self.reconnect.record_attempt(now, res.is_ok());
        match res {
            Ok(()) => {
                info!("Device reconnected");
                true
            }
            Err(e) => {
                warn!(
                    "Reconnect failed: {}; next attempt in {:?}",
                    e,
                    self.reconnect.cooldown()
                );
                if self.reconnect.exhausted() {
                    error!("Giving up reconnecting");
                    self.usable = false;
                    self.handle = None;
                    self.state = SessionState::Closed;
                }
                false
            }
        }
    }

    fn reconnect_now(&mut self) -> Result<(), PicoError> {
        if self.handle.is_some() {
            let _ = self.call(|d, h| d.stop(h));
        }
        let _ = self.close();
        self.open()?;
        match (self.last_request.clone(), self.trigger.clone()) {
            (Some(request), Some(trigger)) => self.configure(&request, &trigger).map(|_| ()),
            (Some(request), None) => self.set_timing(&request).map(|_| ()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::SimulatedPl1000;

    fn opened() -> DeviceSession<SimulatedPl1000> {
        let mut s = DeviceSession::new(SimulatedPl1000::new());
        s.open().unwrap();
        s
    }

    #[test]
    fn open_reads_scale() {
        let s = opened();
        assert_eq!(s.state(), SessionState::Open);
        assert_eq!(s.max_adc(), 4095);
        assert!((s.scale() - 2.5 / 4095.0).abs() < 1e-12);
    }

    #[test]
    fn calls_before_open_fail() {
        let mut s = DeviceSession::new(SimulatedPl1000::new());
        let req = TimingRequest::new(vec![1], 1000, 1_000_000);
        assert!(matches!(
            s.configure(&req, &TriggerConfig::default()),
            Err(PicoError::DeviceNotOpen)
        ));
        assert!(matches!(s.start(), Err(PicoError::DeviceNotOpen)));
        assert!(matches!(s.read(), Err(PicoError::DeviceNotOpen)));
        assert!(s.ping().is_none());
    }

    #[test]
    fn corrected_record_time() {
        let mut s = opened();
        let req = TimingRequest::new(vec![1, 2, 3, 4], 10000, 200_000);
        let ok = s.configure(&req, &TriggerConfig::default()).unwrap();
        assert!(!ok);
        let t = s.timing().unwrap();
        assert_eq!(t.record_us, 400_000);
        assert!((t.sampling_ms - 0.04).abs() < 1e-12);
        assert_eq!(s.state(), SessionState::Configured);
        assert_eq!(s.warnings().len(), 1);
    }

    #[test]
    fn uncorrected_timing() {
        let mut s = opened();
        let req = TimingRequest::new(vec![1], 1000, 1_000_000);
        assert!(s.configure(&req, &TriggerConfig::default()).unwrap());
        let t = s.timing().unwrap();
        assert!((t.sampling_ms - 0.001 * 1_000_000.0 / 1000.0).abs() < 1e-12);
        assert!(s.warnings().is_empty());
    }

    #[test]
    fn oversized_request_clamps_points() {
        let mut s = opened();
        let req = TimingRequest::new(vec![1, 2, 3], 400_000, 50_000_000);
        assert!(!s.configure(&req, &TriggerConfig::default()).unwrap());
        assert_eq!(s.timing().unwrap().points, 333_333);
        assert_eq!(s.buffer().unwrap().data.dim(), (3, 333_333));
    }

    #[test]
    fn unit_rounding_is_authoritative() {
        let mut s = opened();
        s.device_mut().block_rounding_us = 1000;
        let req = TimingRequest::new(vec![1, 2], 100, 10_500);
        assert!(!s.configure(&req, &TriggerConfig::default()).unwrap());
        let t = s.timing().unwrap();
        assert_eq!(t.record_us, 11_000);
        assert!((t.sampling_ms - 0.11).abs() < 1e-12);
    }

    #[test]
    fn invalid_request_is_an_error() {
        let mut s = opened();
        let req = TimingRequest::new(vec![1, 1], 100, 10_000);
        assert!(matches!(
            s.configure(&req, &TriggerConfig::default()),
            Err(PicoError::ArgumentOutOfRange(_))
        ));
        assert_eq!(s.state(), SessionState::Error);
        assert_eq!(s.device().count_calls("set_interval"), 0);

        let req = TimingRequest::new(vec![1], 100, 10_000);
        s.configure(&req, &TriggerConfig::default()).unwrap();
        assert_eq!(s.state(), SessionState::Configured);
        let unknown = TriggerConfig {
            channel: crate::trigger::TriggerChannel::Name("PL1000_CHANNEL_99".into()),
            ..Default::default()
        };
        assert!(matches!(
            s.configure(&req, &unknown),
            Err(PicoError::ArgumentOutOfRange(_))
        ));
        assert_eq!(s.state(), SessionState::Error);

        s.configure(&req, &TriggerConfig::default()).unwrap();
        assert!(s.set_timing(&TimingRequest::new(vec![], 100, 10_000)).is_err());
        assert_eq!(s.state(), SessionState::Error);
    }

    #[test]
    fn timing_warnings_survive_read() {
        let mut s = opened();
        let req = TimingRequest::new(vec![1, 2], 100, 10);
        assert!(!s.configure(&req, &TriggerConfig::default()).unwrap());
        s.start().unwrap();
        assert_eq!(s.read().unwrap(), ReadStatus::Complete);
        assert!(matches!(
            s.warnings(),
            [Warning::TimingCorrected {
                field: "record time us",
                ..
            }]
        ));
    }

    #[test]
    fn rejected_trigger() {
        let mut s = opened();
        let req = TimingRequest::new(vec![1], 100, 10_000);
        s.configure(&req, &TriggerConfig::default()).unwrap();
        s.device_mut().reject_trigger = true;
        let bad = TriggerConfig {
            enabled: true,
            threshold: 1000,
            ..Default::default()
        };
        assert!(s.set_trigger(&bad).is_err());
        assert_eq!(s.state(), SessionState::Configured);
        assert_eq!(s.trigger(), Some(&TriggerConfig::default()));

        assert!(s.configure(&req, &bad).is_err());
        assert_eq!(s.state(), SessionState::Error);
        assert_eq!(s.last_status(), PicoStatus::InvalidTriggerChannel);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut s = opened();
        s.device_mut().ready_delay = None;
        let req = TimingRequest::new(vec![1], 100, 10_000);
        s.configure(&req, &TriggerConfig::default()).unwrap();
        assert!(s.start().unwrap());
        assert!(!s.start().unwrap());
        assert_eq!(s.state(), SessionState::Running);
        assert_eq!(s.device().count_calls("run"), 1);
        assert!(s.device().is_running());
    }

    #[test]
    fn start_needs_configuration() {
        let mut s = opened();
        assert!(matches!(
            s.start(),
            Err(PicoError::InvalidState { op: "start", .. })
        ));
    }

    #[test]
    fn read_outside_running_is_noop() {
        let mut s = opened();
        assert_eq!(s.read().unwrap(), ReadStatus::NotReady);
        let req = TimingRequest::new(vec![1], 100, 10_000);
        s.configure(&req, &TriggerConfig::default()).unwrap();
        assert_eq!(s.read().unwrap(), ReadStatus::NotReady);
        assert_eq!(s.state(), SessionState::Configured);
        assert_eq!(s.device().count_calls("get_values"), 0);
    }

    #[test]
    fn close_twice() {
        let mut s = opened();
        s.close().unwrap();
        s.close().unwrap();
        assert_eq!(s.state(), SessionState::Closed);
        assert!(!s.is_open());
    }

    #[test]
    fn full_capture() {
        let mut s = opened();
        s.device_mut().overflow = 2;
        s.device_mut().trigger_index = 17;
        let req = TimingRequest::new(vec![1, 3], 500, 50_000);
        assert!(s.configure(&req, &TriggerConfig::default()).unwrap());
        s.start().unwrap();
        assert!(s.wait(Duration::from_secs(1)).unwrap());
        assert_eq!(s.read().unwrap(), ReadStatus::Complete);
        assert_eq!(s.state(), SessionState::DataReady);
        assert_eq!(s.overflow(), 2);
        assert_eq!(s.trigger_index(), 17);
        assert!(s.read_at().is_some());
        let buf = s.buffer().unwrap();
        assert_eq!(buf.data.dim(), (2, 500));
        assert_eq!(buf.valid_points, 500);
        assert!(buf.data.iter().any(|&v| v > 0));
        // data ready allows a new start
        assert!(s.start().unwrap());
    }

    #[test]
    fn partial_capture_is_a_warning() {
        let mut s = opened();
        s.device_mut().short_delivery = Some(40);
        let req = TimingRequest::new(vec![1], 100, 10_000);
        s.configure(&req, &TriggerConfig::default()).unwrap();
        s.start().unwrap();
        assert_eq!(s.read().unwrap(), ReadStatus::Partial { delivered: 40 });
        assert_eq!(s.buffer().unwrap().valid_points, 40);
        assert_eq!(
            s.warnings(),
            &[Warning::PartialCapture {
                delivered: 40,
                requested: 100
            }]
        );
    }

    #[test]
    fn wait_times_out() {
        let mut s = opened();
        s.device_mut().ready_delay = None;
        s.set_poll_interval(Duration::from_millis(5));
        let req = TimingRequest::new(vec![1], 100, 10_000);
        s.configure(&req, &TriggerConfig::default()).unwrap();
        s.start().unwrap();
        let t0 = Instant::now();
        assert!(!s.wait(Duration::from_millis(50)).unwrap());
        let elapsed = t0.elapsed();
        assert!(elapsed >= Duration::from_millis(45), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(500), "{:?}", elapsed);
        assert_eq!(s.state(), SessionState::Running);
    }

    #[test]
    fn coarse_timer_counts_polls() {
        let mut s = opened();
        s.device_mut().ready_delay = None;
        s.set_poll_interval(Duration::from_millis(5));
        s.set_coarse_timer(true);
        let req = TimingRequest::new(vec![1], 100, 10_000);
        s.configure(&req, &TriggerConfig::default()).unwrap();
        s.start().unwrap();
        let t0 = Instant::now();
        assert!(!s.wait(Duration::from_millis(50)).unwrap());
        let elapsed = t0.elapsed();
        assert!(elapsed >= Duration::from_millis(45), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(500), "{:?}", elapsed);
        let polls = s.device().count_calls("ready");
        assert!((10..=12).contains(&polls), "{}", polls);

        s.device_mut().ready_delay = Some(Duration::from_millis(20));
        s.stop().unwrap();
        s.start().unwrap();
        assert!(s.wait(Duration::from_secs(1)).unwrap());
        assert_eq!(s.state(), SessionState::Running);
    }

    #[test]
    fn stop_cancels_capture() {
        let mut s = opened();
        s.device_mut().ready_delay = None;
        let req = TimingRequest::new(vec![1], 100, 10_000);
        s.configure(&req, &TriggerConfig::default()).unwrap();
        s.start().unwrap();
        s.stop().unwrap();
        assert_eq!(s.state(), SessionState::Configured);
        assert!(!s.device().is_running());
    }

    #[test]
    fn configure_while_running_stops_first() {
        let mut s = opened();
        s.device_mut().ready_delay = None;
        let req = TimingRequest::new(vec![1], 100, 10_000);
        s.configure(&req, &TriggerConfig::default()).unwrap();
        s.start().unwrap();
        let req = TimingRequest::new(vec![2, 4], 200, 20_000);
        assert!(s.configure(&req, &TriggerConfig::default()).unwrap());
        assert_eq!(s.state(), SessionState::Configured);
        assert_eq!(s.device().count_calls("stop"), 1);
        assert_eq!(s.buffer().unwrap().channels, vec![2, 4]);
    }

    #[test]
    fn ping_tolerates_busy() {
        let mut s = opened();
        assert!(s.ping().is_some());
        s.device_mut().busy = true;
        assert!(s.ping().is_some());
        s.device_mut().unplug();
        assert!(s.ping().is_none());
        assert_eq!(s.last_status(), PicoStatus::NotFound);
    }

    #[test]
    fn unit_info_per_field() {
        let mut s = opened();
        s.device_mut().missing_info = vec![PicoInfo::CalDate];
        let info = s.unit_info(&PicoInfo::ALL).unwrap();
        assert_eq!(info.len(), PicoInfo::ALL.len());
        assert_eq!(info.variant(), Some("PicoLog1216"));
        assert_eq!(info.failed().count(), 1);
        assert_eq!(s.info().variant(), Some("PicoLog1216"));
    }

    #[test]
    fn auxiliary_outputs() {
        let mut s = opened();
        s.set_digital_output(1, true).unwrap();
        assert_eq!(s.device().digital_output(1), Some(true));
        s.set_pulse_width(1000, 50).unwrap();
        assert_eq!(s.device().pulse_width(), (1000, 50));
        assert!(s.set_pulse_width(1000, 150).is_err());
    }

    fn reconnecting() -> DeviceSession<SimulatedPl1000> {
        let policy = ReconnectPolicy {
            enabled: true,
            cooldown: Duration::ZERO,
            count: 2,
        };
        let mut s = DeviceSession::with_policy(SimulatedPl1000::new(), policy);
        s.open().unwrap();
        let req = TimingRequest::new(vec![1, 2], 100, 10_000);
        let trig = TriggerConfig {
            enabled: true,
            channel: crate::trigger::TriggerChannel::Index(2),
            ..Default::default()
        };
        s.configure(&req, &trig).unwrap();
        s
    }

    #[test]
    fn reconnect_replays_settings() {
        let mut s = reconnecting();
        s.device_mut().unplug();
        assert!(s.ping().is_none());
        assert!(!s.maintain());
        assert!(s.ping().is_none());
        s.device_mut().plug_in();
        let before = s.device().count_calls("set_interval");
        assert!(s.maintain());
        assert_eq!(s.device().count_calls("set_interval"), before + 1);
        assert_eq!(s.state(), SessionState::Configured);
        assert_eq!(s.reconnect().not_found_count(), 0);
        assert_eq!(
            s.trigger().map(|t| t.channel.clone()),
            Some(crate::trigger::TriggerChannel::Index(2))
        );
    }

    #[test]
    fn reconnect_gives_up() {
        let mut s = reconnecting();
        s.device_mut().unplug();
        s.ping();
        s.ping();
        assert!(!s.maintain());
        assert!(s.is_usable());
        assert!(!s.maintain());
        assert!(!s.is_usable());
        assert_eq!(s.state(), SessionState::Closed);
        assert!(!s.maintain());
    }
}
