use crate::pl1000::{
    BlockMethod, GetValues, Handle, PicoInfo, PicoStatus, Pl1000Api, MAX_CHANNELS,
};
use rand::Rng;
use std::f64::consts::PI;
use std::time::{Duration, Instant};

/// In-memory PicoLog 1000 unit for tests and `--simulate` runs.
///
/// The public fields steer its behavior; `calls` records every vendor entry point hit.
#[derive(Debug)]
pub struct SimulatedPl1000 {
    pub max_adc: u16,
    pub variant: String,
    /// `None` never reports ready; otherwise the block completes this long after `run`.
    pub ready_delay: Option<Duration>,
    /// When non-zero the block time is rounded up to a multiple of this.
    pub block_rounding_us: u32,
    /// Deliver at most this many samples per channel.
    pub short_delivery: Option<u32>,
    /// Every call fails with `PICO_NOT_FOUND` while set.
    pub unplugged: bool,
    pub reject_trigger: bool,
    pub busy: bool,
    pub overflow: u16,
    pub trigger_index: u32,
    /// Info fields that fail with `PICO_INFO_UNAVAILABLE`.
    pub missing_info: Vec<PicoInfo>,
    pub calls: Vec<&'static str>,

    handle: Option<Handle>,
    next_handle: Handle,
    channels: Vec<i16>,
    samples: u32,
    us_for_block: u32,
    run_started: Option<Instant>,
    digital_outputs: [bool; 4],
    pulse: (u16, u8),
}

impl Default for SimulatedPl1000 {
    fn default() -> Self {
        Self {
            max_adc: 4095,
            variant: "PicoLog1216".into(),
            ready_delay: Some(Duration::ZERO),
            block_rounding_us: 0,
            short_delivery: None,
            unplugged: false,
            reject_trigger: false,
            busy: false,
            overflow: 0,
            trigger_index: 0,
            missing_info: Vec::new(),
            calls: Vec::new(),
            handle: None,
            next_handle: 1,
            channels: Vec::new(),
            samples: 0,
            us_for_block: 0,
            run_started: None,
            digital_outputs: [false; 4],
            pulse: (0, 0),
        }
    }
}

impl SimulatedPl1000 {
    pub fn new() -> Self {
        Default::default()
    }

    /// Pull the cable: the unit forgets its handle and every call reports `PICO_NOT_FOUND`.
    pub fn unplug(&mut self) {
        self.unplugged = true;
        self.handle = None;
        self.run_started = None;
    }

    pub fn plug_in(&mut self) {
        self.unplugged = false;
    }

    pub fn is_running(&self) -> bool {
        self.run_started.is_some()
    }

    pub fn digital_output(&self, number: usize) -> Option<bool> {
        self.digital_outputs.get(number).copied()
    }

    pub fn pulse_width(&self) -> (u16, u8) {
        self.pulse
    }

    pub fn count_calls(&self, name: &str) -> usize {
        self.calls.iter().filter(|&&c| c == name).count()
    }

    fn enter(&mut self, name: &'static str, handle: Option<Handle>) -> Result<(), PicoStatus> {
        self.calls.push(name);
        if self.unplugged {
            return Err(PicoStatus::NotFound);
        }
        match handle {
            Some(h) if self.handle != Some(h) => Err(PicoStatus::InvalidHandle),
            _ => Ok(()),
        }
    }

    fn sample(&self, channel: i16, tick: u32, rng: &mut impl Rng) -> u16 {
        let mid = self.max_adc as f64 / 2.0;
        let phase = 2.0 * PI * tick as f64 / 250.0 + channel as f64 * PI / 8.0;
        let noise: f64 = rng.random_range(-4.0..4.0);
        (mid + 0.6 * mid * phase.sin() + noise).clamp(0.0, self.max_adc as f64) as u16
    }
}

impl Pl1000Api for SimulatedPl1000 {
    fn open_unit(&mut self) -> Result<Handle, PicoStatus> {
        self.enter("open_unit", None)?;
        if self.handle.is_some() {
            return Err(PicoStatus::MaxUnitsOpened);
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.handle = Some(handle);
        Ok(handle)
    }

    fn close_unit(&mut self, handle: Handle) -> Result<(), PicoStatus> {
        self.enter("close_unit", Some(handle))?;
        self.handle = None;
        self.run_started = None;
        Ok(())
    }

    fn max_value(&mut self, handle: Handle) -> Result<u16, PicoStatus> {
        self.enter("max_value", Some(handle))?;
        Ok(self.max_adc)
    }

    fn set_interval(
        &mut self,
        handle: Handle,
        us_for_block: &mut u32,
        samples: &mut u32,
        channels: &[i16],
    ) -> Result<(), PicoStatus> {
        self.enter("set_interval", Some(handle))?;
        if channels.is_empty()
            || channels.len() > MAX_CHANNELS
            || channels.iter().any(|&c| c < 1 || c as usize > MAX_CHANNELS)
        {
            return Err(PicoStatus::InvalidChannel);
        }
        if *samples == 0 {
            return Err(PicoStatus::InvalidParameter);
        }
        if self.block_rounding_us > 0 {
            let step = self.block_rounding_us;
            *us_for_block = us_for_block.div_ceil(step) * step;
        }
        self.channels = channels.to_vec();
        self.samples = *samples;
        self.us_for_block = *us_for_block;
        Ok(())
    }

    fn set_trigger(
        &mut self,
        handle: Handle,
        _enabled: u16,
        _auto_trigger: u16,
        _auto_ms: u16,
        channel: u16,
        direction: u16,
        _threshold: u16,
        _hysteresis: u16,
        _delay: f32,
    ) -> Result<(), PicoStatus> {
        self.enter("set_trigger", Some(handle))?;
        if self.reject_trigger || channel == 0 || channel as usize > MAX_CHANNELS || direction > 1
        {
            return Err(PicoStatus::InvalidTriggerChannel);
        }
        Ok(())
    }

    fn run(
        &mut self,
        handle: Handle,
        no_of_values: u32,
        _method: BlockMethod,
    ) -> Result<(), PicoStatus> {
        self.enter("run", Some(handle))?;
        if self.channels.is_empty() || no_of_values == 0 {
            return Err(PicoStatus::InvalidParameter);
        }
        self.run_started = Some(Instant::now());
        Ok(())
    }

    fn ready(&mut self, handle: Handle) -> Result<bool, PicoStatus> {
        self.enter("ready", Some(handle))?;
        Ok(match (self.run_started, self.ready_delay) {
            (Some(started), Some(delay)) => started.elapsed() >= delay,
            _ => false,
        })
    }

    fn get_values(
        &mut self,
        handle: Handle,
        values: &mut [u16],
        no_of_values: u32,
    ) -> Result<GetValues, PicoStatus> {
        self.enter("get_values", Some(handle))?;
        if self.run_started.is_none() {
            return Err(PicoStatus::DataNotAvailable);
        }
        let n_channels = self.channels.len();
        let requested = no_of_values.min(self.samples);
        let delivered = self
            .short_delivery
            .map_or(requested, |limit| limit.min(requested));
        if values.len() < delivered as usize * n_channels {
            return Err(PicoStatus::NullParameter);
        }
        let mut rng = rand::rng();
        for tick in 0..delivered {
            for (c, &channel) in self.channels.iter().enumerate() {
                values[tick as usize * n_channels + c] = self.sample(channel, tick, &mut rng);
            }
        }
        self.run_started = None;
        Ok(GetValues {
            delivered,
            overflow: self.overflow,
            trigger_index: self.trigger_index,
        })
    }

    fn stop(&mut self, handle: Handle) -> Result<(), PicoStatus> {
        self.enter("stop", Some(handle))?;
        self.run_started = None;
        Ok(())
    }

    fn ping_unit(&mut self, handle: Handle) -> Result<(), PicoStatus> {
        self.enter("ping_unit", Some(handle))?;
        if self.busy {
            Err(PicoStatus::Busy)
        } else {
            Ok(())
        }
    }

    fn get_unit_info(&mut self, handle: Handle, info: PicoInfo) -> Result<String, PicoStatus> {
        self.enter("get_unit_info", Some(handle))?;
        if self.missing_info.contains(&info) {
            return Err(PicoStatus::InfoUnavailable);
        }
        Ok(match info {
            PicoInfo::DriverVersion => "1.0.0.0".into(),
            PicoInfo::UsbVersion => "2.0".into(),
            PicoInfo::HardwareVersion => "1".into(),
            PicoInfo::VariantInfo => self.variant.clone(),
            PicoInfo::BatchAndSerial => "SIM00/001".into(),
            PicoInfo::CalDate => "01Jan26".into(),
            PicoInfo::KernelVersion => "0.0".into(),
            PicoInfo::DigitalHardwareVersion => "1".into(),
            PicoInfo::AnalogueHardwareVersion => "1".into(),
            PicoInfo::FirmwareVersion1 => "1.0".into(),
            PicoInfo::FirmwareVersion2 => "1.0".into(),
        })
    }

    fn set_do(&mut self, handle: Handle, do_value: i16, do_number: i16) -> Result<(), PicoStatus> {
        self.enter("set_do", Some(handle))?;
        let slot = self
            .digital_outputs
            .get_mut(do_number as usize)
            .ok_or(PicoStatus::InvalidParameter)?;
        *slot = do_value != 0;
        Ok(())
    }

    fn set_pulse_width(
        &mut self,
        handle: Handle,
        period: u16,
        cycle: u8,
    ) -> Result<(), PicoStatus> {
        self.enter("set_pulse_width", Some(handle))?;
        if cycle > 100 {
            return Err(PicoStatus::InvalidParameter);
        }
        self.pulse = (period, cycle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_block_time() {
        let mut sim = SimulatedPl1000 {
            block_rounding_us: 1000,
            ..Default::default()
        };
        let h = sim.open_unit().unwrap();
        let mut us = 1500;
        let mut n = 100;
        sim.set_interval(h, &mut us, &mut n, &[1, 2]).unwrap();
        assert_eq!(us, 2000);
        assert_eq!(n, 100);
    }

    #[test]
    fn interleaves_samples() {
        let mut sim = SimulatedPl1000::new();
        let h = sim.open_unit().unwrap();
        let (mut us, mut n) = (1000, 10);
        sim.set_interval(h, &mut us, &mut n, &[1, 2, 3]).unwrap();
        sim.run(h, 10, BlockMethod::Single).unwrap();
        assert!(sim.ready(h).unwrap());
        let mut buf = vec![0u16; 30];
        let got = sim.get_values(h, &mut buf, 10).unwrap();
        assert_eq!(got.delivered, 10);
        assert!(buf.iter().all(|&v| v <= 4095));
    }

    #[test]
    fn unplugged_reports_not_found() {
        let mut sim = SimulatedPl1000::new();
        sim.unplugged = true;
        assert_eq!(sim.open_unit(), Err(PicoStatus::NotFound));
    }
}
