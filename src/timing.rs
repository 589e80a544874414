use crate::error::{PicoError, Warning};
use crate::pl1000::MAX_CHANNELS;
use ndarray::{Array1, Array2, Axis};

/// Largest number of samples (all channels together) one block can hold.
pub const MAX_CAPTURE_SIZE: u32 = 1_000_000;
/// Captures up to this many samples may run at the fast floor.
pub const SMALL_CAPTURE_THRESHOLD: u32 = 8096;
pub const FAST_FLOOR_US: u32 = 1;
pub const SLOW_FLOOR_US: u32 = 10;

/// Requested acquisition timing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimingRequest {
    pub channels: Vec<u16>,
    pub points: u32,
    pub record_us: u32,
}

impl TimingRequest {
    pub fn new(channels: Vec<u16>, points: u32, record_us: u32) -> Self {
        Self {
            channels,
            points,
            record_us,
        }
    }

    pub fn validate(&self) -> Result<(), PicoError> {
        if self.channels.is_empty() || self.channels.len() > MAX_CHANNELS {
            return Err(PicoError::ArgumentOutOfRange(format!(
                "channel list must hold 1 to {} entries, got {}",
                MAX_CHANNELS,
                self.channels.len()
            )));
        }
        for (i, &ch) in self.channels.iter().enumerate() {
            if ch == 0 || ch as usize > MAX_CHANNELS {
                return Err(PicoError::ArgumentOutOfRange(format!(
                    "channel {} is outside 1..={}",
                    ch, MAX_CHANNELS
                )));
            }
            if self.channels[..i].contains(&ch) {
                return Err(PicoError::ArgumentOutOfRange(format!(
                    "channel {} listed twice",
                    ch
                )));
            }
        }
        if self.points == 0 {
            return Err(PicoError::ArgumentOutOfRange(
                "points per channel must be positive".into(),
            ));
        }
        if self.record_us == 0 {
            return Err(PicoError::ArgumentOutOfRange(
                "record time must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Parameters after the host-side limits were applied, ready for `pl1000SetInterval`.
#[derive(Clone, Debug, PartialEq)]
pub struct TimingPlan {
    pub points: u32,
    pub record_us: u32,
    pub warnings: Vec<Warning>,
}

/// Minimum sampling interval in µs for a block of `total_points` samples.
pub fn floor_interval_us(total_points: u32) -> u32 {
    if total_points <= SMALL_CAPTURE_THRESHOLD {
        FAST_FLOOR_US
    } else {
        SLOW_FLOOR_US
    }
}

/// Apply the capture size limit, then the sampling floor.
///
/// Points are clamped first; the floor is chosen from the clamped total, and only then is
/// the record time raised to meet it.
pub fn plan(request: &TimingRequest) -> Result<TimingPlan, PicoError> {
    request.validate()?;
    let n_channels = request.channels.len() as u32;
    let mut warnings = Vec::new();

    let mut points = request.points;
    if n_channels as u64 * points as u64 > MAX_CAPTURE_SIZE as u64 {
        points = MAX_CAPTURE_SIZE / n_channels;
        warnings.push(Warning::TimingCorrected {
            field: "points per channel",
            requested: request.points as u64,
            actual: points as u64,
        });
    }

    let total_points = n_channels * points;
    let floor = floor_interval_us(total_points);
    let mut record_us = request.record_us;
    if (record_us as u64) < total_points as u64 * floor as u64 {
        record_us = total_points * floor;
        warnings.push(Warning::TimingCorrected {
            field: "record time us",
            requested: request.record_us as u64,
            actual: record_us as u64,
        });
    }

    Ok(TimingPlan {
        points,
        record_us,
        warnings,
    })
}

/// Timing the unit actually accepted.
#[derive(Clone, Debug, PartialEq)]
pub struct Timing {
    pub channels: Vec<u16>,
    pub points: u32,
    pub record_us: u32,
    /// Per-channel sampling interval in ms.
    pub sampling_ms: f64,
}

impl Timing {
    pub fn new(channels: Vec<u16>, points: u32, record_us: u32) -> Self {
        let sampling_ms = sampling_ms(record_us, points);
        Self {
            channels,
            points,
            record_us,
            sampling_ms,
        }
    }

    pub fn matches(&self, request: &TimingRequest) -> bool {
        self.points == request.points && self.record_us == request.record_us
    }
}

pub fn sampling_ms(record_us: u32, points: u32) -> f64 {
    0.001 * record_us as f64 / points as f64
}

/// Sample times in ms for every channel.
///
/// Channels are converted one after another inside each tick, so channel `i` lags the
/// first one by `i / n_channels` of a sampling interval.
pub fn time_offsets(n_channels: usize, points: usize, sampling_ms: f64) -> Array2<f32> {
    let base = Array1::from_shape_fn(points, |j| (j as f64 * sampling_ms) as f32);
    let mut times = Array2::<f32>::zeros((n_channels, points));
    for (i, mut row) in times.axis_iter_mut(Axis(0)).enumerate() {
        let skew = (i as f64 * sampling_ms / n_channels as f64) as f32;
        row.assign(&(&base + skew));
    }
    times
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_request_is_untouched() {
        let req = TimingRequest::new(vec![1], 1000, 1_000_000);
        let plan = plan(&req).unwrap();
        assert_eq!(plan.points, 1000);
        assert_eq!(plan.record_us, 1_000_000);
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn slow_floor_raises_record_time() {
        // 40000 samples at 5 us each is below the 10 us floor
        let req = TimingRequest::new(vec![1, 2, 3, 4], 10000, 200_000);
        let plan = plan(&req).unwrap();
        assert_eq!(plan.points, 10000);
        assert_eq!(plan.record_us, 400_000);
        assert_eq!(plan.warnings.len(), 1);
        assert!((sampling_ms(plan.record_us, plan.points) - 0.04).abs() < 1e-12);
    }

    #[test]
    fn fast_floor_applies_to_small_captures() {
        let req = TimingRequest::new(vec![1, 2], 4048, 100);
        let plan = plan(&req).unwrap();
        assert_eq!(plan.record_us, 8096);

        let req = TimingRequest::new(vec![1, 2], 4049, 100);
        let plan = super::plan(&req).unwrap();
        assert_eq!(plan.record_us, 80980);
    }

    #[test]
    fn oversized_capture_clamps_points() {
        let req = TimingRequest::new(vec![1, 2, 3], 500_000, 100_000_000);
        let plan = plan(&req).unwrap();
        assert_eq!(plan.points, MAX_CAPTURE_SIZE / 3);
        assert_eq!(plan.record_us, 100_000_000);
        assert_eq!(plan.warnings.len(), 1);
    }

    #[test]
    fn clamp_then_floor() {
        let req = TimingRequest::new(vec![1, 2, 3, 4], 300_000, 1000);
        let plan = plan(&req).unwrap();
        assert_eq!(plan.points, 250_000);
        assert_eq!(plan.record_us, 10_000_000);
        assert_eq!(plan.warnings.len(), 2);
    }

    #[test]
    fn bad_requests_are_rejected() {
        for req in [
            TimingRequest::new(vec![], 10, 10),
            TimingRequest::new(vec![0], 10, 10),
            TimingRequest::new(vec![17], 10, 10),
            TimingRequest::new(vec![1, 1], 10, 10),
            TimingRequest::new(vec![1], 0, 10),
            TimingRequest::new(vec![1], 10, 0),
            TimingRequest::new((1..=17).collect(), 10, 10),
        ] {
            assert!(matches!(
                plan(&req),
                Err(PicoError::ArgumentOutOfRange(_))
            ));
        }
    }

    #[test]
    fn time_table_skews_channels() {
        let dt = 0.04;
        let times = time_offsets(4, 100, dt);
        assert_eq!(times.dim(), (4, 100));
        for i in 0..4 {
            for j in [0usize, 1, 57, 99] {
                let expected = j as f64 * dt + i as f64 * dt / 4.0;
                assert!((times[[i, j]] as f64 - expected).abs() < 1e-4);
            }
        }
    }
}
