use crate::timing::{time_offsets, Timing};
use ndarray::{s, Array2, ArrayView1, ArrayView2, ShapeBuilder};

/// Samples and sample times of one acquisition block.
///
/// `data` holds raw ADC counts and `times` the matching offsets in ms, both shaped
/// (channels, points). A fresh buffer is made for every applied timing; reads refill it.
#[derive(Debug, Clone)]
pub struct CaptureBuffer {
    pub channels: Vec<u16>,
    pub data: Array2<u16>,
    pub times: Array2<f32>,
    /// Samples per channel filled by the last read.
    pub valid_points: usize,
    // interleaved scratch buffer handed to the driver
    raw: Vec<u16>,
}

impl CaptureBuffer {
    pub fn new(timing: &Timing) -> Self {
        let n_channels = timing.channels.len();
        let points = timing.points as usize;
        Self {
            channels: timing.channels.clone(),
            data: Array2::<u16>::zeros((n_channels, points)),
            times: time_offsets(n_channels, points, timing.sampling_ms),
            valid_points: 0,
            raw: vec![0u16; n_channels * points],
        }
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn points(&self) -> usize {
        self.data.ncols()
    }

    /// Scratch buffer laid out as the driver writes it, one sample of every channel per tick.
    pub fn raw_mut(&mut self) -> &mut [u16] {
        &mut self.raw
    }

    /// Copy the interleaved scratch buffer into `data` after a read of `delivered` ticks.
    pub fn deinterleave(&mut self, delivered: usize) {
        let n_channels = self.n_channels();
        let delivered = delivered.min(self.points());
        // column-major view: element (c, j) sits at c + j * n_channels
        let view = ArrayView2::from_shape(
            (n_channels, self.points()).f(),
            &self.raw[..],
        );
        if let Ok(view) = view {
            self.data.assign(&view);
        }
        self.data.slice_mut(s![.., delivered..]).fill(0);
        self.valid_points = delivered;
    }

    fn row(&self, channel: u16) -> Option<usize> {
        self.channels.iter().position(|&c| c == channel)
    }

    pub fn channel_data(&self, channel: u16) -> Option<ArrayView1<'_, u16>> {
        self.row(channel).map(|i| self.data.row(i))
    }

    pub fn channel_times(&self, channel: u16) -> Option<ArrayView1<'_, f32>> {
        self.row(channel).map(|i| self.times.row(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deinterleaves_driver_layout() {
        let timing = Timing::new(vec![2, 5], 3, 3000);
        let mut buf = CaptureBuffer::new(&timing);
        buf.raw_mut()
            .copy_from_slice(&[10, 20, 11, 21, 12, 22]);
        buf.deinterleave(3);
        assert_eq!(buf.channel_data(2).unwrap().to_vec(), vec![10, 11, 12]);
        assert_eq!(buf.channel_data(5).unwrap().to_vec(), vec![20, 21, 22]);
        assert!(buf.channel_data(1).is_none());
        assert_eq!(buf.valid_points, 3);

        buf.raw_mut().copy_from_slice(&[30, 40, 0, 0, 0, 0]);
        buf.deinterleave(1);
        assert_eq!(buf.channel_data(2).unwrap().to_vec(), vec![30, 0, 0]);
        assert_eq!(buf.valid_points, 1);
    }

    #[test]
    fn shapes_follow_timing() {
        let timing = Timing::new(vec![1, 2, 3, 4], 10000, 400_000);
        let buf = CaptureBuffer::new(&timing);
        assert_eq!(buf.data.dim(), (4, 10000));
        assert_eq!(buf.times.dim(), (4, 10000));
        let t = buf.channel_times(2).unwrap();
        assert!((t[1] - 0.05).abs() < 1e-6);
    }
}
