/// Streaming stereo resampler, source rate to device rate.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::error::{EngineError, EngineResult};

const CHUNK_FRAMES: usize = 1024;

pub struct StreamResampler {
    inner: Option<FastFixedIn<f32>>,
    pending: [Vec<f32>; 2],
}

impl StreamResampler {
    /// Pass-through when the two rates match.
    pub fn new(input_rate: u32, output_rate: u32) -> EngineResult<Self> {
        let inner = if input_rate == output_rate || input_rate == 0 {
            None
        } else {
            log::debug!("Resampling {}Hz -> {}Hz", input_rate, output_rate);
            let r = FastFixedIn::<f32>::new(
                output_rate as f64 / input_rate as f64,
                1.0,
                PolynomialDegree::Septic,
                CHUNK_FRAMES,
                2,
            )
            .map_err(|e| EngineError::Stream(format!("Failed to create resampler: {}", e)))?;
            Some(r)
        };
        Ok(Self {
            inner,
            pending: [Vec::new(), Vec::new()],
        })
    }

    pub fn is_passthrough(&self) -> bool {
        self.inner.is_none()
    }

    /// Feed interleaved stereo; returns whatever output is ready.
    pub fn process(&mut self, interleaved: &[f32]) -> EngineResult<Vec<f32>> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(interleaved.to_vec());
        };
        for frame in interleaved.chunks_exact(2) {
            self.pending[0].push(frame[0]);
            self.pending[1].push(frame[1]);
        }

        let mut out = Vec::new();
        while self.pending[0].len() >= resampler.input_frames_next() {
            let n = resampler.input_frames_next();
            let chunk = [&self.pending[0][..n], &self.pending[1][..n]];
            let planar = resampler
                .process(&chunk[..], None)
                .map_err(|e| EngineError::Stream(format!("Resampling failed: {}", e)))?;
            interleave_into(&planar, &mut out);
            self.pending[0].drain(..n);
            self.pending[1].drain(..n);
        }
        Ok(out)
    }

    /// Push out the tail at end of stream.
    pub fn flush(&mut self) -> EngineResult<Vec<f32>> {
        let Some(resampler) = self.inner.as_mut() else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        if !self.pending[0].is_empty() {
            let chunk = [&self.pending[0][..], &self.pending[1][..]];
            let planar = resampler
                .process_partial(Some(&chunk[..]), None)
                .map_err(|e| EngineError::Stream(format!("Resampling failed: {}", e)))?;
            interleave_into(&planar, &mut out);
        }
        self.reset();
        Ok(out)
    }

    /// Drop buffered input (after a seek).
    pub fn reset(&mut self) {
        self.pending[0].clear();
        self.pending[1].clear();
        if let Some(r) = self.inner.as_mut() {
            r.reset();
        }
    }
}

fn interleave_into(planar: &[Vec<f32>], out: &mut Vec<f32>) {
    if planar.len() < 2 {
        return;
    }
    out.reserve(planar[0].len() * 2);
    for (l, r) in planar[0].iter().zip(planar[1].iter()) {
        out.push(*l);
        out.push(*r);
    }
}
