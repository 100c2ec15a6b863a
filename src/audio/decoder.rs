use std::fs::File;
use std::path::Path;
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

use crate::error::{EngineError, EngineResult};

/// Decodes one source file into interleaved stereo f32.
pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    sample_buf: Option<SampleBuffer<f32>>,
    pub spec: SignalSpec,
    pub duration_secs: Option<f64>,
}

impl AudioDecoder {
    pub fn open(path: &Path) -> EngineResult<Self> {
        let display = path.to_string_lossy();
        let file = File::open(path).map_err(|e| EngineError::source_load(display.as_ref(), e))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let fmt_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &fmt_opts, &MetadataOptions::default())
            .map_err(|e| EngineError::source_load(display.as_ref(), format!("probe failed: {}", e)))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| EngineError::source_load(display.as_ref(), "no audio tracks found"))?;

        let track_id = track.id;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| EngineError::source_load(display.as_ref(), format!("unsupported codec: {}", e)))?;

        let rate = track.codec_params.sample_rate.unwrap_or(44100);
        let spec = SignalSpec::new(
            rate,
            track.codec_params.channels.unwrap_or(
                symphonia::core::audio::Channels::FRONT_LEFT
                    | symphonia::core::audio::Channels::FRONT_RIGHT,
            ),
        );

        let duration_secs = track
            .codec_params
            .n_frames
            .map(|n_frames| n_frames as f64 / rate as f64);

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_buf: None,
            spec,
            duration_secs,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.spec.rate
    }

    /// Decode the next packet as interleaved stereo. Mono is duplicated,
    /// extra channels beyond the front pair are folded into it.
    pub fn next_samples(&mut self) -> Result<Vec<f32>, DecodeStatus> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Err(DecodeStatus::EndOfStream);
                }
                Err(e) => return Err(DecodeStatus::Error(format!("{}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::debug!("Skipping corrupt packet: {}", e);
                    continue;
                }
                Err(e) => return Err(DecodeStatus::Error(format!("{}", e))),
            };

            let spec = *decoded.spec();
            let needed = decoded.capacity() * spec.channels.count();
            if self.sample_buf.as_ref().map_or(true, |b| b.capacity() < needed) {
                self.sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = self.sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            return Ok(to_stereo(buf.samples(), spec.channels.count()));
        }
    }

    /// Seek to a position in seconds.
    pub fn seek(&mut self, position_secs: f64) -> EngineResult<()> {
        let seek_to = SeekTo::Time {
            time: Time::from(position_secs.max(0.0)),
            track_id: Some(self.track_id),
        };
        self.format
            .seek(SeekMode::Accurate, seek_to)
            .map_err(|e| EngineError::Stream(format!("Seek failed: {}", e)))?;
        self.decoder.reset();
        Ok(())
    }
}

/// Interleaved `channels`-wide samples to interleaved stereo.
pub fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        2 => samples.to_vec(),
        0 => Vec::new(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        n => {
            let mut out = Vec::with_capacity(samples.len() / n * 2);
            let extra_gain = 1.0 / (n - 1) as f32;
            for frame in samples.chunks_exact(n) {
                let rest: f32 = frame[2..].iter().sum::<f32>() * extra_gain;
                out.push(frame[0] + rest * 0.5);
                out.push(frame[1] + rest * 0.5);
            }
            out
        }
    }
}

#[derive(Debug)]
pub enum DecodeStatus {
    EndOfStream,
    Error(String),
}
