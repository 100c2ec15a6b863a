/// cpal output: one decoder thread per deck feeding a lock-free ring, mixed
/// in the device callback.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::analyser::Waveform;
use super::backend::{AudioBackend, ClockMode, DeckEvent};
use super::crossfader::{Crossfader, FadeUpdate, GainLaw};
use super::decoder::{AudioDecoder, DecodeStatus};
use super::deck::DeckId;
use super::effects::{EffectChain, EffectParams};
use super::events::Message;
use super::resample::StreamResampler;
use super::ring_buffer::RingBuffer;
use crate::error::{EngineError, EngineResult};
use crate::playlist::SourceHandle;

/// Per-deck ring size in samples. About 1.4 s of stereo at 48 kHz.
const RING_BUFFER_SIZE: usize = 131072;

/// Frames mixed per inner block of the callback.
const MIX_BLOCK_FRAMES: usize = 1024;

/// Samples the decoder keeps queued before it backs off.
const DECODE_AHEAD_SAMPLES: usize = RING_BUFFER_SIZE / 2;

const NO_SEEK: u64 = u64::MAX;

// ─── Shared deck state ───

struct DeckShared {
    ring: RingBuffer,
    /// Mixer reads this deck only while set.
    playing: AtomicBool,
    /// Frames handed to the mixer, at the output rate.
    position_frames: AtomicU64,
    /// Seek target in seconds (f64 bits), or NO_SEEK.
    seek_request: AtomicU64,
    generation: AtomicU64,
    /// Bumped by every start; the worker confirms each one.
    start_seq: AtomicU64,
}

impl DeckShared {
    fn new() -> Self {
        Self {
            ring: RingBuffer::new(RING_BUFFER_SIZE),
            playing: AtomicBool::new(false),
            position_frames: AtomicU64::new(0),
            seek_request: AtomicU64::new(NO_SEEK),
            generation: AtomicU64::new(0),
            start_seq: AtomicU64::new(0),
        }
    }

    fn start(&self, generation: u64) {
        self.generation.store(generation, Ordering::SeqCst);
        self.playing.store(true, Ordering::SeqCst);
        self.start_seq.fetch_add(1, Ordering::SeqCst);
    }

    fn request_seek(&self, seconds: f64, sample_rate: u32) {
        let secs = seconds.max(0.0);
        self.position_frames
            .store((secs * sample_rate as f64) as u64, Ordering::SeqCst);
        self.seek_request.store(secs.to_bits(), Ordering::SeqCst);
    }
}

struct DeckWorker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl DeckWorker {
    fn stop(self, deck: DeckId) {
        self.running.store(false, Ordering::SeqCst);
        if self.handle.join().is_err() {
            log::error!("Decoder thread for deck {:?} panicked", deck);
        }
    }
}

/// Latest crossfader state for the callback. Each field holds only the
/// newest value, so nothing queues up while the stream is suspended.
#[derive(Default)]
struct MixerControl {
    fade: Option<FadeUpdate>,
    law: Option<GainLaw>,
}

#[derive(Clone, Default)]
struct MixerHandle(Arc<Mutex<MixerControl>>);

impl MixerHandle {
    fn set_fade(&self, update: FadeUpdate) {
        self.0.lock().fade = Some(update);
    }

    fn set_law(&self, law: GainLaw) {
        self.0.lock().law = Some(law);
    }
}

// ─── Backend ───

pub struct CpalBackend {
    stream: cpal::Stream,
    sample_rate: u32,
    frames_rendered: Arc<AtomicU64>,
    decks: [Arc<DeckShared>; 2],
    workers: [Option<DeckWorker>; 2],
    mixer: MixerHandle,
    events: Sender<Message>,
    clock: ClockMode,
}

impl CpalBackend {
    /// Open the default output device. The stream is built paused; it starts
    /// on the first `resume`.
    pub fn open(
        events: Sender<Message>,
        params: Arc<EffectParams>,
        waveform: Arc<Waveform>,
    ) -> EngineResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(EngineError::NoOutputDevice)?;
        let supported = device
            .default_output_config()
            .map_err(|e| EngineError::Stream(format!("No usable output config: {}", e)))?;
        let config = supported.config();
        let sample_rate = config.sample_rate.0;
        let channels = config.channels;
        log::info!(
            "Output: {} @ {}Hz, {} channels",
            device.name().unwrap_or_else(|_| "unknown".into()),
            sample_rate,
            channels
        );

        let decks = [Arc::new(DeckShared::new()), Arc::new(DeckShared::new())];
        let frames_rendered = Arc::new(AtomicU64::new(0));
        let control = MixerHandle::default();

        let mut mixer = Mixer::new(
            decks.clone(),
            frames_rendered.clone(),
            control.clone(),
            sample_rate,
            channels as usize,
            EffectChain::new(sample_rate, params, waveform),
        );

        // ── AUDIO CALLBACK ──
        // No blocking and no allocation: atomics, the ring buffers and a
        // try_lock on the control slot.
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| mixer.render(data),
                move |err| {
                    log::error!("Stream error: {}", err);
                },
                None,
            )
            .map_err(|e| EngineError::Stream(format!("Failed to build output stream: {}", e)))?;
        // Some hosts start streams on creation.
        if let Err(e) = stream.pause() {
            log::debug!("Initial stream pause: {}", e);
        }

        Ok(Self {
            stream,
            sample_rate,
            frames_rendered,
            decks,
            workers: [None, None],
            mixer: control,
            events,
            clock: ClockMode::Suspended,
        })
    }

    fn stop_worker(&mut self, deck: DeckId) {
        if let Some(worker) = self.workers[deck.index()].take() {
            worker.stop(deck);
        }
    }
}

impl AudioBackend for CpalBackend {
    fn resume(&mut self) -> EngineResult<()> {
        self.stream
            .play()
            .map_err(|e| EngineError::HardwareUnlockDenied(e.to_string()))?;
        self.clock = ClockMode::Running;
        Ok(())
    }

    fn set_clock_mode(&mut self, mode: ClockMode) {
        if mode == self.clock {
            return;
        }
        let result = match mode {
            // Paused decks render silence, which keeps the device open.
            ClockMode::Running | ClockMode::KeepAlive => {
                self.stream.play().map_err(|e| e.to_string())
            }
            ClockMode::Suspended => self.stream.pause().map_err(|e| e.to_string()),
        };
        match result {
            Ok(()) => self.clock = mode,
            Err(e) => log::warn!("Failed to switch clock to {:?}: {}", mode, e),
        }
    }

    fn now(&self) -> f64 {
        self.frames_rendered.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn load(&mut self, deck: DeckId, source: &SourceHandle) -> EngineResult<Option<f64>> {
        // Open first: a bad file leaves the deck as it was.
        let decoder = AudioDecoder::open(source.path())?;
        let resampler = StreamResampler::new(decoder.sample_rate(), self.sample_rate)?;
        let duration = decoder.duration_secs;

        self.stop_worker(deck);
        let shared = self.decks[deck.index()].clone();
        shared.playing.store(false, Ordering::SeqCst);
        shared.ring.request_flush();
        shared.position_frames.store(0, Ordering::SeqCst);
        shared.seek_request.store(NO_SEEK, Ordering::SeqCst);

        let worker = DecodeWorker::spawn(
            deck,
            decoder,
            resampler,
            shared,
            self.events.clone(),
            self.sample_rate,
        )?;
        self.workers[deck.index()] = Some(worker);

        log::debug!("Deck {:?} bound to {}", deck, source.display());
        Ok(duration)
    }

    fn start_deck(&mut self, deck: DeckId, generation: u64) -> EngineResult<()> {
        if self.workers[deck.index()].is_none() {
            return Err(EngineError::Stream(format!(
                "Deck {:?} has no source bound",
                deck
            )));
        }
        self.decks[deck.index()].start(generation);
        Ok(())
    }

    fn pause_deck(&mut self, deck: DeckId) {
        self.decks[deck.index()].playing.store(false, Ordering::SeqCst);
    }

    fn seek_deck(&mut self, deck: DeckId, seconds: f64) {
        self.decks[deck.index()].request_seek(seconds, self.sample_rate);
    }

    fn deck_position(&self, deck: DeckId) -> f64 {
        self.decks[deck.index()].position_frames.load(Ordering::Relaxed) as f64
            / self.sample_rate as f64
    }

    fn set_fade(&mut self, update: FadeUpdate) {
        self.mixer.set_fade(update);
    }

    fn set_gain_law(&mut self, law: GainLaw) {
        self.mixer.set_law(law);
    }

    fn teardown(&mut self) {
        for deck in [DeckId::A, DeckId::B] {
            self.pause_deck(deck);
            self.stop_worker(deck);
        }
        if let Err(e) = self.stream.pause() {
            log::warn!("Failed to pause stream: {}", e);
        }
        self.clock = ClockMode::Suspended;
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        for deck in [DeckId::A, DeckId::B] {
            self.stop_worker(deck);
        }
    }
}

// ─── Decoder thread ───

struct DecodeWorker {
    deck: DeckId,
    decoder: AudioDecoder,
    resampler: StreamResampler,
    shared: Arc<DeckShared>,
    running: Arc<AtomicBool>,
    events: Sender<Message>,
    output_rate: u32,
    /// Last start the worker has answered with `Started`.
    confirmed_seq: u64,
}

impl DecodeWorker {
    fn spawn(
        deck: DeckId,
        decoder: AudioDecoder,
        resampler: StreamResampler,
        shared: Arc<DeckShared>,
        events: Sender<Message>,
        output_rate: u32,
    ) -> EngineResult<DeckWorker> {
        // Sampled before the thread exists: any start issued after `load`
        // returns is one this worker must confirm.
        let confirmed_seq = shared.start_seq.load(Ordering::SeqCst);
        let running = Arc::new(AtomicBool::new(true));
        let worker = DecodeWorker {
            deck,
            decoder,
            resampler,
            shared,
            running: running.clone(),
            events,
            output_rate,
            confirmed_seq,
        };
        let handle = thread::Builder::new()
            .name(format!("decoder-{:?}", deck))
            .spawn(move || worker.run())
            .map_err(|e| EngineError::Stream(format!("Failed to spawn decoder thread: {}", e)))?;
        Ok(DeckWorker { running, handle })
    }

    fn run(mut self) {
        let mut at_end = false;
        let mut end_reported = false;
        let mut failed = false;

        while self.running.load(Ordering::SeqCst) {
            let seek = self.shared.seek_request.swap(NO_SEEK, Ordering::SeqCst);
            if seek != NO_SEEK {
                let secs = f64::from_bits(seek);
                self.shared.ring.request_flush();
                self.resampler.reset();
                if let Err(e) = self.decoder.seek(secs) {
                    log::error!("Seek failed: {}", e);
                }
                at_end = false;
                end_reported = false;
                continue;
            }

            // Confirm a start once there is something to hear.
            let seq = self.shared.start_seq.load(Ordering::SeqCst);
            if seq != self.confirmed_seq && (self.shared.ring.available_read() > 0 || at_end) {
                self.confirmed_seq = seq;
                self.post(DeckEvent::Started {
                    deck: self.deck,
                    generation: self.shared.generation.load(Ordering::SeqCst),
                });
            }

            if failed {
                thread::sleep(Duration::from_millis(10));
                continue;
            }

            if at_end {
                if !end_reported
                    && self.shared.playing.load(Ordering::Relaxed)
                    && self.shared.ring.available_read() == 0
                {
                    end_reported = true;
                    self.post(DeckEvent::Ended {
                        deck: self.deck,
                        generation: self.shared.generation.load(Ordering::SeqCst),
                    });
                }
                thread::sleep(Duration::from_millis(10));
                continue;
            }

            // Backpressure
            if self.shared.ring.available_read() > DECODE_AHEAD_SAMPLES {
                thread::sleep(Duration::from_millis(5));
                continue;
            }

            match self.decoder.next_samples() {
                Ok(samples) => match self.resampler.process(&samples) {
                    Ok(out) => self.push(&out),
                    Err(e) => {
                        failed = true;
                        self.fail(e.to_string());
                    }
                },
                Err(DecodeStatus::EndOfStream) => {
                    match self.resampler.flush() {
                        Ok(tail) => self.push(&tail),
                        Err(e) => log::warn!("{}", e),
                    }
                    at_end = true;
                }
                Err(DecodeStatus::Error(e)) => {
                    log::error!("Decode error on deck {:?}: {}", self.deck, e);
                    failed = true;
                    self.fail(e);
                }
            }
        }
        log::debug!("Decoder for deck {:?} exiting ({}Hz out)", self.deck, self.output_rate);
    }

    /// Write everything, waiting for room. Gives up on stop or seek.
    fn push(&self, mut samples: &[f32]) {
        while !samples.is_empty() && self.running.load(Ordering::Relaxed) {
            if self.shared.seek_request.load(Ordering::Relaxed) != NO_SEEK {
                return;
            }
            let written = self.shared.ring.write(samples);
            samples = &samples[written..];
            if !samples.is_empty() {
                thread::sleep(Duration::from_millis(5));
            }
        }
    }

    fn fail(&self, reason: String) {
        self.post(DeckEvent::Failed {
            deck: self.deck,
            generation: self.shared.generation.load(Ordering::SeqCst),
            reason,
        });
    }

    fn post(&self, event: DeckEvent) {
        // Bounded wait so a stalled engine cannot wedge teardown.
        if self
            .events
            .send_timeout(Message::Deck(event), Duration::from_millis(250))
            .is_err()
        {
            log::warn!("Engine not draining events for deck {:?}", self.deck);
        }
    }
}

// ─── Mixer (runs inside the audio callback) ───

struct Mixer {
    decks: [Arc<DeckShared>; 2],
    clock: Arc<AtomicU64>,
    control: MixerHandle,
    crossfader: Crossfader,
    chain: EffectChain,
    sample_rate: f64,
    out_channels: usize,
    deck_bufs: [Vec<f32>; 2],
    mix_buf: Vec<f32>,
}

impl Mixer {
    fn new(
        decks: [Arc<DeckShared>; 2],
        clock: Arc<AtomicU64>,
        control: MixerHandle,
        sample_rate: u32,
        out_channels: usize,
        chain: EffectChain,
    ) -> Self {
        Self {
            decks,
            clock,
            control,
            crossfader: Crossfader::default(),
            chain,
            sample_rate: sample_rate as f64,
            out_channels,
            deck_bufs: [vec![0.0; MIX_BLOCK_FRAMES * 2], vec![0.0; MIX_BLOCK_FRAMES * 2]],
            mix_buf: vec![0.0; MIX_BLOCK_FRAMES * 2],
        }
    }

    fn render(&mut self, data: &mut [f32]) {
        // Contended: pick the update up on the next callback.
        if let Some(mut control) = self.control.0.try_lock() {
            if let Some(law) = control.law.take() {
                self.crossfader.set_law(law);
            }
            if let Some(fade) = control.fade.take() {
                self.crossfader.apply(fade);
            }
        }

        let out_ch = self.out_channels.max(1);
        let frames = data.len() / out_ch;
        let mut done = 0;

        while done < frames {
            let n = (frames - done).min(MIX_BLOCK_FRAMES);
            let start = self.clock.load(Ordering::Relaxed);

            for (deck, buf) in self.decks.iter().zip(self.deck_bufs.iter_mut()) {
                let buf = &mut buf[..n * 2];
                let read = if deck.playing.load(Ordering::Relaxed) {
                    deck.ring.read(buf)
                } else {
                    0
                };
                deck.position_frames
                    .fetch_add((read / 2) as u64, Ordering::Relaxed);
                // Underrun or paused: silence.
                buf[read..].fill(0.0);
            }

            let mix = &mut self.mix_buf[..n * 2];
            for f in 0..n {
                let now = (start + f as u64) as f64 / self.sample_rate;
                let (ga, gb) = self.crossfader.gains(now);
                for c in 0..2 {
                    let i = f * 2 + c;
                    mix[i] = self.deck_bufs[0][i] * ga + self.deck_bufs[1][i] * gb;
                }
            }

            self.chain.process(mix);
            self.clock.fetch_add(n as u64, Ordering::Release);

            let out = &mut data[done * out_ch..(done + n) * out_ch];
            for (frame, src) in out.chunks_exact_mut(out_ch).zip(mix.chunks_exact(2)) {
                if out_ch == 1 {
                    frame[0] = (src[0] + src[1]) * 0.5;
                } else {
                    frame[0] = src[0];
                    frame[1] = src[1];
                    frame[2..].fill(0.0);
                }
            }
            done += n;
        }

        // Trailing partial frame, if the host ever hands one over.
        data[frames * out_ch..].fill(0.0);
    }
}
