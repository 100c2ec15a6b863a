use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::analyser::{Waveform, DEFAULT_WAVEFORM_SIZE};
use super::backend::AudioBackend;
use super::effects::{EffectParams, EffectSettings};
use super::equalizer::EqPreset;
use super::events::{EventBridge, Message};
use super::output::CpalBackend;
use super::resources::{MediaSession, NoWakeLock, ResourceGuard, WakeLock};
use super::transport::{TransportController, TransportSettings, TransportSnapshot};
use crate::commands::PlayerCommand;
use crate::error::{EngineError, EngineResult};

/// Engine loop wake-up interval when idle. Fade deadlines and position
/// publication run at this rate.
pub const DEFAULT_TICK_MS: u64 = 16;

const MESSAGE_QUEUE_DEPTH: usize = 256;

// ─── Options ───

#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub transport: TransportSettings,
    pub preset: EqPreset,
    pub compressor: bool,
    pub wide: bool,
    pub waveform_size: usize,
    pub tick: Duration,
    /// Fixed shuffle seed; random when `None`.
    pub seed: Option<u64>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            transport: TransportSettings::default(),
            preset: EqPreset::Flat,
            compressor: false,
            wide: false,
            waveform_size: DEFAULT_WAVEFORM_SIZE,
            tick: Duration::from_millis(DEFAULT_TICK_MS),
            seed: None,
        }
    }
}

/// Host facilities handed to the engine thread.
pub struct HostServices {
    pub wake_lock: Box<dyn WakeLock>,
    pub session: Box<dyn MediaSession>,
}

impl HostServices {
    /// For hosts without a wake-lock facility.
    pub fn without_wake_lock(session: Box<dyn MediaSession>) -> Self {
        Self {
            wake_lock: Box::new(NoWakeLock),
            session,
        }
    }
}

// ─── Audio Engine ───

/// Handle to the engine thread. The thread owns the transport controller
/// and its backend; everything else talks to it through messages.
pub struct AudioEngine {
    tx: Sender<Message>,
    snapshot: Arc<Mutex<Option<TransportSnapshot>>>,
    waveform: Arc<Waveform>,
    handle: Option<JoinHandle<()>>,
}

impl AudioEngine {
    /// Start on the default cpal output device.
    pub fn start(options: EngineOptions, services: HostServices) -> EngineResult<Self> {
        Self::spawn(options, services, |tx, params, waveform| {
            CpalBackend::open(tx, params, waveform)
        })
    }

    /// Start with a custom backend. `factory` runs on the engine thread, so
    /// the backend does not need to be `Send`.
    pub fn spawn<B, F>(options: EngineOptions, services: HostServices, factory: F) -> EngineResult<Self>
    where
        B: AudioBackend + 'static,
        F: FnOnce(Sender<Message>, Arc<EffectParams>, Arc<Waveform>) -> EngineResult<B> + Send + 'static,
    {
        let (tx, rx) = bounded::<Message>(MESSAGE_QUEUE_DEPTH);
        let (ready_tx, ready_rx) = bounded::<EngineResult<()>>(1);
        let snapshot = Arc::new(Mutex::new(None));
        let waveform = Arc::new(Waveform::new(options.waveform_size));

        let tx_c = tx.clone();
        let snap_c = snapshot.clone();
        let wave_c = waveform.clone();

        let handle = thread::Builder::new()
            .name("audio-engine".into())
            .spawn(move || {
                let params = Arc::new(EffectParams::new());
                let backend = match factory(tx_c.clone(), params.clone(), wave_c) {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let ctl = build_controller(backend, params, services, &options);
                let _ = ready_tx.send(Ok(()));
                engine_thread(ctl, tx_c, rx, snap_c, options.tick);
            })
            .map_err(|e| EngineError::Stream(format!("Failed to spawn audio thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(EngineError::Disconnected);
            }
        }

        Ok(Self {
            tx,
            snapshot,
            waveform,
            handle: Some(handle),
        })
    }

    pub fn send_command(&self, cmd: PlayerCommand) -> EngineResult<()> {
        self.tx
            .send(Message::Command(cmd))
            .map_err(|_| EngineError::Disconnected)
    }

    /// Latest transport snapshot; `None` until the engine published one.
    pub fn state(&self) -> Option<TransportSnapshot> {
        self.snapshot.lock().clone()
    }

    /// Oldest-first copy of the analyser window.
    pub fn waveform(&self) -> Vec<f32> {
        self.waveform.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the engine thread and wait for it. Safe to call twice.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.tx.send(Message::Command(PlayerCommand::Shutdown));
            if handle.join().is_err() {
                log::error!("Audio engine thread panicked");
            }
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn build_controller<B: AudioBackend>(
    backend: B,
    params: Arc<EffectParams>,
    services: HostServices,
    options: &EngineOptions,
) -> TransportController<B> {
    let mut effects = EffectSettings::new(params);
    effects.apply_preset(options.preset);
    effects.set_compressor(options.compressor);
    effects.set_wide(options.wide);

    let resources = ResourceGuard::new(services.wake_lock, services.session);
    let ctl = TransportController::new(backend, resources, effects, options.transport);
    match options.seed {
        Some(seed) => ctl.with_seed(seed),
        None => ctl,
    }
}

// ─── Engine Thread ───

fn engine_thread<B: AudioBackend>(
    mut ctl: TransportController<B>,
    tx: Sender<Message>,
    rx: Receiver<Message>,
    snapshot: Arc<Mutex<Option<TransportSnapshot>>>,
    tick: Duration,
) {
    if let Err(e) = ctl.init() {
        log::error!("Transport init failed: {}", e);
    }

    let mut bridge = EventBridge::new();
    let id = ctl.id();
    if let Err(e) = bridge.bind(ctl.resources_mut().session_mut(), id, &tx) {
        log::warn!("Remote controls unavailable: {}", e);
    }
    drop(tx);

    *snapshot.lock() = Some(ctl.snapshot());
    let mut last_tick = Instant::now();

    loop {
        match rx.recv_timeout(tick) {
            Ok(message) => {
                if !bridge.dispatch(&mut ctl, message) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        // Messages can arrive faster than the tick; deadlines still run.
        if last_tick.elapsed() >= tick {
            last_tick = Instant::now();
            ctl.tick();
        }
        *snapshot.lock() = Some(ctl.snapshot());
    }

    ctl.teardown();
    *snapshot.lock() = Some(ctl.snapshot());
    log::info!("Audio engine stopped");
}
