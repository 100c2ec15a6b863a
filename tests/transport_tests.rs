mod common;

use common::{harness, harness_with, settings, track_path, Call, FakeBackend, RecordingSession};
use cyberplayer_lib::audio::backend::{AudioBackend, DeckEvent};
use cyberplayer_lib::audio::crossfader::FadeUpdate;
use cyberplayer_lib::audio::deck::DeckId;
use cyberplayer_lib::audio::navigation::RepeatMode;
use cyberplayer_lib::audio::transport::TransportPhase;
use cyberplayer_lib::error::EngineError;
use cyberplayer_lib::playlist::TrackDescriptor;

const EPS: f32 = 1e-4;

fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < EPS,
        "expected {expected}, got {actual}"
    );
}

fn assert_at_rest(h: &common::Harness) {
    let (a, b) = (h.ctl.deck_weight(DeckId::A), h.ctl.deck_weight(DeckId::B));
    assert!(!h.ctl.is_fading());
    assert!(
        (a == 1.0 && b == 0.0) || (a == 0.0 && b == 1.0),
        "weights {a} / {b}"
    );
}

// ─── Navigation ───

#[test]
fn linear_queue_advances_and_wraps() {
    let mut h = harness(settings(true, RepeatMode::All)).with_queue(&[100.0, 150.0, 80.0]);
    h.play();
    assert_eq!(h.ctl.phase(), TransportPhase::Playing);

    h.ctl.next(false).unwrap();
    h.pump();
    assert_eq!(h.index(), Some(1));

    h.finish_active();
    assert_eq!(h.index(), Some(2));

    h.finish_active();
    assert_eq!(h.index(), Some(0));
    assert_eq!(h.ctl.phase(), TransportPhase::Playing);
}

#[test]
fn repeat_one_restarts_the_same_track() {
    let mut h = harness(settings(true, RepeatMode::One)).with_queue(&[100.0, 150.0, 80.0]);
    h.ctl.load_track(1).unwrap();
    h.play();
    let generation = h.ctl.generation();
    let deck = h.ctl.active_deck();

    h.advance(20.0);
    assert_eq!(h.ctl.current_time(), 20.0);

    let mark = h.ctl.backend().calls.len();
    h.finish_active();

    assert_eq!(h.index(), Some(1));
    assert_eq!(h.ctl.current_time(), 0.0);
    assert_eq!(h.ctl.generation(), generation);
    assert_eq!(h.ctl.phase(), TransportPhase::Playing);
    let calls = h.ctl.backend().calls_since(mark);
    assert!(calls.contains(&Call::Seek(deck, 0.0)));
    assert!(calls.contains(&Call::Start(deck, generation)));
}

#[test]
fn prev_near_start_goes_to_previous_track() {
    let mut h = harness(settings(false, RepeatMode::All)).with_queue(&[100.0, 150.0, 80.0]);
    h.play();
    h.ctl.next(false).unwrap();
    h.pump();

    h.advance(1.5);
    h.ctl.prev().unwrap();
    assert_eq!(h.index(), Some(0));
}

#[test]
fn prev_after_three_seconds_restarts_track() {
    let mut h = harness(settings(false, RepeatMode::All)).with_queue(&[100.0, 150.0, 80.0]);
    h.play();
    h.ctl.next(false).unwrap();
    h.pump();
    let generation = h.ctl.generation();

    h.advance(10.0);
    h.ctl.prev().unwrap();

    assert_eq!(h.index(), Some(1));
    assert_eq!(h.ctl.current_time(), 0.0);
    assert_eq!(h.ctl.generation(), generation);
}

#[test]
fn prev_from_first_track_wraps_to_last() {
    let mut h = harness(settings(false, RepeatMode::Off)).with_queue(&[100.0, 150.0, 80.0]);
    h.play();
    h.ctl.prev().unwrap();
    assert_eq!(h.index(), Some(2));
}

#[test]
fn repeat_off_stops_after_last_track() {
    let mut h = harness(settings(false, RepeatMode::Off)).with_queue(&[100.0, 150.0]);
    h.play();
    h.ctl.next(false).unwrap();
    h.pump();

    h.finish_active();

    assert_eq!(h.ctl.phase(), TransportPhase::Idle);
    assert_eq!(h.index(), Some(1));
    assert_eq!(h.ctl.current_time(), 0.0);
    assert_at_rest(&h);
}

#[test]
fn manual_next_wraps_even_with_repeat_off() {
    let mut h = harness(settings(false, RepeatMode::Off)).with_queue(&[100.0, 150.0]);
    h.play();
    h.ctl.next(false).unwrap();
    h.ctl.next(false).unwrap();
    assert_eq!(h.index(), Some(0));
}

#[test]
fn shuffle_never_repeats_current_track() {
    let mut s = settings(false, RepeatMode::All);
    s.shuffle = true;
    let mut h = harness(s).with_queue(&[10.0, 20.0, 30.0, 40.0]);
    h.play();

    for _ in 0..50 {
        let before = h.index();
        h.ctl.next(false).unwrap();
        h.pump();
        assert_ne!(h.index(), before);
    }
}

#[test]
fn play_without_selection_does_nothing() {
    let mut h = harness(settings(true, RepeatMode::All));
    h.ctl.set_queue(common::tracks(&[100.0]), None).unwrap();
    h.ctl.play().unwrap();

    assert_eq!(h.ctl.phase(), TransportPhase::Idle);
    assert!(h.ctl.backend().calls.is_empty());
    assert_eq!(h.lock.acquired(), 0);
}

#[test]
fn load_out_of_range_is_rejected() {
    let mut h = harness(settings(true, RepeatMode::All)).with_queue(&[100.0]);
    let err = h.ctl.load_track(5).unwrap_err();
    assert_eq!(err, EngineError::InvalidIndex { index: 5, len: 1 });
    assert_eq!(h.index(), Some(0));
}

// ─── Seeking ───

#[test]
fn seek_is_clamped_to_track_bounds() {
    let mut h = harness(settings(false, RepeatMode::All)).with_queue(&[100.0]);
    h.play();

    h.ctl.seek_to(-5.0).unwrap();
    assert_eq!(h.ctl.current_time(), 0.0);

    h.ctl.seek_to(500.0).unwrap();
    assert_eq!(h.ctl.current_time(), 100.0);

    h.ctl.seek_to(f64::NAN).unwrap();
    assert_eq!(h.ctl.current_time(), 0.0);

    h.ctl.seek_to(50.0).unwrap();
    h.ctl.seek_relative(10.0).unwrap();
    assert_eq!(h.ctl.current_time(), 60.0);
    assert_eq!(h.ctl.backend().deck_position(DeckId::A), 60.0);
}

#[test]
fn seek_without_known_duration_has_no_upper_bound() {
    let mut h = harness(settings(false, RepeatMode::All));
    let track = TrackDescriptor::from_path(0, track_path(0));
    h.ctl.set_queue(vec![track], Some(0)).unwrap();
    h.ctl.load_track(0).unwrap();

    h.ctl.seek_to(5000.0).unwrap();
    assert_eq!(h.ctl.current_time(), 5000.0);
}

#[test]
fn decoded_duration_overrides_tag_duration() {
    let mut backend = FakeBackend::new();
    backend.durations.insert(track_path(0), 90.0);
    let mut h = harness_with(backend, RecordingSession::default(), settings(false, RepeatMode::All))
        .with_queue(&[100.0]);

    h.ctl.seek_to(95.0).unwrap();
    assert_eq!(h.ctl.current_time(), 90.0);
    assert_eq!(h.ctl.snapshot().duration_secs, Some(90.0));
}

#[test]
fn remote_seek_steps_ten_seconds() {
    use cyberplayer_lib::audio::events::remote;
    use cyberplayer_lib::audio::resources::RemoteAction;

    let mut h = harness(settings(false, RepeatMode::All)).with_queue(&[100.0]);
    h.play();
    h.ctl.seek_to(30.0).unwrap();

    remote(&mut h.ctl, RemoteAction::SeekForward).unwrap();
    assert_eq!(h.ctl.current_time(), 40.0);
    remote(&mut h.ctl, RemoteAction::SeekBackward).unwrap();
    remote(&mut h.ctl, RemoteAction::SeekBackward).unwrap();
    assert_eq!(h.ctl.current_time(), 20.0);
}

// ─── Crossfade ───

#[test]
fn retargeted_fade_starts_from_current_value() {
    let mut h = harness(settings(true, RepeatMode::All)).with_queue(&[200.0, 200.0, 200.0]);
    h.play();

    h.ctl.next(false).unwrap();
    h.pump();
    assert_eq!(h.ctl.active_deck(), DeckId::B);

    h.advance(2.0);
    assert_close(h.ctl.deck_weight(DeckId::B), 0.4);

    h.ctl.next(false).unwrap();
    assert_eq!(h.ctl.active_deck(), DeckId::A);
    match h.ctl.backend().last_fade() {
        Some(FadeUpdate::Ramp(op)) => {
            assert_close(op.from, 0.4);
            assert_close(op.to, 0.0);
        }
        other => panic!("expected a ramp, got {other:?}"),
    }
    assert_close(h.ctl.deck_weight(DeckId::A), 0.6);
}

#[test]
fn cancelled_fade_never_stops_the_reused_deck() {
    let mut h = harness(settings(true, RepeatMode::All)).with_queue(&[200.0, 200.0, 200.0]);
    h.play();
    h.ctl.next(false).unwrap();
    h.pump();
    h.advance(2.0);

    // Back onto deck A before the first fade's stop of A was due.
    h.ctl.next(false).unwrap();
    h.pump();
    let mark = h.ctl.backend().calls.len();

    h.advance(3.5);
    assert!(!h.ctl.backend().calls_since(mark).contains(&Call::Pause(DeckId::A)));
    assert!(h.ctl.backend().is_playing(DeckId::A));
    assert!(h.ctl.is_fading());

    h.advance(2.0);
    assert!(h.ctl.backend().calls_since(mark).contains(&Call::Pause(DeckId::B)));
    assert!(!h.ctl.backend().is_playing(DeckId::B));
    assert!(h.ctl.backend().is_playing(DeckId::A));
    assert_close(h.ctl.deck_weight(DeckId::A), 1.0);
    assert_at_rest(&h);
    assert_eq!(h.ctl.backend().last_fade(), Some(FadeUpdate::Hold(0.0)));
}

#[test]
fn exactly_one_deck_is_audible_at_rest() {
    let mut h = harness(settings(true, RepeatMode::All)).with_queue(&[200.0, 200.0, 200.0]);
    assert_at_rest(&h);

    h.play();
    assert_at_rest(&h);

    h.ctl.next(false).unwrap();
    h.pump();
    assert!(h.ctl.is_fading());
    h.advance(5.5);
    assert_at_rest(&h);
    assert_close(h.ctl.deck_weight(DeckId::B), 1.0);

    h.ctl.stop().unwrap();
    assert_at_rest(&h);
}

#[test]
fn pause_mid_fade_lands_on_incoming_deck() {
    let mut h = harness(settings(true, RepeatMode::All)).with_queue(&[200.0, 200.0]);
    h.play();
    h.ctl.next(false).unwrap();
    h.pump();
    h.advance(1.0);

    h.ctl.pause().unwrap();

    assert_eq!(h.ctl.phase(), TransportPhase::Paused);
    assert_close(h.ctl.deck_weight(DeckId::B), 1.0);
    assert_at_rest(&h);
    assert!(!h.ctl.backend().is_playing(DeckId::A));
    assert!(!h.ctl.backend().is_playing(DeckId::B));

    h.play();
    assert_eq!(h.ctl.phase(), TransportPhase::Playing);
    assert!(h.ctl.backend().is_playing(DeckId::B));
    assert!(!h.ctl.backend().is_playing(DeckId::A));
}

#[test]
fn crossfade_disabled_switches_on_one_deck() {
    let mut h = harness(settings(false, RepeatMode::All)).with_queue(&[200.0, 200.0]);
    h.play();
    let fades = h.ctl.backend().fades.len();

    h.ctl.next(false).unwrap();
    h.pump();

    assert_eq!(h.ctl.active_deck(), DeckId::A);
    assert!(!h.ctl.is_fading());
    assert!(h.ctl.backend().fades[fades..]
        .iter()
        .all(|f| matches!(f, FadeUpdate::Hold(_))));
}

#[test]
fn load_while_paused_does_not_start_playback() {
    let mut h = harness(settings(true, RepeatMode::All)).with_queue(&[200.0, 200.0]);
    h.play();
    h.ctl.pause().unwrap();
    let mark = h.ctl.backend().calls.len();

    h.ctl.load_track(1).unwrap();

    assert_eq!(h.ctl.phase(), TransportPhase::Paused);
    assert!(!h
        .ctl
        .backend()
        .calls_since(mark)
        .iter()
        .any(|c| matches!(c, Call::Start(..))));
    assert_close(h.ctl.deck_weight(h.ctl.active_deck()), 1.0);
    assert_at_rest(&h);
}

// ─── Generations ───

#[test]
fn stale_started_is_ignored() {
    let mut h = harness(settings(false, RepeatMode::All)).with_queue(&[200.0, 200.0]);
    h.ctl.play().unwrap();
    h.ctl.load_track(1).unwrap();
    assert_eq!(h.ctl.generation(), 2);

    let events = h.ctl.backend_mut().take_events();
    assert_eq!(
        events,
        vec![
            DeckEvent::Started { deck: DeckId::A, generation: 1 },
            DeckEvent::Started { deck: DeckId::A, generation: 2 },
        ]
    );

    h.ctl.handle_deck_event(events[0].clone()).unwrap();
    assert_eq!(h.ctl.phase(), TransportPhase::Loading);

    h.ctl.handle_deck_event(events[1].clone()).unwrap();
    assert_eq!(h.ctl.phase(), TransportPhase::Playing);
}

#[test]
fn stale_end_does_not_advance() {
    let mut h = harness(settings(false, RepeatMode::All)).with_queue(&[200.0, 200.0, 200.0]);
    h.play();
    h.ctl.next(false).unwrap();
    h.pump();

    h.ctl
        .handle_deck_event(DeckEvent::Ended { deck: DeckId::A, generation: 1 })
        .unwrap();

    assert_eq!(h.index(), Some(1));
    assert_eq!(h.ctl.phase(), TransportPhase::Playing);
}

#[test]
fn end_of_outgoing_deck_is_ignored() {
    let mut h = harness(settings(true, RepeatMode::All)).with_queue(&[200.0, 200.0, 200.0]);
    h.play();
    h.ctl.next(false).unwrap();
    h.pump();

    // Deck A still holds generation 1 while it fades out.
    h.ctl
        .handle_deck_event(DeckEvent::Ended { deck: DeckId::A, generation: 1 })
        .unwrap();

    assert_eq!(h.index(), Some(1));
    assert_eq!(h.ctl.active_deck(), DeckId::B);
}

// ─── Failures ───

#[test]
fn failed_load_leaves_playback_untouched() {
    let mut backend = FakeBackend::new();
    backend.broken.insert(track_path(1));
    let mut h = harness_with(backend, RecordingSession::default(), settings(true, RepeatMode::All))
        .with_queue(&[200.0, 200.0]);
    h.play();
    let mark = h.ctl.backend().calls.len();
    let fades = h.ctl.backend().fades.len();

    let err = h.ctl.load_track(1).unwrap_err();

    assert!(matches!(err, EngineError::SourceLoad { .. }));
    assert_eq!(h.ctl.generation(), 1);
    assert_eq!(h.ctl.active_deck(), DeckId::A);
    assert_eq!(h.index(), Some(0));
    assert_eq!(h.ctl.phase(), TransportPhase::Playing);
    assert!(h.ctl.backend().calls_since(mark).is_empty());
    assert_eq!(h.ctl.backend().fades.len(), fades);
    assert!(h.ctl.backend().is_playing(DeckId::A));
}

#[test]
fn unlock_denied_keeps_phase() {
    let mut backend = FakeBackend::new();
    backend.deny_unlock = true;
    let mut h = harness_with(backend, RecordingSession::default(), settings(true, RepeatMode::All))
        .with_queue(&[200.0]);

    let err = h.ctl.play().unwrap_err();
    assert!(matches!(err, EngineError::HardwareUnlockDenied(_)));
    assert_eq!(h.ctl.phase(), TransportPhase::Idle);
    assert_eq!(h.lock.acquired(), 0);

    h.ctl.backend_mut().deny_unlock = false;
    h.play();
    assert_eq!(h.ctl.phase(), TransportPhase::Playing);
}

#[test]
fn refused_start_is_reported_from_play() {
    let mut h = harness(settings(true, RepeatMode::All)).with_queue(&[200.0]);
    h.ctl.backend_mut().refuse_start = true;

    let err = h.ctl.play().unwrap_err();
    assert!(matches!(err, EngineError::Stream(_)));
    assert_eq!(h.ctl.phase(), TransportPhase::Idle);
    assert_eq!(h.lock.acquired(), 0);

    h.ctl.backend_mut().refuse_start = false;
    h.play();
    assert_eq!(h.ctl.phase(), TransportPhase::Playing);
}

#[test]
fn refused_start_during_crossfade_goes_idle_on_new_track() {
    let mut h = harness(settings(true, RepeatMode::All)).with_queue(&[200.0, 200.0]);
    h.play();
    h.ctl.backend_mut().refuse_start = true;

    let err = h.ctl.load_track(1).unwrap_err();

    assert!(matches!(err, EngineError::Stream(_)));
    assert_eq!(h.ctl.phase(), TransportPhase::Idle);
    assert_eq!(h.index(), Some(1));
    assert_eq!(h.ctl.active_deck(), DeckId::B);
    assert!(!h.ctl.backend().is_playing(DeckId::A));
    assert_eq!(h.ctl.backend().last_fade(), Some(FadeUpdate::Hold(1.0)));
    assert_eq!(h.lock.released(), h.lock.acquired());
}

#[test]
fn failed_deck_skips_to_next_track() {
    let mut h = harness(settings(false, RepeatMode::One)).with_queue(&[200.0, 200.0, 200.0]);
    h.play();

    h.ctl
        .handle_deck_event(DeckEvent::Failed {
            deck: DeckId::A,
            generation: 1,
            reason: "corrupt stream".into(),
        })
        .unwrap();
    h.pump();

    assert_eq!(h.index(), Some(1));
    assert_eq!(h.ctl.phase(), TransportPhase::Playing);
}

#[test]
fn stops_when_every_track_fails() {
    let mut h = harness(settings(false, RepeatMode::All)).with_queue(&[200.0, 200.0]);
    h.play();

    for generation in [1, 2] {
        h.ctl
            .handle_deck_event(DeckEvent::Failed {
                deck: DeckId::A,
                generation,
                reason: "no decoder".into(),
            })
            .unwrap();
    }

    assert_eq!(h.ctl.phase(), TransportPhase::Idle);
    assert!(!h.ctl.resources().wake_lock_held());
}

#[test]
fn auto_advance_skips_unloadable_track() {
    let mut backend = FakeBackend::new();
    backend.broken.insert(track_path(1));
    let mut h = harness_with(backend, RecordingSession::default(), settings(false, RepeatMode::All))
        .with_queue(&[200.0, 200.0, 200.0]);
    h.play();

    h.finish_active();

    assert_eq!(h.index(), Some(2));
    assert_eq!(h.ctl.phase(), TransportPhase::Playing);
}

// ─── Resources ───

#[test]
fn wake_lock_is_balanced_across_transport() {
    let mut h = harness(settings(true, RepeatMode::All)).with_queue(&[200.0, 200.0, 200.0]);
    h.play();
    h.ctl.next(false).unwrap();
    h.pump();
    h.ctl.next(false).unwrap();
    h.pump();
    assert_eq!(h.lock.acquired(), 1);

    h.ctl.pause().unwrap();
    assert_eq!(h.lock.released(), 1);

    h.play();
    h.ctl.stop().unwrap();
    h.ctl.stop().unwrap();

    assert_eq!(h.lock.acquired(), 2);
    assert_eq!(h.lock.released(), 2);
    assert!(!h.ctl.resources().wake_lock_held());
}

#[test]
fn teardown_releases_everything_once() {
    let mut h = harness(settings(true, RepeatMode::All)).with_queue(&[200.0]);
    h.play();

    h.ctl.teardown();
    h.ctl.teardown();

    assert_eq!(h.ctl.backend().teardowns, 1);
    assert_eq!(h.lock.acquired(), h.lock.released());
    assert_eq!(h.ctl.phase(), TransportPhase::Idle);
    assert!(!h.ctl.is_initialized());
}

#[test]
fn session_receives_metadata_and_position() {
    let mut h = harness(settings(false, RepeatMode::All)).with_queue(&[200.0, 200.0]);
    h.play();
    h.advance(4.0);
    h.ctl.next(false).unwrap();

    let log = h.session.log.lock();
    let titles: Vec<_> = log.metadata.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["track0", "track1"]);
    let last = log.positions.last().copied().unwrap();
    assert_eq!(last.position, 4.0);
    assert_eq!(last.duration, 200.0);
    assert_eq!(last.playback_rate, 1.0);
}

#[test]
fn position_publish_failure_does_not_interrupt_playback() {
    let session = RecordingSession {
        fail_positions: true,
        ..RecordingSession::default()
    };
    let mut h = harness_with(FakeBackend::new(), session, settings(false, RepeatMode::All))
        .with_queue(&[200.0]);
    h.play();

    h.advance(1.0);
    h.advance(1.0);

    assert_eq!(h.ctl.phase(), TransportPhase::Playing);
    assert_eq!(h.ctl.current_time(), 2.0);
    assert!(h.session.log.lock().positions.is_empty());
}
