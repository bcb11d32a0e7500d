//! Sound Pipeline Tests
//!
//! Tests for:
//! - Priority culling: cap to `max_sounds` by descending effective gain
//! - Gain-threshold culling
//! - Distance attenuation bounds (no NaNs at the listener origin)
//! - Voice lifecycle: active → fading-out → destroyed
//! - End-to-end emit → tick → mix through the master bus

use glam::Vec3;

use ember::assets::types::SoundAsset;
use ember::assets::AssetServer;
use ember::platform::speaker::{NullSpeaker, Speaker, SpeakerFormat};
use ember::scene::components::{ListenerComponent, SoundAttenuation, SoundComponent};
use ember::scene::{EntityStore, Transform};
use ember::sound::voices::{ListenerBus, Voice, VoiceState};
use ember::sound::SoundPipeline;

const SAMPLE_RATE: u32 = 48_000;

fn sine_asset(assets: &AssetServer, name: &str) -> ember::assets::AssetHandle<SoundAsset> {
    let frames: Vec<f32> = (0..SAMPLE_RATE)
        .map(|i| (i as f32 / SAMPLE_RATE as f32 * std::f32::consts::TAU * 220.0).sin())
        .collect();
    let id = assets.insert_named(
        name,
        SoundAsset {
            sample_rate: SAMPLE_RATE,
            channels: 1,
            frames,
        },
    );
    assets.get::<SoundAsset>(id).unwrap()
}

fn voice(sound: ember::assets::AssetHandle<SoundAsset>, gain: f32) -> Voice {
    Voice {
        sound,
        position: Vec3::new(0.0, 0.0, -1.0),
        start_time: 0,
        attenuation: SoundAttenuation::None,
        min_distance: 1.0,
        max_distance: 100.0,
        gain,
        priority: 0,
        looping: true,
        state: VoiceState::Active,
    }
}

// ============================================================================
// Mixer culling
// ============================================================================

#[test]
fn mixer_caps_to_max_sounds_by_effective_gain() {
    let _ = env_logger::builder().is_test(true).try_init();
    let assets = AssetServer::new();
    let sound = sine_asset(&assets, "sound/sine");
    let mut store = EntityStore::new();

    let mut bus = ListenerBus::new();
    bus.max_sounds = 8;
    // Twenty audible voices with distinct gains.
    for i in 0..20 {
        let entity = store.spawn();
        bus.voices
            .insert(entity, voice(sound.clone(), 1.0 - i as f32 * 0.02));
    }

    let mut out = vec![0.0f32; 512 * 2];
    let stats = bus.mix(&mut out, 2, SAMPLE_RATE, 100_000);

    assert_eq!(stats.mixed, 8, "exactly max_sounds voices mix");
    assert_eq!(stats.culled, 12, "the rest are culled this tick");
    assert_eq!(bus.voices.len(), 20, "culling does not destroy voices");
    assert!(out.iter().any(|&s| s.abs() > 1e-6));
}

#[test]
fn voices_below_the_gain_threshold_are_culled() {
    let _ = env_logger::builder().is_test(true).try_init();
    let assets = AssetServer::new();
    let sound = sine_asset(&assets, "sound/quiet");
    let mut store = EntityStore::new();

    let mut bus = ListenerBus::new();
    bus.gain_threshold = 0.1;
    let loud = store.spawn();
    let quiet = store.spawn();
    bus.voices.insert(loud, voice(sound.clone(), 0.5));
    bus.voices.insert(quiet, voice(sound, 0.01));

    let mut out = vec![0.0f32; 256 * 2];
    let stats = bus.mix(&mut out, 2, SAMPLE_RATE, 100_000);
    assert_eq!(stats.mixed, 1);
    assert_eq!(stats.culled, 1);
}

#[test]
fn point_source_at_listener_origin_produces_no_nans() {
    let _ = env_logger::builder().is_test(true).try_init();
    let assets = AssetServer::new();
    let sound = sine_asset(&assets, "sound/origin");
    let mut store = EntityStore::new();

    let mut bus = ListenerBus::new();
    let entity = store.spawn();
    let mut v = voice(sound, 1.0);
    v.position = Vec3::ZERO;
    v.attenuation = SoundAttenuation::InverseSquare;
    bus.voices.insert(entity, v);

    let mut out = vec![0.0f32; 256 * 2];
    bus.mix(&mut out, 2, SAMPLE_RATE, 100_000);
    assert!(out.iter().all(|s| s.is_finite()));
}

#[test]
fn fading_voices_are_destroyed_once_silent() {
    let _ = env_logger::builder().is_test(true).try_init();
    let assets = AssetServer::new();
    let sound = sine_asset(&assets, "sound/fade");
    let mut store = EntityStore::new();

    let mut bus = ListenerBus::new();
    let entity = store.spawn();
    let mut v = voice(sound, 1.0);
    v.state = VoiceState::FadingOut { factor: 1.0 };
    bus.voices.insert(entity, v);

    // Each quantum advances the fade; a 50 ms fade dies within a few
    // 1024-frame quanta at 48 kHz.
    let mut destroyed = 0;
    for _ in 0..10 {
        let mut out = vec![0.0f32; 1024 * 2];
        destroyed += bus.mix(&mut out, 2, SAMPLE_RATE, 100_000).destroyed;
    }
    assert_eq!(destroyed, 1);
    assert!(bus.voices.is_empty());
}

// ============================================================================
// Pipeline end-to-end
// ============================================================================

#[test]
fn emit_tick_mix_plays_a_positional_voice() {
    let _ = env_logger::builder().is_test(true).try_init();
    let assets = AssetServer::new();
    let sound = sine_asset(&assets, "sound/world");
    let pipeline = SoundPipeline::new(50_000, SpeakerFormat::default());

    let mut store = EntityStore::new();
    let listener = store.spawn();
    store.transforms.insert(listener, Transform::IDENTITY);
    store.listeners.insert(listener, ListenerComponent::default());
    let emitter = store.spawn();
    store
        .transforms
        .insert(emitter, Transform::from_position(Vec3::new(2.0, 0.0, 0.0)));
    store.sounds.insert(
        emitter,
        SoundComponent {
            sound: sound.id(),
            looping: true,
            ..SoundComponent::default()
        },
    );

    store.snapshot_history();
    pipeline.emit(&store, 50_000);
    pipeline.tick(&assets, 100_000);

    let mut speaker = NullSpeaker::default();
    speaker.start();
    pipeline.dispatch(&mut speaker);
    assert!(
        speaker.last_buffer.iter().any(|&s| s.abs() > 1e-6),
        "voice should be audible through the master bus"
    );
    assert_eq!(pipeline.mix_stats().mixed, 1);

    // A source to the listener's right mixes louder on the right channel.
    let (mut left, mut right) = (0.0f32, 0.0f32);
    for frame in speaker.last_buffer.chunks(2) {
        left += frame[0].abs();
        right += frame[1].abs();
    }
    assert!(right > left, "source at +X should favor the right channel");
}

#[test]
fn vanished_emitters_fade_out_and_die() {
    let _ = env_logger::builder().is_test(true).try_init();
    let assets = AssetServer::new();
    let sound = sine_asset(&assets, "sound/brief");
    let pipeline = SoundPipeline::new(50_000, SpeakerFormat::default());

    let mut store = EntityStore::new();
    let listener = store.spawn();
    store.transforms.insert(listener, Transform::IDENTITY);
    store.listeners.insert(listener, ListenerComponent::default());
    let emitter = store.spawn();
    store.transforms.insert(emitter, Transform::IDENTITY);
    store.sounds.insert(
        emitter,
        SoundComponent {
            sound: sound.id(),
            looping: true,
            ..SoundComponent::default()
        },
    );

    pipeline.emit(&store, 50_000);
    pipeline.tick(&assets, 100_000);

    // The emitter disappears; the next snapshot no longer carries it.
    store.despawn(emitter);
    pipeline.emit(&store, 100_000);
    pipeline.tick(&assets, 150_000);

    let mut speaker = NullSpeaker::default();
    for _ in 0..10 {
        pipeline.dispatch(&mut speaker);
    }
    assert_eq!(
        pipeline.mix_stats().mixed,
        0,
        "faded voice must stop mixing after destruction"
    );
}

#[test]
fn listeners_only_hear_their_scene_mask() {
    let _ = env_logger::builder().is_test(true).try_init();
    let assets = AssetServer::new();
    let sound = sine_asset(&assets, "sound/masked");
    let pipeline = SoundPipeline::new(50_000, SpeakerFormat::default());

    let mut store = EntityStore::new();
    let listener = store.spawn();
    store.transforms.insert(listener, Transform::IDENTITY);
    store.listeners.insert(
        listener,
        ListenerComponent {
            scene_mask: 0b01,
            ..ListenerComponent::default()
        },
    );
    let emitter = store.spawn();
    store.transforms.insert(emitter, Transform::IDENTITY);
    store.sounds.insert(
        emitter,
        SoundComponent {
            sound: sound.id(),
            scene_mask: 0b10,
            looping: true,
            ..SoundComponent::default()
        },
    );

    pipeline.emit(&store, 50_000);
    pipeline.tick(&assets, 100_000);
    let mut speaker = NullSpeaker::default();
    pipeline.dispatch(&mut speaker);
    assert_eq!(pipeline.mix_stats().mixed, 0);
    assert!(speaker.last_buffer.iter().all(|&s| s == 0.0));
}
