//! The positional sound pipeline: emit → prepare → mix.
//!
//! Shares the graphics pipeline's shape: the control thread snapshots
//! listeners and voice emitters through a triple buffer, the sound thread
//! maps them onto per-listener voice buses with interpolated positions, and
//! the speaker pulls mixed frames through the master bus. Sound uses
//! read-repeat so the mixer keeps following the freshest snapshot during
//! emit stalls.

pub mod voices;

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::assets::types::SoundAsset;
use crate::assets::AssetServer;
use crate::graphics::emit::EmitTransforms;
use crate::platform::speaker::{Speaker, SpeakerFormat, SpeakerSource};
use crate::scene::components::{ListenerComponent, SoundComponent};
use crate::scene::{EntityId, EntityStore};
use crate::sync::swap_buffer::SwapBuffers;
use crate::sync::timing::{interpolation_factor, InterpolationTimingCorrector};

use self::voices::{ListenerBus, MixStats, Voice, VoiceState};

// ─── Snapshot ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EmitListener {
    pub entity: EntityId,
    pub transform: EmitTransforms,
    pub listener: ListenerComponent,
}

#[derive(Debug, Clone)]
pub struct EmitVoice {
    pub entity: EntityId,
    pub transform: EmitTransforms,
    pub sound: SoundComponent,
}

#[derive(Debug, Default)]
pub struct SoundSnapshot {
    pub time: u64,
    pub listeners: Vec<EmitListener>,
    pub voices: Vec<EmitVoice>,
}

// ─── Pipeline ─────────────────────────────────────────────────────────────────

/// External audio source mixed after the listeners (the GUI collaborator's
/// chaining voice).
pub type ChainSource = Box<dyn FnMut(&mut [f32]) + Send>;

pub struct SoundPipeline {
    update_period_us: u64,
    format: SpeakerFormat,
    emit_buffers: SwapBuffers<SoundSnapshot>,
    timing: Mutex<InterpolationTimingCorrector>,
    /// Sound-thread state: one bus per live listener.
    buses: Mutex<FxHashMap<EntityId, ListenerBus>>,
    /// Target mix time of the current tick.
    dispatch_time: AtomicU64,
    chain: Mutex<Option<ChainSource>>,
    last_stats: Mutex<MixStats>,
}

impl SoundPipeline {
    #[must_use]
    pub fn new(update_period_us: u64, format: SpeakerFormat) -> Self {
        Self {
            update_period_us,
            format,
            emit_buffers: SwapBuffers::new(true),
            timing: Mutex::new(InterpolationTimingCorrector::new()),
            buses: Mutex::new(FxHashMap::default()),
            dispatch_time: AtomicU64::new(0),
            chain: Mutex::new(None),
            last_stats: Mutex::new(MixStats::default()),
        }
    }

    /// Registers the external chaining source (GUI audio).
    pub fn set_chain_source(&self, source: ChainSource) {
        *self.chain.lock() = Some(source);
    }

    // ── Emit (control thread) ──────────────────────────────────────────────

    pub fn emit(&self, store: &EntityStore, time: u64) {
        let Some(mut slot) = self.emit_buffers.write() else {
            log::debug!("sound emit dropped: no free swap slot");
            return;
        };
        slot.time = time;
        slot.listeners.clear();
        slot.voices.clear();

        let mut listener_masks = 0u32;
        for (entity, listener) in &store.listeners {
            listener_masks |= listener.scene_mask;
            slot.listeners.push(EmitListener {
                entity,
                transform: EmitTransforms {
                    current: store.transform_of(entity),
                    history: store.history_of(entity),
                },
                listener: *listener,
            });
        }
        for (entity, sound) in &store.sounds {
            if sound.scene_mask & listener_masks == 0 {
                continue;
            }
            slot.voices.push(EmitVoice {
                entity,
                transform: EmitTransforms {
                    current: store.transform_of(entity),
                    history: store.history_of(entity),
                },
                sound: *sound,
            });
        }
    }

    // ── Prepare (sound thread) ─────────────────────────────────────────────

    /// One sound tick: reads the freshest snapshot (repeats are fine) and
    /// reconciles the listener buses and their voices.
    pub fn tick(&self, assets: &AssetServer, time: u64) {
        let Some(snapshot) = self.emit_buffers.read() else {
            return;
        };
        let target =
            self.timing
                .lock()
                .correct(snapshot.time, time, self.update_period_us);
        let factor = interpolation_factor(target, snapshot.time, self.update_period_us);
        self.dispatch_time.store(target, Ordering::Release);

        let mut buses = self.buses.lock();

        // Listeners that vanished take their buses with them.
        buses.retain(|entity, _| snapshot.listeners.iter().any(|l| l.entity == *entity));

        for emit_listener in &snapshot.listeners {
            let bus = buses.entry(emit_listener.entity).or_default();
            let pose = emit_listener.transform.interpolate(factor);
            bus.position = pose.position;
            bus.orientation = pose.orientation;
            bus.max_sounds = emit_listener.listener.max_sounds;
            bus.gain_threshold = emit_listener.listener.gain_threshold;
            bus.gain = emit_listener.listener.gain;

            // Voices whose entity left the snapshot (or lost the mask) fade
            // out; the mixer destroys them once silent.
            for (entity, voice) in &mut bus.voices {
                let still_present = snapshot.voices.iter().any(|v| {
                    v.entity == *entity
                        && v.sound.scene_mask & emit_listener.listener.scene_mask != 0
                });
                if !still_present && voice.state == VoiceState::Active {
                    voice.state = VoiceState::FadingOut { factor: 1.0 };
                }
            }

            for emit_voice in &snapshot.voices {
                if emit_voice.sound.scene_mask & emit_listener.listener.scene_mask == 0 {
                    continue;
                }
                let Some(sound) = assets.get::<SoundAsset>(emit_voice.sound.sound) else {
                    // Not ready yet; an existing voice loses its backing.
                    bus.voices.remove(&emit_voice.entity);
                    continue;
                };
                let position = emit_voice.transform.interpolate(factor).position;
                let voice = bus.voices.entry(emit_voice.entity).or_insert_with(|| Voice {
                    sound: sound.clone(),
                    position,
                    start_time: emit_voice.sound.start_time,
                    attenuation: emit_voice.sound.attenuation,
                    min_distance: emit_voice.sound.min_distance,
                    max_distance: emit_voice.sound.max_distance,
                    gain: emit_voice.sound.gain,
                    priority: emit_voice.sound.priority,
                    looping: emit_voice.sound.looping,
                    state: VoiceState::Active,
                });
                voice.sound = sound;
                voice.position = position;
                voice.start_time = emit_voice.sound.start_time;
                voice.attenuation = emit_voice.sound.attenuation;
                voice.min_distance = emit_voice.sound.min_distance;
                voice.max_distance = emit_voice.sound.max_distance;
                voice.gain = emit_voice.sound.gain;
                voice.priority = emit_voice.sound.priority;
                voice.looping = emit_voice.sound.looping;
                voice.state = VoiceState::Active;
            }
        }
    }

    // ── Mix (speaker callback) ─────────────────────────────────────────────

    /// Drives the speaker: pulls frames through the master bus.
    pub fn dispatch(&self, speaker: &mut dyn Speaker) {
        let time = self.dispatch_time.load(Ordering::Acquire);
        let mut master = MasterBus {
            pipeline: self,
            time,
        };
        speaker.process(time, &mut master);
    }

    /// Counters of the most recent mix.
    #[must_use]
    pub fn mix_stats(&self) -> MixStats {
        *self.last_stats.lock()
    }

    /// Mixes every listener bus and the chain source into `out`.
    /// Exposed for the master bus and the pipeline tests.
    pub fn render(&self, out: &mut [f32], time: u64) {
        out.fill(0.0);
        let channels = self.format.channels;
        let sample_rate = self.format.sample_rate;

        let mut total = MixStats::default();
        let mut buses = self.buses.lock();
        if buses.len() == 1 {
            // Common case: one listener mixes straight into the output.
            for bus in buses.values_mut() {
                let stats = bus.mix(out, channels, sample_rate, time);
                apply_gain(out, bus.gain);
                accumulate(&mut total, stats);
            }
        } else if !buses.is_empty() {
            let mut scratch = vec![0.0f32; out.len()];
            for bus in buses.values_mut() {
                scratch.fill(0.0);
                let stats = bus.mix(&mut scratch, channels, sample_rate, time);
                for (o, s) in out.iter_mut().zip(&scratch) {
                    *o += s * bus.gain;
                }
                accumulate(&mut total, stats);
            }
        }
        drop(buses);

        if let Some(chain) = self.chain.lock().as_mut() {
            chain(out);
        }
        *self.last_stats.lock() = total;
    }
}

fn apply_gain(buffer: &mut [f32], gain: f32) {
    if (gain - 1.0).abs() > 1e-6 {
        for sample in buffer {
            *sample *= gain;
        }
    }
}

fn accumulate(total: &mut MixStats, stats: MixStats) {
    total.mixed += stats.mixed;
    total.culled += stats.culled;
    total.destroyed += stats.destroyed;
}

/// The master bus: every listener plus the external chain, summed.
pub struct MasterBus<'a> {
    pipeline: &'a SoundPipeline,
    time: u64,
}

impl SpeakerSource for MasterBus<'_> {
    fn render(&mut self, buffer: &mut [f32]) {
        self.pipeline.render(buffer, self.time);
    }
}
