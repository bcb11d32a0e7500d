//! Voices and the per-listener mixer.
//!
//! A voice is the playing incarnation of a sound-emitting entity. Each
//! listener owns a bus of voices; every mix tick the bus distance-attenuates
//! them, culls those below the gain threshold, caps the survivors to
//! `max_sounds` by descending effective gain, and resamples the winners into
//! the output layout.
//!
//! Voice lifecycle:
//!
//! ```text
//! created → active     (entity exists, sound asset ready)
//! active  → fading-out (entity removed or mask lost) → destroyed
//! active  → culled     (below threshold or over cap; per tick, no destroy)
//! ```

use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;

use crate::assets::types::SoundAsset;
use crate::assets::AssetHandle;
use crate::scene::components::SoundAttenuation;
use crate::scene::EntityId;

/// Fade-out duration when an emitting entity disappears.
const FADE_OUT_US: u64 = 50_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceState {
    Active,
    /// Ramping to silence; the factor falls from 1 to 0 over the fade.
    FadingOut { factor: f32 },
}

pub struct Voice {
    pub sound: AssetHandle<SoundAsset>,
    pub position: Vec3,
    pub start_time: u64,
    pub attenuation: SoundAttenuation,
    pub min_distance: f32,
    pub max_distance: f32,
    pub gain: f32,
    pub priority: i32,
    pub looping: bool,
    pub state: VoiceState,
}

/// Distance attenuation factor in `[0, 1]`.
#[must_use]
pub fn distance_attenuation(
    model: SoundAttenuation,
    distance: f32,
    min_distance: f32,
    max_distance: f32,
) -> f32 {
    let min = min_distance.max(1e-3);
    let max = max_distance.max(min + 1e-3);
    // Clamping below the minimum distance keeps a source at the listener's
    // origin finite.
    let d = distance.clamp(min, max);
    match model {
        SoundAttenuation::None => 1.0,
        SoundAttenuation::Linear => 1.0 - (d - min) / (max - min),
        SoundAttenuation::Logarithmic => 1.0 - (d / min).ln() / (max / min).ln(),
        SoundAttenuation::InverseSquare => {
            if distance >= max {
                0.0
            } else {
                (min * min) / (d * d)
            }
        }
    }
    .clamp(0.0, 1.0)
}

/// Counters of one mix tick, used by diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixStats {
    /// Voices resampled into the output.
    pub mixed: usize,
    /// Voices culled by threshold or cap this tick.
    pub culled: usize,
    /// Voices destroyed after fading out.
    pub destroyed: usize,
}

/// One listener's voice set and mixing parameters.
pub struct ListenerBus {
    pub position: Vec3,
    pub orientation: Quat,
    pub max_sounds: u32,
    pub gain_threshold: f32,
    pub gain: f32,
    pub voices: FxHashMap<EntityId, Voice>,
}

impl ListenerBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            max_sounds: 16,
            gain_threshold: 0.001,
            gain: 1.0,
            voices: FxHashMap::default(),
        }
    }

    /// Mixes the bus into `out` (interleaved, `channels`-wide frames),
    /// adding on top of the existing content.
    pub fn mix(
        &mut self,
        out: &mut [f32],
        channels: u32,
        sample_rate: u32,
        time_us: u64,
    ) -> MixStats {
        let mut stats = MixStats::default();
        let frames = out.len() / channels.max(1) as usize;
        if frames == 0 {
            return stats;
        }
        let quantum_us = frames as u64 * 1_000_000 / u64::from(sample_rate.max(1));

        // Effective gain per voice, then threshold cull and cap.
        struct Candidate {
            entity: EntityId,
            effective_gain: f32,
        }
        let mut candidates: Vec<Candidate> = Vec::with_capacity(self.voices.len());
        for (&entity, voice) in &self.voices {
            let fade = match voice.state {
                VoiceState::Active => 1.0,
                VoiceState::FadingOut { factor } => factor,
            };
            let distance = voice.position.distance(self.position);
            let attenuation = distance_attenuation(
                voice.attenuation,
                distance,
                voice.min_distance,
                voice.max_distance,
            );
            let effective_gain = voice.gain * attenuation * fade;
            if effective_gain < self.gain_threshold {
                stats.culled += 1;
                continue;
            }
            candidates.push(Candidate {
                entity,
                effective_gain,
            });
        }

        candidates.sort_by(|a, b| b.effective_gain.total_cmp(&a.effective_gain));
        let cap = self.max_sounds as usize;
        if candidates.len() > cap {
            stats.culled += candidates.len() - cap;
            candidates.truncate(cap);
        }

        for candidate in &candidates {
            let voice = &self.voices[&candidate.entity];
            render_voice(
                voice,
                candidate.effective_gain,
                self.position,
                self.orientation,
                out,
                channels,
                sample_rate,
                time_us,
            );
            stats.mixed += 1;
        }

        // Advance fades and drop finished voices.
        let step = quantum_us as f32 / FADE_OUT_US as f32;
        self.voices.retain(|_, voice| match &mut voice.state {
            VoiceState::Active => true,
            VoiceState::FadingOut { factor } => {
                *factor -= step;
                let alive = *factor > 0.0;
                if !alive {
                    stats.destroyed += 1;
                }
                alive
            }
        });

        stats
    }
}

impl Default for ListenerBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Resamples one voice into the output buffer with equal-power panning.
fn render_voice(
    voice: &Voice,
    effective_gain: f32,
    listener_position: Vec3,
    listener_orientation: Quat,
    out: &mut [f32],
    channels: u32,
    sample_rate: u32,
    time_us: u64,
) {
    let sound = &voice.sound;
    let source_frames = sound.frame_count();
    if source_frames == 0 || sound.channels == 0 {
        return;
    }

    // Playback position in source frames at the start of this quantum.
    let elapsed_us = time_us.saturating_sub(voice.start_time);
    let start_frame = elapsed_us as f64 * f64::from(sound.sample_rate) / 1e6;
    let step = f64::from(sound.sample_rate) / f64::from(sample_rate.max(1));

    // Horizontal direction to the source in listener space drives the pan.
    let to_source = listener_orientation.inverse() * (voice.position - listener_position);
    let pan = if to_source.length_squared() > 1e-6 {
        (to_source.normalize().x).clamp(-1.0, 1.0)
    } else {
        0.0
    };
    let angle = (pan + 1.0) * std::f32::consts::FRAC_PI_4;
    let (left, right) = (angle.cos(), angle.sin());

    let frames = out.len() / channels as usize;
    let src_channels = sound.channels as usize;
    for i in 0..frames {
        let position = start_frame + i as f64 * step;
        let frame = position.floor();
        let blend = (position - frame) as f32;
        let (frame0, frame1) = if voice.looping {
            let f0 = (frame as u64).rem_euclid(source_frames);
            ((f0) as usize, ((f0 + 1) % source_frames) as usize)
        } else {
            if frame >= (source_frames - 1) as f64 {
                break;
            }
            let f0 = frame as usize;
            (f0, f0 + 1)
        };

        // Average the source channels into a mono sample pair.
        let mut s0 = 0.0;
        let mut s1 = 0.0;
        for c in 0..src_channels {
            s0 += sound.frames[frame0 * src_channels + c];
            s1 += sound.frames[frame1 * src_channels + c];
        }
        let sample = (s0 + (s1 - s0) * blend) / src_channels as f32 * effective_gain;

        match channels {
            1 => out[i] += sample,
            _ => {
                out[i * channels as usize] += sample * left;
                out[i * channels as usize + 1] += sample * right;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_attenuation_endpoints() {
        let a = distance_attenuation(SoundAttenuation::Linear, 1.0, 1.0, 10.0);
        assert!((a - 1.0).abs() < 1e-6);
        let a = distance_attenuation(SoundAttenuation::Linear, 10.0, 1.0, 10.0);
        assert!(a.abs() < 1e-6);
        let a = distance_attenuation(SoundAttenuation::Linear, 5.5, 1.0, 10.0);
        assert!((a - 0.5).abs() < 1e-6);
    }

    #[test]
    fn source_at_listener_origin_stays_finite() {
        for model in [
            SoundAttenuation::None,
            SoundAttenuation::Linear,
            SoundAttenuation::Logarithmic,
            SoundAttenuation::InverseSquare,
        ] {
            let a = distance_attenuation(model, 0.0, 1.0, 10.0);
            assert!(a.is_finite());
            assert!((0.0..=1.0).contains(&a), "{model:?} out of range: {a}");
        }
    }
}
