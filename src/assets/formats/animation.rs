//! Skeletal animation pack format.
//!
//! Layout: magic `EMAN`, version, duration (µs), loop flag, track count;
//! per track the bone index and three sparse key channels (position,
//! rotation, scale), each a count followed by normalized times and values.

use crate::animation::sampling::{BoneTrack, Channel, SkeletalAnimation};
use crate::errors::Result;

use super::{ByteReader, ByteWriter};

const MAGIC: &[u8; 4] = b"EMAN";
const VERSION: u32 = 1;

#[must_use]
pub fn encode_animation(animation: &SkeletalAnimation) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.put_bytes(MAGIC);
    w.put_u32(VERSION);
    w.put_u64(animation.duration_us);
    w.put_u32(u32::from(animation.looping));
    w.put_u32(animation.tracks.len() as u32);
    for track in &animation.tracks {
        w.put_u16(track.bone);
        w.put_u32(track.position.times.len() as u32);
        for &t in &track.position.times {
            w.put_f32(t);
        }
        for &v in &track.position.values {
            w.put_vec3(v);
        }
        w.put_u32(track.rotation.times.len() as u32);
        for &t in &track.rotation.times {
            w.put_f32(t);
        }
        for &v in &track.rotation.values {
            w.put_quat(v);
        }
        w.put_u32(track.scale.times.len() as u32);
        for &t in &track.scale.times {
            w.put_f32(t);
        }
        for &v in &track.scale.values {
            w.put_vec3(v);
        }
    }
    w.finish()
}

pub fn decode_animation(bytes: &[u8]) -> Result<SkeletalAnimation> {
    let mut r = ByteReader::new("animation", bytes);
    r.expect_magic(MAGIC, VERSION)?;
    let duration_us = r.get_u64()?;
    let looping = r.get_u32()? != 0;
    let track_count = r.get_u32()? as usize;

    let mut tracks = Vec::with_capacity(track_count);
    for _ in 0..track_count {
        let bone = r.get_u16()?;
        let position = decode_channel(&mut r, ByteReader::get_vec3)?;
        let rotation = decode_channel(&mut r, ByteReader::get_quat)?;
        let scale = decode_channel(&mut r, ByteReader::get_vec3)?;
        tracks.push(BoneTrack {
            bone,
            position,
            rotation,
            scale,
        });
    }
    r.expect_end()?;

    Ok(SkeletalAnimation {
        duration_us,
        looping,
        tracks,
    })
}

fn decode_channel<'a, T>(
    r: &mut ByteReader<'a>,
    mut get: impl FnMut(&mut ByteReader<'a>) -> Result<T>,
) -> Result<Channel<T>> {
    let count = r.get_u32()? as usize;
    let mut times = Vec::with_capacity(count);
    for _ in 0..count {
        let t = r.get_f32()?;
        if !(0.0..=1.0).contains(&t) {
            return Err(r.error(format!("key time {t} outside [0, 1]")));
        }
        if let Some(&prev) = times.last() {
            if t < prev {
                return Err(r.error("key times not sorted"));
            }
        }
        times.push(t);
    }
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(get(r)?);
    }
    Ok(Channel { times, values })
}
