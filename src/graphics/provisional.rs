//! Provisional (transient) GPU resources.
//!
//! Shadow textures, HDR intermediates, and render targets are keyed by a
//! stable name plus resolution and format. Prepare interns keys into small
//! ids it can record into the queue; dispatch lazily creates the backend
//! resources behind those ids and recycles them across frames. Entries that
//! go unused for several frames are swept so resolution changes do not leak
//! GPU memory.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::platform::gpu::TextureDesc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProvisionalTextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProvisionalFramebufferId(pub u32);

/// Frames an entry may sit unused before the sweep drops it.
const MAX_IDLE_FRAMES: u32 = 8;

struct TextureEntry {
    desc: TextureDesc,
    idle_frames: u32,
}

#[derive(Default)]
struct Inner {
    texture_keys: FxHashMap<(String, TextureDesc), ProvisionalTextureId>,
    textures: Vec<TextureEntry>,
    framebuffer_keys: FxHashMap<String, ProvisionalFramebufferId>,
}

/// The transient-resource registry shared by prepare and dispatch.
#[derive(Default)]
pub struct ProvisionalGraphics {
    inner: Mutex<Inner>,
}

impl ProvisionalGraphics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a transient texture key. The same `(name, desc)` pair yields
    /// the same id for as long as the entry stays alive.
    pub fn texture(&self, name: &str, desc: TextureDesc) -> ProvisionalTextureId {
        let mut inner = self.inner.lock();
        if let Some(&id) = inner.texture_keys.get(&(name.to_string(), desc)) {
            inner.textures[id.0 as usize].idle_frames = 0;
            return id;
        }
        let id = ProvisionalTextureId(inner.textures.len() as u32);
        inner.textures.push(TextureEntry {
            desc,
            idle_frames: 0,
        });
        inner.texture_keys.insert((name.to_string(), desc), id);
        id
    }

    /// Interns a framebuffer key.
    pub fn framebuffer(&self, name: &str) -> ProvisionalFramebufferId {
        let mut inner = self.inner.lock();
        if let Some(&id) = inner.framebuffer_keys.get(name) {
            return id;
        }
        let id = ProvisionalFramebufferId(inner.framebuffer_keys.len() as u32);
        inner.framebuffer_keys.insert(name.to_string(), id);
        id
    }

    /// Descriptor recorded for a texture id.
    #[must_use]
    pub fn texture_desc(&self, id: ProvisionalTextureId) -> Option<TextureDesc> {
        self.inner.lock().textures.get(id.0 as usize).map(|e| e.desc)
    }

    /// Ages every entry one frame and returns the ids that crossed the idle
    /// bound. Dispatch destroys their backend textures; the keys stay
    /// interned so a re-request after a sweep simply recreates the backing.
    pub fn sweep(&self) -> Vec<ProvisionalTextureId> {
        let mut inner = self.inner.lock();
        let mut stale = Vec::new();
        for (index, entry) in inner.textures.iter_mut().enumerate() {
            entry.idle_frames += 1;
            if entry.idle_frames == MAX_IDLE_FRAMES {
                stale.push(ProvisionalTextureId(index as u32));
            }
        }
        stale
    }

    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.inner.lock().textures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::gpu::{TextureFormat, TextureKind};
    use glam::UVec2;

    fn desc(size: u32) -> TextureDesc {
        TextureDesc {
            resolution: UVec2::splat(size),
            kind: TextureKind::D2,
            format: TextureFormat::Rgb16F,
            mipmaps: false,
        }
    }

    #[test]
    fn same_key_same_id() {
        let prov = ProvisionalGraphics::new();
        let a = prov.texture("colorTarget", desc(256));
        let b = prov.texture("colorTarget", desc(256));
        assert_eq!(a, b);
        // A resolution change is a different transient resource.
        let c = prov.texture("colorTarget", desc(512));
        assert_ne!(a, c);
    }

    #[test]
    fn unused_entries_surface_in_the_sweep() {
        let prov = ProvisionalGraphics::new();
        let id = prov.texture("old", desc(128));
        let mut swept = Vec::new();
        for _ in 0..MAX_IDLE_FRAMES {
            swept.extend(prov.sweep());
        }
        assert_eq!(swept, vec![id]);
        // Requesting again revives the same key.
        assert_eq!(prov.texture("old", desc(128)), id);
    }
}
