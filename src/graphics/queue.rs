//! The recorded render queue.
//!
//! Prepare records an opaque sequence of GPU commands; dispatch replays it
//! in record order against the graphics backend. Recording is data-only:
//! commands reference assets by id and transient resources by provisional
//! id, and uniform payloads are staged into a byte arena owned by the queue,
//! so nothing here touches the GPU or holds backend handles.

use bytemuck::Pod;
use glam::{IVec2, UVec2};

use crate::assets::AssetId;
use crate::platform::gpu::{AttachmentLayer, BlendMode, DepthFunc, UniformValue};

use super::provisional::{ProvisionalFramebufferId, ProvisionalTextureId};

/// A texture reference inside the queue: either a loaded asset or a
/// transient resource from the provisional cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureRef {
    Asset(AssetId),
    Provisional(ProvisionalTextureId),
}

/// Range into the queue's staged uniform data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformRange {
    pub offset: u32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    PushScope(&'static str),
    PopScope,

    /// Bind a provisional framebuffer, or the window with `None`.
    BindFramebuffer(Option<ProvisionalFramebufferId>),
    AttachColor {
        index: u32,
        texture: Option<TextureRef>,
        layer: AttachmentLayer,
    },
    AttachDepth {
        texture: Option<TextureRef>,
        layer: AttachmentLayer,
    },
    /// Validate the currently bound framebuffer.
    ValidateFramebuffer,

    BindTexture {
        unit: u32,
        texture: TextureRef,
    },
    BindProgram {
        program: AssetId,
        variant: u32,
    },
    BindModel(AssetId),

    Uniform {
        location: u32,
        value: UniformValue,
    },
    UniformBlock {
        binding: u32,
        range: UniformRange,
    },

    Viewport {
        origin: IVec2,
        size: UVec2,
    },
    Scissor(Option<(IVec2, UVec2)>),
    DepthTest(bool),
    DepthWrite(bool),
    DepthFunc(DepthFunc),
    ColorWrite(bool),
    Blending(BlendMode),
    Culling(bool),
    Clear {
        color: Option<[f32; 4]>,
        depth: bool,
        stencil: bool,
    },

    DrawInstanced {
        instances: u32,
    },

    /// Restore default pipeline state.
    ResetState,
}

/// A replayable sequence of GPU commands plus their staged uniform bytes.
#[derive(Debug, Default, PartialEq)]
pub struct RenderQueue {
    commands: Vec<RenderCommand>,
    uniform_data: Vec<u8>,
    draw_count: u32,
    instance_count: u32,
    primitive_count: u64,
}

impl RenderQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: RenderCommand) {
        if let RenderCommand::DrawInstanced { instances } = command {
            self.draw_count += 1;
            self.instance_count += instances;
        }
        self.commands.push(command);
    }

    /// Records a draw and tallies its primitives for the frame statistics.
    pub fn draw_instanced(&mut self, instances: u32, primitives_per_instance: u32) {
        self.primitive_count += u64::from(instances) * u64::from(primitives_per_instance);
        self.push(RenderCommand::DrawInstanced { instances });
    }

    // ── Uniform staging ────────────────────────────────────────────────────

    fn stage_bytes(&mut self, bytes: &[u8]) -> UniformRange {
        // std140 blocks bind at 16-byte granularity.
        let padding = (16 - self.uniform_data.len() % 16) % 16;
        self.uniform_data.extend(std::iter::repeat_n(0u8, padding));
        let offset = self.uniform_data.len() as u32;
        self.uniform_data.extend_from_slice(bytes);
        UniformRange {
            offset,
            size: bytes.len() as u32,
        }
    }

    /// Stages one Pod struct; bind it later with
    /// [`RenderQueue::bind_uniform_range`].
    pub fn stage_uniform_struct<T: Pod>(&mut self, value: &T) -> UniformRange {
        self.stage_bytes(bytemuck::bytes_of(value))
    }

    /// Stages a Pod array.
    pub fn stage_uniform_array<T: Pod>(&mut self, values: &[T]) -> UniformRange {
        self.stage_bytes(bytemuck::cast_slice(values))
    }

    pub fn bind_uniform_range(&mut self, binding: u32, range: UniformRange) {
        self.push(RenderCommand::UniformBlock { binding, range });
    }

    #[must_use]
    pub fn uniform_bytes(&self, range: UniformRange) -> &[u8] {
        &self.uniform_data[range.offset as usize..(range.offset + range.size) as usize]
    }

    // ── Introspection ──────────────────────────────────────────────────────

    #[must_use]
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[must_use]
    pub fn draw_count(&self) -> u32 {
        self.draw_count
    }

    #[must_use]
    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    #[must_use]
    pub fn primitive_count(&self) -> u64 {
        self.primitive_count
    }

    // ── Composition ────────────────────────────────────────────────────────

    /// Appends another queue, rebasing its uniform ranges.
    ///
    /// Per-camera and per-shadow-pass queues are recorded separately and
    /// merged in pass order at the end of prepare.
    pub fn append(&mut self, other: RenderQueue) {
        let base = {
            let padding = (16 - self.uniform_data.len() % 16) % 16;
            self.uniform_data.extend(std::iter::repeat_n(0u8, padding));
            self.uniform_data.len() as u32
        };
        self.uniform_data.extend_from_slice(&other.uniform_data);
        for mut command in other.commands {
            if let RenderCommand::UniformBlock { range, .. } = &mut command {
                range.offset += base;
            }
            self.commands.push(command);
        }
        self.draw_count += other.draw_count;
        self.instance_count += other.instance_count;
        self.primitive_count += other.primitive_count;
    }

    /// Clears the queue for re-recording; allocations are retained.
    pub fn reset(&mut self) {
        self.commands.clear();
        self.uniform_data.clear();
        self.draw_count = 0;
        self.instance_count = 0;
        self.primitive_count = 0;
    }
}
