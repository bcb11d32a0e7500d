//! Graphics backend contract.
//!
//! An OpenGL-class API: vertex/index buffers bundled as meshes, 2D/array/3D/
//! cube textures, framebuffers with color and depth attachments, programs
//! with uniform blocks and variant selection, indexed instanced draws,
//! viewport/scissor, depth state, blending, debug labels, and a synchronous
//! finish. The recorded render queue maps 1:1 onto this operation set; every
//! operation reports success or failure so dispatch can log and continue.
//!
//! All calls happen on the graphics dispatch thread.

use glam::{IVec2, Mat4, UVec2, Vec2, Vec3, Vec4};
use smallvec::SmallVec;

use crate::assets::types::Model;
use crate::errors::Result;

// ─── Opaque resource ids ──────────────────────────────────────────────────────

macro_rules! backend_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);
    };
}

backend_id!(
    /// A mesh: vertex buffer + index buffer + attribute layout.
    MeshId
);
backend_id!(TextureId);
backend_id!(FramebufferId);
backend_id!(ProgramId);

// ─── Descriptors ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8,
    /// HDR intermediate target format.
    Rgb16F,
    Rgba16F,
    /// Single-channel, for luminance collection.
    R16F,
    Depth16,
    Depth24,
    Depth32,
}

impl TextureFormat {
    #[must_use]
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth16 | Self::Depth24 | Self::Depth32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    D2,
    D2Array { layers: u32 },
    D3 { depth: u32 },
    Cube,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub resolution: UVec2,
    pub kind: TextureKind,
    pub format: TextureFormat,
    pub mipmaps: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthFunc {
    Less,
    LessEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    None,
    /// `src + (1 - src.a) * dst`, colors premultiplied.
    PremultipliedTransparency,
    /// Classic `src.a * src + (1 - src.a) * dst`.
    AlphaTransparency,
    Additive,
}

/// A uniform write. Array forms upload consecutive locations; they are
/// small (shader routine selectors, kernel weights) and stay inline.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    F32(f32),
    I32(i32),
    U32(u32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    U32Array(SmallVec<[u32; 8]>),
    F32Array(SmallVec<[f32; 8]>),
}

/// Attachment layer selector for array and cube textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentLayer {
    /// The whole texture (2D attachments).
    Whole,
    /// One layer of an array texture.
    Layer(u32),
    /// One face of a cube texture, 0..6.
    CubeFace(u32),
}

// ─── The contract ─────────────────────────────────────────────────────────────

/// The operation set the engine requires of a graphics backend.
#[allow(clippy::missing_errors_doc)]
pub trait GraphicsApi: Send {
    // Resource creation
    fn create_mesh(&mut self, model: &Model) -> Result<MeshId>;
    fn create_texture(&mut self, desc: &TextureDesc, pixels: Option<&[u8]>) -> Result<TextureId>;
    fn create_program(&mut self, label: &str, vertex: &str, fragment: &str) -> Result<ProgramId>;
    fn create_framebuffer(&mut self) -> Result<FramebufferId>;
    fn destroy_texture(&mut self, texture: TextureId);

    // Framebuffer wiring
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) -> Result<()>;
    fn attach_color(
        &mut self,
        framebuffer: FramebufferId,
        index: u32,
        texture: Option<TextureId>,
        layer: AttachmentLayer,
    ) -> Result<()>;
    fn attach_depth(
        &mut self,
        framebuffer: FramebufferId,
        texture: Option<TextureId>,
        layer: AttachmentLayer,
    ) -> Result<()>;
    fn validate_framebuffer(&mut self, framebuffer: FramebufferId) -> Result<()>;

    // Binding
    fn bind_mesh(&mut self, mesh: MeshId) -> Result<()>;
    fn bind_program(&mut self, program: ProgramId, variant: u32) -> Result<()>;
    fn bind_texture(&mut self, unit: u32, texture: TextureId) -> Result<()>;
    fn generate_mipmaps(&mut self, texture: TextureId) -> Result<()>;

    // Fixed state
    fn set_viewport(&mut self, origin: IVec2, size: UVec2);
    fn set_scissor(&mut self, rect: Option<(IVec2, UVec2)>);
    fn set_depth_test(&mut self, enabled: bool);
    fn set_depth_write(&mut self, enabled: bool);
    fn set_depth_func(&mut self, func: DepthFunc);
    fn set_color_write(&mut self, enabled: bool);
    fn set_blending(&mut self, mode: BlendMode);
    fn set_culling(&mut self, enabled: bool);
    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool, stencil: bool);

    // Uniforms
    fn set_uniform(&mut self, location: u32, value: &UniformValue) -> Result<()>;
    fn bind_uniform_block(&mut self, binding: u32, data: &[u8]) -> Result<()>;

    // Drawing
    fn draw_instanced(&mut self, instances: u32) -> Result<()>;

    // Diagnostics & synchronization
    fn push_debug_group(&mut self, label: &str);
    fn pop_debug_group(&mut self);
    /// Blocks until all submitted work completes; bounds frame latency.
    fn finish(&mut self);
}

// ─── Recording test double ────────────────────────────────────────────────────

/// Backend that records every call as a line of text.
///
/// The pipeline tests use it to assert dispatch order and coverage without a
/// GPU. Ids are handed out sequentially; draws tally into counters.
#[derive(Default)]
pub struct RecordingGpu {
    next_id: u32,
    pub ops: Vec<String>,
    pub draw_calls: u32,
    pub drawn_instances: u32,
    pub finish_count: u32,
}

impl RecordingGpu {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, op: impl Into<String>) {
        self.ops.push(op.into());
    }

    /// Lines recorded so far that contain `needle`.
    #[must_use]
    pub fn count_ops(&self, needle: &str) -> usize {
        self.ops.iter().filter(|op| op.contains(needle)).count()
    }
}

impl GraphicsApi for RecordingGpu {
    fn create_mesh(&mut self, model: &Model) -> Result<MeshId> {
        let id = self.fresh_id();
        self.record(format!(
            "create_mesh id={id} vertices={} indices={}",
            model.vertex_count(),
            model.index_count()
        ));
        Ok(MeshId(id))
    }

    fn create_texture(&mut self, desc: &TextureDesc, pixels: Option<&[u8]>) -> Result<TextureId> {
        let id = self.fresh_id();
        self.record(format!(
            "create_texture id={id} {}x{} {:?} {:?} data={}",
            desc.resolution.x,
            desc.resolution.y,
            desc.kind,
            desc.format,
            pixels.is_some()
        ));
        Ok(TextureId(id))
    }

    fn create_program(&mut self, label: &str, _vertex: &str, _fragment: &str) -> Result<ProgramId> {
        let id = self.fresh_id();
        self.record(format!("create_program id={id} label={label}"));
        Ok(ProgramId(id))
    }

    fn create_framebuffer(&mut self) -> Result<FramebufferId> {
        let id = self.fresh_id();
        self.record(format!("create_framebuffer id={id}"));
        Ok(FramebufferId(id))
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.record(format!("destroy_texture id={}", texture.0));
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) -> Result<()> {
        match framebuffer {
            Some(fb) => self.record(format!("bind_framebuffer id={}", fb.0)),
            None => self.record("bind_framebuffer window"),
        }
        Ok(())
    }

    fn attach_color(
        &mut self,
        framebuffer: FramebufferId,
        index: u32,
        texture: Option<TextureId>,
        layer: AttachmentLayer,
    ) -> Result<()> {
        self.record(format!(
            "attach_color fb={} index={index} tex={:?} layer={layer:?}",
            framebuffer.0,
            texture.map(|t| t.0)
        ));
        Ok(())
    }

    fn attach_depth(
        &mut self,
        framebuffer: FramebufferId,
        texture: Option<TextureId>,
        layer: AttachmentLayer,
    ) -> Result<()> {
        self.record(format!(
            "attach_depth fb={} tex={:?} layer={layer:?}",
            framebuffer.0,
            texture.map(|t| t.0)
        ));
        Ok(())
    }

    fn validate_framebuffer(&mut self, framebuffer: FramebufferId) -> Result<()> {
        self.record(format!("validate_framebuffer id={}", framebuffer.0));
        Ok(())
    }

    fn bind_mesh(&mut self, mesh: MeshId) -> Result<()> {
        self.record(format!("bind_mesh id={}", mesh.0));
        Ok(())
    }

    fn bind_program(&mut self, program: ProgramId, variant: u32) -> Result<()> {
        self.record(format!("bind_program id={} variant={variant}", program.0));
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) -> Result<()> {
        self.record(format!("bind_texture unit={unit} id={}", texture.0));
        Ok(())
    }

    fn generate_mipmaps(&mut self, texture: TextureId) -> Result<()> {
        self.record(format!("generate_mipmaps id={}", texture.0));
        Ok(())
    }

    fn set_viewport(&mut self, origin: IVec2, size: UVec2) {
        self.record(format!(
            "set_viewport {},{} {}x{}",
            origin.x, origin.y, size.x, size.y
        ));
    }

    fn set_scissor(&mut self, rect: Option<(IVec2, UVec2)>) {
        self.record(format!("set_scissor {rect:?}"));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.record(format!("set_depth_test {enabled}"));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.record(format!("set_depth_write {enabled}"));
    }

    fn set_depth_func(&mut self, func: DepthFunc) {
        self.record(format!("set_depth_func {func:?}"));
    }

    fn set_color_write(&mut self, enabled: bool) {
        self.record(format!("set_color_write {enabled}"));
    }

    fn set_blending(&mut self, mode: BlendMode) {
        self.record(format!("set_blending {mode:?}"));
    }

    fn set_culling(&mut self, enabled: bool) {
        self.record(format!("set_culling {enabled}"));
    }

    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool, stencil: bool) {
        self.record(format!("clear color={} depth={depth} stencil={stencil}", color.is_some()));
    }

    fn set_uniform(&mut self, location: u32, value: &UniformValue) -> Result<()> {
        self.record(format!("set_uniform loc={location} {value:?}"));
        Ok(())
    }

    fn bind_uniform_block(&mut self, binding: u32, data: &[u8]) -> Result<()> {
        self.record(format!("bind_uniform_block binding={binding} bytes={}", data.len()));
        Ok(())
    }

    fn draw_instanced(&mut self, instances: u32) -> Result<()> {
        self.draw_calls += 1;
        self.drawn_instances += instances;
        self.record(format!("draw_instanced instances={instances}"));
        Ok(())
    }

    fn push_debug_group(&mut self, label: &str) {
        self.record(format!("push_debug_group {label}"));
    }

    fn pop_debug_group(&mut self) {
        self.record("pop_debug_group");
    }

    fn finish(&mut self) {
        self.finish_count += 1;
        self.record("finish");
    }
}
