//! Graphics dispatch: replays recorded queues on the GPU thread.
//!
//! Dispatch owns every backend handle. Assets referenced by id are uploaded
//! lazily on first use and cached; provisional ids resolve through the
//! transient registry and are recycled by the end-of-frame sweep. A failing
//! command is logged and skipped — a broken frame is dropped on the floor,
//! the engine keeps running.

use rustc_hash::FxHashMap;

use crate::assets::types::{ShaderProgram, TextureAsset, TextureTarget};
use crate::assets::{AssetId, AssetServer, Model};
use crate::platform::gpu::{
    FramebufferId, GraphicsApi, MeshId, ProgramId, TextureDesc, TextureId, TextureKind,
};

use super::provisional::{ProvisionalFramebufferId, ProvisionalGraphics, ProvisionalTextureId};
use super::queue::{RenderCommand, RenderQueue, TextureRef};

/// Backend handle caches of the dispatch thread.
#[derive(Default)]
pub struct GraphicsDispatch {
    meshes: FxHashMap<AssetId, MeshId>,
    textures: FxHashMap<AssetId, TextureId>,
    programs: FxHashMap<AssetId, ProgramId>,
    provisional_textures: FxHashMap<ProvisionalTextureId, TextureId>,
    framebuffers: FxHashMap<ProvisionalFramebufferId, FramebufferId>,
    /// Bound framebuffer, tracked for attachment commands.
    current_framebuffer: Option<FramebufferId>,
    /// Set when a bind failed; draws are skipped until the next bind.
    skip_draws: bool,
}

impl GraphicsDispatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes every command of `queue` in record order.
    ///
    /// Returns the number of failed commands; failures are logged and the
    /// remaining commands still run.
    pub fn execute(
        &mut self,
        queue: &RenderQueue,
        gpu: &mut dyn GraphicsApi,
        assets: &AssetServer,
        provisional: &ProvisionalGraphics,
    ) -> u32 {
        let mut errors = 0u32;
        self.current_framebuffer = None;
        self.skip_draws = false;

        for command in queue.commands() {
            if let Err(err) = self.execute_one(command, queue, gpu, assets, provisional) {
                errors += 1;
                log::error!("render command failed: {err} ({command:?})");
            }
        }
        if errors > 0 {
            log::warn!("{errors} render commands failed this frame");
        }
        errors
    }

    /// Ages the transient registry and destroys stale backend textures.
    pub fn end_frame(&mut self, gpu: &mut dyn GraphicsApi, provisional: &ProvisionalGraphics) {
        for stale in provisional.sweep() {
            if let Some(texture) = self.provisional_textures.remove(&stale) {
                gpu.destroy_texture(texture);
            }
        }
    }

    /// Drops the cached handle of a reloaded asset so the next use
    /// re-uploads it.
    pub fn invalidate_asset(&mut self, id: AssetId) {
        self.meshes.remove(&id);
        self.textures.remove(&id);
        self.programs.remove(&id);
    }

    // ── Resolution ─────────────────────────────────────────────────────────

    fn resolve_mesh(
        &mut self,
        id: AssetId,
        gpu: &mut dyn GraphicsApi,
        assets: &AssetServer,
    ) -> Option<MeshId> {
        if let Some(&mesh) = self.meshes.get(&id) {
            return Some(mesh);
        }
        let model = assets.get::<Model>(id)?;
        match gpu.create_mesh(&model) {
            Ok(mesh) => {
                self.meshes.insert(id, mesh);
                Some(mesh)
            }
            Err(err) => {
                log::error!("mesh upload failed for {}: {err}", assets.name_of(id));
                None
            }
        }
    }

    fn resolve_program(
        &mut self,
        id: AssetId,
        gpu: &mut dyn GraphicsApi,
        assets: &AssetServer,
    ) -> Option<ProgramId> {
        if let Some(&program) = self.programs.get(&id) {
            return Some(program);
        }
        let shader = assets.get::<ShaderProgram>(id)?;
        match gpu.create_program(&shader.label, &shader.vertex_source, &shader.fragment_source) {
            Ok(program) => {
                self.programs.insert(id, program);
                Some(program)
            }
            Err(err) => {
                log::error!("program compile failed for {}: {err}", assets.name_of(id));
                None
            }
        }
    }

    fn asset_texture(
        &mut self,
        id: AssetId,
        gpu: &mut dyn GraphicsApi,
        assets: &AssetServer,
    ) -> Option<TextureId> {
        if let Some(&texture) = self.textures.get(&id) {
            return Some(texture);
        }
        let asset = assets.get::<TextureAsset>(id)?;
        let kind = match asset.target {
            TextureTarget::D2 => TextureKind::D2,
            TextureTarget::D2Array { layers } => TextureKind::D2Array { layers },
            TextureTarget::D3 { depth } => TextureKind::D3 { depth },
            TextureTarget::Cube => TextureKind::Cube,
        };
        let desc = TextureDesc {
            resolution: glam::UVec2::new(asset.resolution.0, asset.resolution.1),
            kind,
            format: asset.format,
            mipmaps: asset.mipmaps,
        };
        let pixels = (!asset.pixels.is_empty()).then_some(asset.pixels.as_slice());
        match gpu.create_texture(&desc, pixels) {
            Ok(texture) => {
                if asset.mipmaps {
                    let _ = gpu.generate_mipmaps(texture);
                }
                self.textures.insert(id, texture);
                Some(texture)
            }
            Err(err) => {
                log::error!("texture upload failed for {}: {err}", assets.name_of(id));
                None
            }
        }
    }

    fn resolve_texture(
        &mut self,
        texture: TextureRef,
        gpu: &mut dyn GraphicsApi,
        assets: &AssetServer,
        provisional: &ProvisionalGraphics,
    ) -> Option<TextureId> {
        match texture {
            TextureRef::Asset(id) => self.asset_texture(id, gpu, assets),
            TextureRef::Provisional(id) => {
                if let Some(&texture) = self.provisional_textures.get(&id) {
                    return Some(texture);
                }
                let desc = provisional.texture_desc(id)?;
                match gpu.create_texture(&desc, None) {
                    Ok(texture) => {
                        self.provisional_textures.insert(id, texture);
                        Some(texture)
                    }
                    Err(err) => {
                        log::error!("transient texture allocation failed: {err}");
                        None
                    }
                }
            }
        }
    }

    fn resolve_framebuffer(
        &mut self,
        id: ProvisionalFramebufferId,
        gpu: &mut dyn GraphicsApi,
    ) -> Option<FramebufferId> {
        if let Some(&framebuffer) = self.framebuffers.get(&id) {
            return Some(framebuffer);
        }
        match gpu.create_framebuffer() {
            Ok(framebuffer) => {
                self.framebuffers.insert(id, framebuffer);
                Some(framebuffer)
            }
            Err(err) => {
                log::error!("framebuffer creation failed: {err}");
                None
            }
        }
    }

    // ── Execution ──────────────────────────────────────────────────────────

    fn execute_one(
        &mut self,
        command: &RenderCommand,
        queue: &RenderQueue,
        gpu: &mut dyn GraphicsApi,
        assets: &AssetServer,
        provisional: &ProvisionalGraphics,
    ) -> crate::errors::Result<()> {
        match command {
            RenderCommand::PushScope(label) => gpu.push_debug_group(label),
            RenderCommand::PopScope => gpu.pop_debug_group(),

            RenderCommand::BindFramebuffer(target) => {
                let framebuffer = match target {
                    Some(id) => self.resolve_framebuffer(*id, gpu),
                    None => None,
                };
                self.current_framebuffer = framebuffer;
                gpu.bind_framebuffer(framebuffer)?;
            }
            RenderCommand::AttachColor {
                index,
                texture,
                layer,
            } => {
                if let Some(framebuffer) = self.current_framebuffer {
                    let resolved = match texture {
                        Some(t) => self.resolve_texture(*t, gpu, assets, provisional),
                        None => None,
                    };
                    gpu.attach_color(framebuffer, *index, resolved, *layer)?;
                }
            }
            RenderCommand::AttachDepth { texture, layer } => {
                if let Some(framebuffer) = self.current_framebuffer {
                    let resolved = match texture {
                        Some(t) => self.resolve_texture(*t, gpu, assets, provisional),
                        None => None,
                    };
                    gpu.attach_depth(framebuffer, resolved, *layer)?;
                }
            }
            RenderCommand::ValidateFramebuffer => {
                if let Some(framebuffer) = self.current_framebuffer {
                    gpu.validate_framebuffer(framebuffer)?;
                }
            }

            RenderCommand::BindTexture { unit, texture } => {
                if let Some(resolved) = self.resolve_texture(*texture, gpu, assets, provisional) {
                    gpu.bind_texture(*unit, resolved)?;
                }
            }
            RenderCommand::BindProgram { program, variant } => {
                match self.resolve_program(*program, gpu, assets) {
                    Some(resolved) => {
                        self.skip_draws = false;
                        gpu.bind_program(resolved, *variant)?;
                    }
                    None => self.skip_draws = true,
                }
            }
            RenderCommand::BindModel(id) => match self.resolve_mesh(*id, gpu, assets) {
                Some(mesh) => {
                    self.skip_draws = false;
                    gpu.bind_mesh(mesh)?;
                }
                None => self.skip_draws = true,
            },

            RenderCommand::Uniform { location, value } => gpu.set_uniform(*location, value)?,
            RenderCommand::UniformBlock { binding, range } => {
                gpu.bind_uniform_block(*binding, queue.uniform_bytes(*range))?;
            }

            RenderCommand::Viewport { origin, size } => gpu.set_viewport(*origin, *size),
            RenderCommand::Scissor(rect) => gpu.set_scissor(*rect),
            RenderCommand::DepthTest(enabled) => gpu.set_depth_test(*enabled),
            RenderCommand::DepthWrite(enabled) => gpu.set_depth_write(*enabled),
            RenderCommand::DepthFunc(func) => gpu.set_depth_func(*func),
            RenderCommand::ColorWrite(enabled) => gpu.set_color_write(*enabled),
            RenderCommand::Blending(mode) => gpu.set_blending(*mode),
            RenderCommand::Culling(enabled) => gpu.set_culling(*enabled),
            RenderCommand::Clear {
                color,
                depth,
                stencil,
            } => gpu.clear(*color, *depth, *stencil),

            RenderCommand::DrawInstanced { instances } => {
                if !self.skip_draws {
                    gpu.draw_instanced(*instances)?;
                }
            }

            RenderCommand::ResetState => {
                gpu.set_depth_test(true);
                gpu.set_depth_write(true);
                gpu.set_depth_func(crate::platform::gpu::DepthFunc::Less);
                gpu.set_color_write(true);
                gpu.set_blending(crate::platform::gpu::BlendMode::None);
                gpu.set_culling(true);
                gpu.set_scissor(None);
            }
        }
        Ok(())
    }
}
