//! Post-processing effect plan.
//!
//! Effects run in a fixed order — ambient occlusion, depth of field,
//! eye-adaptation collect, bloom, eye-adaptation apply, tonemap + gamma,
//! FXAA, sharpen — each as a full-screen pass ping-ponging between the
//! camera's color target and a transient HDR intermediate. If the chain
//! ends on the intermediate, a final blit folds it back into the color
//! target so the camera's blit stage has one canonical source.

use glam::{IVec2, UVec2, Vec2, Vec4};

use crate::graphics::provisional::ProvisionalTextureId;
use crate::graphics::queue::{RenderCommand, RenderQueue, TextureRef};
use crate::graphics::provisional::ProvisionalFramebufferId;
use crate::platform::gpu::{AttachmentLayer, BlendMode, DepthFunc, TextureDesc, TextureFormat, TextureKind, UniformValue};
use crate::scene::components::{CameraComponent, EffectsFlags};

use super::{builtin, conventions, PrepareContext};

/// Effect shader asset names, in chain order.
pub mod shaders {
    pub const AMBIENT_OCCLUSION: &str = "ember/shader/effects/ssao";
    pub const DEPTH_OF_FIELD: &str = "ember/shader/effects/dof";
    pub const EYE_ADAPTATION_COLLECT: &str = "ember/shader/effects/eye_collect";
    pub const BLOOM: &str = "ember/shader/effects/bloom";
    pub const EYE_ADAPTATION_APPLY: &str = "ember/shader/effects/eye_apply";
    pub const TONEMAP: &str = "ember/shader/effects/tonemap";
    pub const FXAA: &str = "ember/shader/effects/fxaa";
    pub const SHARPEN: &str = "ember/shader/effects/sharpen";
}

/// Uniform locations of the effect shaders.
mod uni {
    pub const PARAMS0: u32 = 8;
    pub const PARAMS1: u32 = 9;
}

struct EffectChain<'q> {
    queue: &'q mut RenderQueue,
    framebuffer: ProvisionalFramebufferId,
    resolution: UVec2,
    source: ProvisionalTextureId,
    target: ProvisionalTextureId,
}

impl EffectChain<'_> {
    /// Records one full-screen pass from `source` into `target`, then swaps
    /// the pair.
    fn pass(
        &mut self,
        shader: &str,
        extra_inputs: &[(u32, TextureRef)],
        uniforms: &[(u32, UniformValue)],
    ) {
        self.pass_into(shader, extra_inputs, uniforms, None);
        std::mem::swap(&mut self.source, &mut self.target);
    }

    /// Records a pass into an explicit output without touching the ping-pong
    /// pair (used by the eye-adaptation collect stage).
    fn pass_into(
        &mut self,
        shader: &str,
        extra_inputs: &[(u32, TextureRef)],
        uniforms: &[(u32, UniformValue)],
        output: Option<(ProvisionalTextureId, UVec2)>,
    ) {
        let (out_texture, out_resolution) = output.unwrap_or((self.target, self.resolution));
        let queue = &mut *self.queue;
        queue.push(RenderCommand::BindFramebuffer(Some(self.framebuffer)));
        queue.push(RenderCommand::AttachColor {
            index: 0,
            texture: Some(TextureRef::Provisional(out_texture)),
            layer: AttachmentLayer::Whole,
        });
        queue.push(RenderCommand::AttachDepth {
            texture: None,
            layer: AttachmentLayer::Whole,
        });
        queue.push(RenderCommand::ValidateFramebuffer);
        queue.push(RenderCommand::Viewport {
            origin: IVec2::ZERO,
            size: out_resolution,
        });
        queue.push(RenderCommand::DepthTest(false));
        queue.push(RenderCommand::DepthWrite(false));
        queue.push(RenderCommand::DepthFunc(DepthFunc::Always));
        queue.push(RenderCommand::Blending(BlendMode::None));
        queue.push(RenderCommand::BindModel(builtin::id(builtin::MODEL_SQUARE)));
        queue.push(RenderCommand::BindProgram {
            program: builtin::id(shader),
            variant: 0,
        });
        queue.push(RenderCommand::BindTexture {
            unit: 0,
            texture: TextureRef::Provisional(self.source),
        });
        for &(unit, texture) in extra_inputs {
            queue.push(RenderCommand::BindTexture { unit, texture });
        }
        queue.push(RenderCommand::Uniform {
            location: conventions::UNI_TEXEL_SIZE,
            value: UniformValue::Vec2(Vec2::new(
                1.0 / out_resolution.x as f32,
                1.0 / out_resolution.y as f32,
            )),
        });
        for (location, value) in uniforms {
            queue.push(RenderCommand::Uniform {
                location: *location,
                value: value.clone(),
            });
        }
        queue.draw_instanced(1, 2);
    }
}

/// Records the enabled effects of a camera.
pub fn record_effects(
    ctx: &PrepareContext<'_>,
    camera: &CameraComponent,
    resolution: UVec2,
    color: ProvisionalTextureId,
    depth: ProvisionalTextureId,
    framebuffer: ProvisionalFramebufferId,
    queue: &mut RenderQueue,
) {
    let flags = effective_flags(ctx, camera);
    if flags.is_empty() {
        return;
    }

    queue.push(RenderCommand::PushScope("effects"));

    let intermediate = ctx.provisional.texture(
        &format!("effectTarget_{}x{}", resolution.x, resolution.y),
        TextureDesc {
            resolution,
            kind: TextureKind::D2,
            format: TextureFormat::Rgb16F,
            mipmaps: false,
        },
    );
    let mut chain = EffectChain {
        queue,
        framebuffer,
        resolution,
        source: color,
        target: intermediate,
    };
    let fx = &camera.effects;

    if flags.contains(EffectsFlags::AMBIENT_OCCLUSION) {
        let ao = &fx.ambient_occlusion;
        chain.pass(
            shaders::AMBIENT_OCCLUSION,
            &[(conventions::TEX_DEPTH, TextureRef::Provisional(depth))],
            &[(
                uni::PARAMS0,
                UniformValue::Vec4(Vec4::new(ao.world_radius, ao.strength, ao.bias, 0.0)),
            )],
        );
    }

    if flags.contains(EffectsFlags::DEPTH_OF_FIELD) {
        let dof = &fx.depth_of_field;
        chain.pass(
            shaders::DEPTH_OF_FIELD,
            &[(conventions::TEX_DEPTH, TextureRef::Provisional(depth))],
            &[(
                uni::PARAMS0,
                UniformValue::Vec4(Vec4::new(
                    dof.focus_distance,
                    dof.focus_radius,
                    dof.blend_radius,
                    0.0,
                )),
            )],
        );
    }

    // Eye adaptation measures the scene before bloom brightens it and
    // applies the exposure after.
    let eye_texture = flags.contains(EffectsFlags::EYE_ADAPTATION).then(|| {
        let eye = ctx.provisional.texture(
            &format!("eyeAdapt_{}x{}", resolution.x, resolution.y),
            TextureDesc {
                resolution: UVec2::splat(1),
                kind: TextureKind::D2,
                format: TextureFormat::R16F,
                mipmaps: false,
            },
        );
        let ea = &fx.eye_adaptation;
        chain.pass_into(
            shaders::EYE_ADAPTATION_COLLECT,
            &[],
            &[(
                uni::PARAMS0,
                UniformValue::Vec4(Vec4::new(ea.darker_speed, ea.lighter_speed, 0.0, 0.0)),
            )],
            Some((eye, UVec2::splat(1))),
        );
        eye
    });

    if flags.contains(EffectsFlags::BLOOM) {
        let bloom = &fx.bloom;
        chain.pass(
            shaders::BLOOM,
            &[],
            &[(
                uni::PARAMS0,
                UniformValue::Vec4(Vec4::new(
                    bloom.threshold,
                    bloom.blur_passes as f32,
                    0.0,
                    0.0,
                )),
            )],
        );
    }

    if let Some(eye) = eye_texture {
        let ea = &fx.eye_adaptation;
        chain.pass(
            shaders::EYE_ADAPTATION_APPLY,
            &[(1, TextureRef::Provisional(eye))],
            &[(
                uni::PARAMS0,
                UniformValue::Vec4(Vec4::new(ea.key, 0.0, 0.0, 0.0)),
            )],
        );
    }

    if flags.intersects(EffectsFlags::TONE_MAPPING | EffectsFlags::GAMMA_CORRECTION) {
        let tm = &fx.tonemap;
        // Per-camera gamma wins when set; otherwise the engine-wide config
        // value applies.
        let gamma = if flags.contains(EffectsFlags::GAMMA_CORRECTION) {
            if fx.gamma > 0.0 { fx.gamma } else { ctx.gamma }
        } else {
            1.0
        };
        chain.pass(
            shaders::TONEMAP,
            &[],
            &[
                (
                    uni::PARAMS0,
                    UniformValue::Vec4(Vec4::new(
                        tm.shoulder_strength,
                        tm.linear_strength,
                        tm.white_cutoff,
                        gamma,
                    )),
                ),
                (
                    uni::PARAMS1,
                    UniformValue::U32(u32::from(flags.contains(EffectsFlags::TONE_MAPPING))),
                ),
            ],
        );
    }

    if flags.contains(EffectsFlags::ANTI_ALIASING) {
        chain.pass(shaders::FXAA, &[], &[]);
    }

    if flags.contains(EffectsFlags::SHARPENING) {
        chain.pass(
            shaders::SHARPEN,
            &[],
            &[(
                uni::PARAMS0,
                UniformValue::Vec4(Vec4::new(fx.sharpen.strength, 0.0, 0.0, 0.0)),
            )],
        );
    }

    // An odd number of passes leaves the result on the intermediate; fold it
    // back so the final blit always reads the color target.
    if chain.source != color {
        chain.pass_into(builtin::SHADER_BLIT, &[], &[], Some((color, resolution)));
    }

    queue.push(RenderCommand::ResetState);
    queue.push(RenderCommand::PopScope);
}

fn effective_flags(ctx: &PrepareContext<'_>, camera: &CameraComponent) -> EffectsFlags {
    let mut flags = camera.effects.flags;
    if ctx.disable_ambient_occlusion {
        flags.remove(EffectsFlags::AMBIENT_OCCLUSION);
    }
    if ctx.disable_bloom {
        flags.remove(EffectsFlags::BLOOM);
    }
    flags
}
