//! Text gathering and glyph layout.
//!
//! A text entity resolves its transcript (a literal or a text-pack entry
//! with positional parameters), lays the glyphs out into quads with
//! kerning, wrapping, and alignment, and draws them as instanced squares
//! over the font atlas.

use bumpalo::Bump;
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::assets::types::{FontFace, TextPack};
use crate::graphics::queue::{RenderCommand, RenderQueue, TextureRef};
use crate::graphics::uniforms::{gamma_to_linear, UniGlyph};
use crate::platform::gpu::{BlendMode, UniformValue};
use crate::scene::components::{TextAlign, TextFormat, TextSource};

use super::{builtin, conventions, PassData, PrepareContext, TextDraw};

/// Resolves the transcript string of a text component.
fn resolve_text(ctx: &PrepareContext<'_>, source: &TextSource) -> Option<String> {
    match source {
        TextSource::Literal(text) => Some(text.clone()),
        TextSource::Pack {
            pack,
            name,
            parameters,
        } => {
            let pack = ctx.assets.get::<TextPack>(*pack)?;
            pack.format(*name, parameters)
        }
    }
}

/// Gathers every visible text of the snapshot into `pass`.
pub fn gather_texts(ctx: &PrepareContext<'_>, pass: &mut PassData) {
    for text in &ctx.snapshot.texts {
        if text.text.scene_mask & pass.scene_mask == 0 {
            continue;
        }
        let Some(font) = ctx.assets.get::<FontFace>(text.text.font) else {
            continue;
        };
        let Some(transcript) = resolve_text(ctx, &text.text.source) else {
            continue;
        };
        let glyphs = font.transcript(&transcript);
        if glyphs.is_empty() {
            continue;
        }

        let (quads, size) = layout(&font, &glyphs, &text.text.format);
        if quads.is_empty() {
            continue;
        }

        // Center the paragraph on the entity origin.
        let model = text.transform.interpolate(ctx.interpolation_factor).to_mat4()
            * Mat4::from_translation(Vec3::new(-size.x * 0.5, size.y * 0.5, 0.0));
        pass.texts.push(TextDraw {
            model,
            font: text.text.font,
            atlas: font.atlas_texture,
            glyphs: quads,
            color: gamma_to_linear(text.text.color) * text.text.intensity,
        });
    }
}

/// Lays glyphs out into atlas quads.
///
/// Returns the quads and the overall paragraph size. The layout cursor
/// walks left to right, `y` grows downward one `line_height × line_spacing`
/// per line, lines wrap at `wrap_width`, and each finished line shifts by
/// its alignment.
#[must_use]
pub fn layout(font: &FontFace, glyphs: &[u32], format: &TextFormat) -> (Vec<UniGlyph>, Vec2) {
    let scratch = Bump::new();
    let scale = format.size;
    let line_advance = font.line_height * format.line_spacing * scale;

    // First pass: place glyphs with wrapping, remember line extents.
    let mut quads = Vec::with_capacity(glyphs.len());
    let mut lines: bumpalo::collections::Vec<'_, (usize, f32)> =
        bumpalo::collections::Vec::new_in(&scratch);
    let mut line_first_quad = 0;
    let mut cursor = Vec2::ZERO;
    let mut previous: Option<u32> = None;

    for &glyph_index in glyphs {
        let Some(glyph) = font.glyphs.get(glyph_index as usize) else {
            continue;
        };
        if let Some(prev) = previous {
            cursor.x += font.kerning(prev, glyph_index) * scale;
        }
        let advance = glyph.advance * scale;

        if cursor.x + advance > format.wrap_width && cursor.x > 0.0 {
            lines.push((line_first_quad, cursor.x));
            line_first_quad = quads.len();
            cursor.x = 0.0;
            cursor.y += line_advance;
            previous = None;
        }

        quads.push(UniGlyph {
            rect: Vec4::new(
                cursor.x + glyph.bearing.x * scale,
                -(cursor.y + (font.line_height - glyph.bearing.y) * scale),
                glyph.size.x * scale,
                glyph.size.y * scale,
            ),
            uv: Vec4::from(glyph.uv),
        });
        cursor.x += advance;
        previous = Some(glyph_index);
    }
    lines.push((line_first_quad, cursor.x));

    let width = lines.iter().map(|&(_, w)| w).fold(0.0f32, f32::max);

    // Second pass: shift each line by its alignment against the paragraph.
    if format.align != TextAlign::Left {
        let mut bounds = lines.iter().peekable();
        while let Some(&(first, line_width)) = bounds.next() {
            let end = bounds.peek().map_or(quads.len(), |&&(next, _)| next);
            let shift = match format.align {
                TextAlign::Left => 0.0,
                TextAlign::Center => (width - line_width) * 0.5,
                TextAlign::Right => width - line_width,
            };
            for quad in &mut quads[first..end] {
                quad.rect.x += shift;
            }
        }
    }

    (quads, Vec2::new(width, cursor.y + line_advance))
}

/// Records the text draws of a pass; standard pass only.
pub fn record_texts(pass: &PassData, queue: &mut RenderQueue) {
    if pass.texts.is_empty() {
        return;
    }
    queue.push(RenderCommand::PushScope("texts"));
    queue.push(RenderCommand::DepthTest(true));
    queue.push(RenderCommand::DepthWrite(false));
    queue.push(RenderCommand::Culling(false));
    queue.push(RenderCommand::Blending(BlendMode::AlphaTransparency));
    queue.push(RenderCommand::BindModel(builtin::id(builtin::MODEL_SQUARE)));
    queue.push(RenderCommand::BindProgram {
        program: builtin::id(builtin::SHADER_FONT),
        variant: 0,
    });

    for draw in &pass.texts {
        queue.push(RenderCommand::BindTexture {
            unit: conventions::TEX_ALBEDO,
            texture: TextureRef::Asset(draw.atlas),
        });
        queue.push(RenderCommand::Uniform {
            location: conventions::UNI_TEXT_MVP,
            value: UniformValue::Mat4(pass.view_proj * draw.model),
        });
        queue.push(RenderCommand::Uniform {
            location: conventions::UNI_TEXT_COLOR,
            value: UniformValue::Vec3(draw.color),
        });
        for chunk in draw.glyphs.chunks(conventions::MAX_GLYPHS as usize) {
            let range = queue.stage_uniform_array(chunk);
            queue.bind_uniform_range(conventions::BLOCK_GLYPHS, range);
            queue.draw_instanced(chunk.len() as u32, 2);
        }
    }

    queue.push(RenderCommand::ResetState);
    queue.push(RenderCommand::PopScope);
}
