//! Font atlas pack format.
//!
//! Layout: magic `EMFT`, version, header (glyph count, line height, max
//! glyph size, atlas size, atlas texture hash, kerning flag, charmap count),
//! per-glyph uv rect + size + bearing + advance, the optional dense
//! `glyph_count²` kerning table, and the sorted char→glyph table.

use glam::Vec2;

use crate::assets::ids::AssetId;
use crate::assets::types::{FontFace, Glyph};
use crate::errors::Result;

use super::{ByteReader, ByteWriter};

const MAGIC: &[u8; 4] = b"EMFT";
const VERSION: u32 = 1;

#[must_use]
pub fn encode_font(font: &FontFace) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.put_bytes(MAGIC);
    w.put_u32(VERSION);

    w.put_u32(font.glyphs.len() as u32);
    w.put_f32(font.line_height);
    w.put_vec2(font.max_glyph_size);
    w.put_u32(font.atlas_size.0);
    w.put_u32(font.atlas_size.1);
    w.put_u32(font.atlas_texture.raw());
    w.put_u32(u32::from(font.kerning.is_some()));
    w.put_u32(font.charmap.len() as u32);

    for glyph in &font.glyphs {
        for uv in glyph.uv {
            w.put_f32(uv);
        }
        w.put_vec2(glyph.size);
        w.put_vec2(glyph.bearing);
        w.put_f32(glyph.advance);
    }

    if let Some(kerning) = &font.kerning {
        for &k in kerning {
            w.put_f32(k);
        }
    }

    for &(ch, glyph) in &font.charmap {
        w.put_u32(ch);
        w.put_u32(glyph);
    }
    w.finish()
}

pub fn decode_font(bytes: &[u8]) -> Result<FontFace> {
    let mut r = ByteReader::new("font", bytes);
    r.expect_magic(MAGIC, VERSION)?;

    let glyph_count = r.get_u32()? as usize;
    let line_height = r.get_f32()?;
    let max_glyph_size = r.get_vec2()?;
    let atlas_size = (r.get_u32()?, r.get_u32()?);
    let atlas_texture = AssetId::from_raw(r.get_u32()?);
    let has_kerning = r.get_u32()? != 0;
    let charmap_count = r.get_u32()? as usize;

    let mut glyphs = Vec::with_capacity(glyph_count);
    for _ in 0..glyph_count {
        let mut uv = [0f32; 4];
        for v in &mut uv {
            *v = r.get_f32()?;
        }
        glyphs.push(Glyph {
            uv,
            size: r.get_vec2()?,
            bearing: r.get_vec2()?,
            advance: r.get_f32()?,
        });
    }

    let kerning = if has_kerning {
        let mut table = Vec::with_capacity(glyph_count * glyph_count);
        for _ in 0..glyph_count * glyph_count {
            table.push(r.get_f32()?);
        }
        Some(table)
    } else {
        None
    };

    let mut charmap: Vec<(u32, u32)> = Vec::with_capacity(charmap_count);
    for _ in 0..charmap_count {
        let ch = r.get_u32()?;
        let glyph = r.get_u32()?;
        if glyph as usize >= glyph_count {
            return Err(r.error(format!("charmap references glyph {glyph} of {glyph_count}")));
        }
        if let Some(&(prev, _)) = charmap.last() {
            if ch <= prev {
                return Err(r.error("charmap not sorted by character"));
            }
        }
        charmap.push((ch, glyph));
    }
    r.expect_end()?;

    Ok(FontFace {
        line_height,
        max_glyph_size,
        atlas_size,
        atlas_texture,
        glyphs,
        kerning,
        charmap,
    })
}
