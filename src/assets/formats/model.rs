//! Model pack format.
//!
//! Layout:
//! - magic `EMDL`, version
//! - header: primitive type, vertex count, index count, material blob size,
//!   bone count, vertex attribute flags, render flags, AABB, four texture
//!   name hashes
//! - material blob
//! - vertex stream, interleaved per vertex: position, optional uv2 *or* uv3,
//!   optional normal, optional tangent+bitangent, optional bone indices
//!   (`u16 × 4`) + weights (`f32 × 4`)
//! - 32-bit indices

use glam::Vec3;

use crate::assets::ids::AssetId;
use crate::assets::types::{
    Aabb, BoneVertex, MeshRenderFlags, Model, PrimitiveType, VertexUvs, MAX_TEXTURES_PER_MATERIAL,
};
use crate::errors::Result;

use super::{ByteReader, ByteWriter};

const MAGIC: &[u8; 4] = b"EMDL";
const VERSION: u32 = 1;

// Vertex attribute flags.
const ATTR_UV2: u32 = 1 << 0;
const ATTR_UV3: u32 = 1 << 1;
const ATTR_NORMAL: u32 = 1 << 2;
const ATTR_TANGENT: u32 = 1 << 3;
const ATTR_BONES: u32 = 1 << 4;

fn primitive_code(p: PrimitiveType) -> u32 {
    match p {
        PrimitiveType::Triangles => 0,
        PrimitiveType::Lines => 1,
        PrimitiveType::Points => 2,
    }
}

fn attr_flags(model: &Model) -> u32 {
    let mut flags = 0;
    match model.uvs {
        VertexUvs::None => {}
        VertexUvs::Uv2(_) => flags |= ATTR_UV2,
        VertexUvs::Uv3(_) => flags |= ATTR_UV3,
    }
    if !model.normals.is_empty() {
        flags |= ATTR_NORMAL;
    }
    if !model.tangents.is_empty() {
        flags |= ATTR_TANGENT;
    }
    if !model.bones.is_empty() {
        flags |= ATTR_BONES;
    }
    flags
}

#[must_use]
pub fn encode_model(model: &Model) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.put_bytes(MAGIC);
    w.put_u32(VERSION);

    w.put_u32(primitive_code(model.primitive));
    w.put_u32(model.vertex_count());
    w.put_u32(model.index_count());
    w.put_u32(model.material.len() as u32);
    w.put_u32(model.bone_count);
    w.put_u32(model.skeleton.raw());
    w.put_u32(attr_flags(model));
    w.put_u32(model.flags.bits());
    w.put_vec3(model.aabb.min);
    w.put_vec3(model.aabb.max);
    for name in model.texture_names {
        w.put_u32(name.raw());
    }

    w.put_bytes(&model.material);

    for i in 0..model.positions.len() {
        w.put_vec3(model.positions[i]);
        match &model.uvs {
            VertexUvs::None => {}
            VertexUvs::Uv2(uvs) => w.put_vec2(uvs[i]),
            VertexUvs::Uv3(uvs) => w.put_vec3(uvs[i]),
        }
        if !model.normals.is_empty() {
            w.put_vec3(model.normals[i]);
        }
        if !model.tangents.is_empty() {
            let (t, b) = model.tangents[i];
            w.put_vec3(t);
            w.put_vec3(b);
        }
        if !model.bones.is_empty() {
            let bone = model.bones[i];
            for idx in bone.indices {
                w.put_u16(idx);
            }
            for weight in bone.weights {
                w.put_f32(weight);
            }
        }
    }

    for &index in &model.indices {
        w.put_u32(index);
    }
    w.finish()
}

pub fn decode_model(bytes: &[u8]) -> Result<Model> {
    let mut r = ByteReader::new("model", bytes);
    r.expect_magic(MAGIC, VERSION)?;

    let primitive = match r.get_u32()? {
        0 => PrimitiveType::Triangles,
        1 => PrimitiveType::Lines,
        2 => PrimitiveType::Points,
        other => return Err(r.error(format!("unknown primitive type {other}"))),
    };
    let vertex_count = r.get_u32()? as usize;
    let index_count = r.get_u32()? as usize;
    let material_size = r.get_u32()? as usize;
    let bone_count = r.get_u32()?;
    let skeleton = AssetId::from_raw(r.get_u32()?);
    let attrs = r.get_u32()?;
    let flags = MeshRenderFlags::from_bits(r.get_u32()?)
        .ok_or_else(|| r.error("unknown render flags"))?;
    let aabb = Aabb::new(r.get_vec3()?, r.get_vec3()?);
    let mut texture_names = [AssetId::INVALID; MAX_TEXTURES_PER_MATERIAL];
    for name in &mut texture_names {
        *name = AssetId::from_raw(r.get_u32()?);
    }
    if attrs & ATTR_UV2 != 0 && attrs & ATTR_UV3 != 0 {
        return Err(r.error("both uv2 and uv3 attribute flags set"));
    }

    let material = r.get_bytes(material_size)?;

    let mut positions = Vec::with_capacity(vertex_count);
    let mut uvs = match attrs {
        a if a & ATTR_UV2 != 0 => VertexUvs::Uv2(Vec::with_capacity(vertex_count)),
        a if a & ATTR_UV3 != 0 => VertexUvs::Uv3(Vec::with_capacity(vertex_count)),
        _ => VertexUvs::None,
    };
    let mut normals = Vec::new();
    let mut tangents = Vec::new();
    let mut bones = Vec::new();

    for _ in 0..vertex_count {
        positions.push(r.get_vec3()?);
        match &mut uvs {
            VertexUvs::None => {}
            VertexUvs::Uv2(list) => list.push(r.get_vec2()?),
            VertexUvs::Uv3(list) => list.push(r.get_vec3()?),
        }
        if attrs & ATTR_NORMAL != 0 {
            normals.push(r.get_vec3()?);
        }
        if attrs & ATTR_TANGENT != 0 {
            let t: Vec3 = r.get_vec3()?;
            let b: Vec3 = r.get_vec3()?;
            tangents.push((t, b));
        }
        if attrs & ATTR_BONES != 0 {
            let mut indices = [0u16; 4];
            for idx in &mut indices {
                *idx = r.get_u16()?;
            }
            let mut weights = [0f32; 4];
            for weight in &mut weights {
                *weight = r.get_f32()?;
            }
            bones.push(BoneVertex { indices, weights });
        }
    }

    let mut indices = Vec::with_capacity(index_count);
    for _ in 0..index_count {
        indices.push(r.get_u32()?);
    }
    r.expect_end()?;

    Ok(Model {
        primitive,
        flags,
        aabb,
        texture_names,
        bone_count,
        skeleton,
        material,
        positions,
        uvs,
        normals,
        tangents,
        bones,
        indices,
    })
}
