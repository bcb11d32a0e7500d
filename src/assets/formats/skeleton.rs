//! Skeleton rig pack format.
//!
//! Layout: magic `EMSK`, version, global inverse matrix, bone count, then
//! per bone the parent index (`-1` for roots), the base matrix, and the
//! inverse rest matrix.

use crate::animation::skeleton::SkeletonRig;
use crate::errors::Result;

use super::{ByteReader, ByteWriter};

const MAGIC: &[u8; 4] = b"EMSK";
const VERSION: u32 = 1;

#[must_use]
pub fn encode_skeleton(rig: &SkeletonRig) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.put_bytes(MAGIC);
    w.put_u32(VERSION);
    w.put_mat4(&rig.global_inverse);
    w.put_u32(rig.bone_count());
    for i in 0..rig.bone_count() as usize {
        w.put_i32(rig.parents[i]);
        w.put_mat4(&rig.bases[i]);
        w.put_mat4(&rig.inverse_rests[i]);
    }
    w.finish()
}

pub fn decode_skeleton(bytes: &[u8]) -> Result<SkeletonRig> {
    let mut r = ByteReader::new("skeleton", bytes);
    r.expect_magic(MAGIC, VERSION)?;
    let global_inverse = r.get_mat4()?;
    let bone_count = r.get_u32()? as usize;

    let mut parents = Vec::with_capacity(bone_count);
    let mut bases = Vec::with_capacity(bone_count);
    let mut inverse_rests = Vec::with_capacity(bone_count);
    for index in 0..bone_count {
        let parent = r.get_i32()?;
        if parent >= index as i32 {
            return Err(r.error(format!("bone {index} has forward parent {parent}")));
        }
        parents.push(parent);
        bases.push(r.get_mat4()?);
        inverse_rests.push(r.get_mat4()?);
    }
    r.expect_end()?;

    Ok(SkeletonRig {
        global_inverse,
        parents,
        bases,
        inverse_rests,
    })
}
