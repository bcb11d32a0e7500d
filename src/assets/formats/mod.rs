//! Binary pack formats.
//!
//! Each format is little-endian with a four-byte magic and a version word.
//! Encoding is canonical: decoding a blob and re-encoding it reproduces the
//! exact bytes, which the asset tests rely on.

pub mod animation;
pub mod font;
pub mod model;
pub mod skeleton;

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use crate::errors::{EmberError, Result};

pub(crate) fn decode_error(context: &str, reason: impl Into<String>) -> EmberError {
    EmberError::AssetDecode {
        context: context.to_string(),
        reason: reason.into(),
    }
}

// ─── Writer ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct ByteWriter {
    bytes: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i32(&mut self, v: i32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_f32(&mut self, v: f32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_vec2(&mut self, v: Vec2) {
        self.put_f32(v.x);
        self.put_f32(v.y);
    }

    pub fn put_vec3(&mut self, v: Vec3) {
        self.put_f32(v.x);
        self.put_f32(v.y);
        self.put_f32(v.z);
    }

    pub fn put_vec4(&mut self, v: Vec4) {
        self.put_f32(v.x);
        self.put_f32(v.y);
        self.put_f32(v.z);
        self.put_f32(v.w);
    }

    pub fn put_quat(&mut self, q: Quat) {
        self.put_f32(q.x);
        self.put_f32(q.y);
        self.put_f32(q.z);
        self.put_f32(q.w);
    }

    pub fn put_mat4(&mut self, m: &Mat4) {
        for v in m.to_cols_array() {
            self.put_f32(v);
        }
    }
}

// ─── Reader ───────────────────────────────────────────────────────────────────

pub(crate) struct ByteReader<'a> {
    context: &'static str,
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(context: &'static str, bytes: &'a [u8]) -> Self {
        Self {
            context,
            bytes,
            offset: 0,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.offset.checked_add(n).filter(|&e| e <= self.bytes.len());
        let Some(end) = end else {
            return Err(decode_error(self.context, "unexpected end of data"));
        };
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    pub fn expect_magic(&mut self, magic: &[u8; 4], version: u32) -> Result<()> {
        let found = self.take(4)?;
        if found != magic {
            return Err(decode_error(self.context, "bad magic"));
        }
        let v = self.get_u32()?;
        if v != version {
            return Err(decode_error(self.context, format!("unsupported version {v}")));
        }
        Ok(())
    }

    pub fn get_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn get_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn get_vec2(&mut self) -> Result<Vec2> {
        Ok(Vec2::new(self.get_f32()?, self.get_f32()?))
    }

    pub fn get_vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.get_f32()?, self.get_f32()?, self.get_f32()?))
    }

    pub fn get_vec4(&mut self) -> Result<Vec4> {
        Ok(Vec4::new(
            self.get_f32()?,
            self.get_f32()?,
            self.get_f32()?,
            self.get_f32()?,
        ))
    }

    pub fn get_quat(&mut self) -> Result<Quat> {
        Ok(Quat::from_xyzw(
            self.get_f32()?,
            self.get_f32()?,
            self.get_f32()?,
            self.get_f32()?,
        ))
    }

    pub fn get_mat4(&mut self) -> Result<Mat4> {
        let mut cols = [0.0f32; 16];
        for c in &mut cols {
            *c = self.get_f32()?;
        }
        Ok(Mat4::from_cols_array(&cols))
    }

    pub fn expect_end(&self) -> Result<()> {
        if self.offset == self.bytes.len() {
            Ok(())
        } else {
            Err(decode_error(self.context, "trailing data"))
        }
    }

    pub fn error(&self, reason: impl Into<String>) -> EmberError {
        decode_error(self.context, reason)
    }
}
