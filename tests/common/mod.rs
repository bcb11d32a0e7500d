//! Shared fixtures for the pipeline tests.
#![allow(dead_code)]

use glam::{Vec2, Vec3};

use ember::assets::types::{MeshRenderFlags, ShaderProgram, VertexUvs};
use ember::assets::{Aabb, AssetId, AssetServer, Model};
use ember::graphics::prepare::{builtin, effects};

/// A unit quad in the XY plane, the shape of the built-in square model.
#[must_use]
pub fn quad_model() -> Model {
    Model {
        aabb: Aabb::new(Vec3::new(-0.5, -0.5, 0.0), Vec3::new(0.5, 0.5, 0.0)),
        positions: vec![
            Vec3::new(-0.5, -0.5, 0.0),
            Vec3::new(0.5, -0.5, 0.0),
            Vec3::new(0.5, 0.5, 0.0),
            Vec3::new(-0.5, 0.5, 0.0),
        ],
        uvs: VertexUvs::Uv2(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ]),
        normals: vec![Vec3::Z; 4],
        indices: vec![0, 1, 2, 0, 2, 3],
        ..Model::default()
    }
}

/// A unit cube model around the origin.
#[must_use]
pub fn cube_model() -> Model {
    let mut positions = Vec::new();
    for z in [-0.5f32, 0.5] {
        for y in [-0.5f32, 0.5] {
            for x in [-0.5f32, 0.5] {
                positions.push(Vec3::new(x, y, z));
            }
        }
    }
    Model {
        aabb: Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
        positions,
        normals: vec![Vec3::Z; 8],
        indices: vec![
            0, 1, 3, 0, 3, 2, // back
            4, 6, 7, 4, 7, 5, // front
            0, 4, 5, 0, 5, 1, // bottom
            2, 3, 7, 2, 7, 6, // top
            0, 2, 6, 0, 6, 4, // left
            1, 5, 7, 1, 7, 3, // right
        ],
        flags: MeshRenderFlags::default(),
        ..Model::default()
    }
}

/// Routes pipeline log output (degradation warnings, dispatch error
/// summaries) into the test harness. Safe to call from every test.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn stub_shader(name: &str) -> ShaderProgram {
    ShaderProgram {
        label: name.to_string(),
        vertex_source: format!("// vertex: {name}"),
        fragment_source: format!("// fragment: {name}"),
        variants: 4,
    }
}

/// Registers the built-in models and shaders the prepare stage references,
/// so recorded queues resolve fully against a test backend.
pub fn install_builtin_assets(assets: &AssetServer) -> AssetId {
    for shader in [
        builtin::SHADER_STANDARD,
        builtin::SHADER_DEPTH,
        builtin::SHADER_BLIT,
        builtin::SHADER_FONT,
        builtin::SHADER_VISUALIZE_COLOR,
        builtin::SHADER_VISUALIZE_DEPTH,
        effects::shaders::AMBIENT_OCCLUSION,
        effects::shaders::DEPTH_OF_FIELD,
        effects::shaders::EYE_ADAPTATION_COLLECT,
        effects::shaders::BLOOM,
        effects::shaders::EYE_ADAPTATION_APPLY,
        effects::shaders::TONEMAP,
        effects::shaders::FXAA,
        effects::shaders::SHARPEN,
    ] {
        assets.insert_named(shader, stub_shader(shader));
    }
    assets.insert_named(builtin::MODEL_SQUARE, quad_model());
    assets.insert_named(builtin::MODEL_BONE, cube_model());
    assets.insert_named(builtin::MODEL_PLACEHOLDER, cube_model())
}
