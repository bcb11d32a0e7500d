//! Graphics emit: scene snapshot capture.
//!
//! Runs on the control thread once per update tick. Each snapshot is a
//! struct-of-vectors of POD records tied to a single emit time; entities
//! whose scene mask overlaps no active camera are not captured at all.

use rustc_hash::FxHashSet;

use crate::scene::components::{
    CameraComponent, LightComponent, RenderComponent, ShadowmapComponent,
    SkeletalAnimationComponent, TextComponent, TextureAnimationComponent,
};
use crate::scene::{EntityId, EntityStore, Transform};

/// Current and previous-tick transform of a snapshot entity.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitTransforms {
    pub current: Transform,
    pub history: Transform,
}

impl EmitTransforms {
    fn of(store: &EntityStore, entity: EntityId) -> Self {
        Self {
            current: store.transform_of(entity),
            history: store.history_of(entity),
        }
    }

    /// Pose at an interpolation factor between history and current.
    #[must_use]
    pub fn interpolate(&self, factor: f32) -> Transform {
        Transform::interpolate(&self.history, &self.current, factor)
    }
}

#[derive(Debug, Clone)]
pub struct EmitCamera {
    pub entity: EntityId,
    pub transform: EmitTransforms,
    pub camera: CameraComponent,
}

#[derive(Debug, Clone)]
pub struct EmitLight {
    pub entity: EntityId,
    pub transform: EmitTransforms,
    pub light: LightComponent,
    pub shadowmap: Option<ShadowmapComponent>,
}

#[derive(Debug, Clone)]
pub struct EmitRenderable {
    pub entity: EntityId,
    pub transform: EmitTransforms,
    pub render: RenderComponent,
    pub texture_animation: Option<TextureAnimationComponent>,
    pub skeletal_animation: Option<SkeletalAnimationComponent>,
}

#[derive(Debug, Clone)]
pub struct EmitText {
    pub entity: EntityId,
    pub transform: EmitTransforms,
    pub text: TextComponent,
}

/// One published scene snapshot.
#[derive(Debug, Default)]
pub struct EmitSnapshot {
    /// Control time of the tick that produced the snapshot, microseconds.
    pub time: u64,
    pub cameras: Vec<EmitCamera>,
    pub lights: Vec<EmitLight>,
    pub renderables: Vec<EmitRenderable>,
    pub texts: Vec<EmitText>,
}

/// Fills `out` from the entity store.
///
/// `warned` persists across ticks so protocol violations log once per
/// entity, not once per frame.
pub fn capture(
    store: &EntityStore,
    time: u64,
    warned: &mut FxHashSet<EntityId>,
    out: &mut EmitSnapshot,
) {
    out.time = time;
    out.cameras.clear();
    out.lights.clear();
    out.renderables.clear();
    out.texts.clear();

    let mut active_masks = 0u32;
    for (entity, camera) in &store.cameras {
        active_masks |= camera.scene_mask;
        out.cameras.push(EmitCamera {
            entity,
            transform: EmitTransforms::of(store, entity),
            camera: *camera,
        });
    }
    if active_masks == 0 {
        return;
    }

    for (entity, light) in &store.lights {
        if light.scene_mask & active_masks == 0 {
            continue;
        }
        out.lights.push(EmitLight {
            entity,
            transform: EmitTransforms::of(store, entity),
            light: *light,
            shadowmap: store.shadowmaps.get(entity).copied(),
        });
    }

    for (entity, render) in &store.renders {
        if render.scene_mask & active_masks == 0 {
            continue;
        }
        out.renderables.push(EmitRenderable {
            entity,
            transform: EmitTransforms::of(store, entity),
            render: *render,
            texture_animation: store.texture_animations.get(entity).copied(),
            skeletal_animation: store.skeletal_animations.get(entity).copied(),
        });
    }

    for (entity, text) in &store.texts {
        if text.scene_mask & active_masks == 0 {
            continue;
        }
        if store.renders.contains_key(entity) {
            // An entity carries either a model or a text, not both.
            if warned.insert(entity) {
                log::warn!("entity {entity:?} has both render and text components; text ignored");
            }
            continue;
        }
        out.texts.push(EmitText {
            entity,
            transform: EmitTransforms::of(store, entity),
            text: text.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::components::{CameraComponent, RenderComponent, TextComponent};

    #[test]
    fn entities_outside_every_camera_mask_are_skipped() {
        let mut store = EntityStore::new();
        let cam = store.spawn();
        store.cameras.insert(
            cam,
            CameraComponent {
                scene_mask: 0b01,
                ..CameraComponent::default()
            },
        );
        let visible = store.spawn();
        store.renders.insert(
            visible,
            RenderComponent {
                scene_mask: 0b11,
                ..RenderComponent::default()
            },
        );
        let hidden = store.spawn();
        store.renders.insert(
            hidden,
            RenderComponent {
                scene_mask: 0b10,
                ..RenderComponent::default()
            },
        );

        let mut snapshot = EmitSnapshot::default();
        let mut warned = FxHashSet::default();
        capture(&store, 123, &mut warned, &mut snapshot);

        assert_eq!(snapshot.time, 123);
        assert_eq!(snapshot.cameras.len(), 1);
        assert_eq!(snapshot.renderables.len(), 1);
        assert_eq!(snapshot.renderables[0].entity, visible);
    }

    #[test]
    fn model_plus_text_drops_the_text_once() {
        let mut store = EntityStore::new();
        let cam = store.spawn();
        store.cameras.insert(cam, CameraComponent::default());
        let both = store.spawn();
        store.renders.insert(both, RenderComponent::default());
        store.texts.insert(both, TextComponent::default());

        let mut snapshot = EmitSnapshot::default();
        let mut warned = FxHashSet::default();
        capture(&store, 0, &mut warned, &mut snapshot);
        assert!(snapshot.texts.is_empty());
        assert_eq!(snapshot.renderables.len(), 1);
        assert!(warned.contains(&both));
    }
}
