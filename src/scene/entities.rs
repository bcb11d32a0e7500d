//! Structure-of-arrays entity store.
//!
//! One slotmap allocates entity ids; each component type lives in its own
//! secondary table. The transform component has two parallel tables, the
//! current one and the history one, so the prepare stages can interpolate
//! poses between the two most recent control ticks.

use slotmap::{new_key_type, SecondaryMap, SlotMap};

use super::components::{
    CameraComponent, LightComponent, ListenerComponent, RenderComponent, ShadowmapComponent,
    SkeletalAnimationComponent, SoundComponent, TextComponent, TextureAnimationComponent,
};
use super::transform::Transform;

new_key_type! {
    /// Opaque entity identifier.
    pub struct EntityId;
}

/// The entity/component store queried by both pipelines.
///
/// Mutation is control-thread only; see the module docs.
#[derive(Default)]
pub struct EntityStore {
    entities: SlotMap<EntityId, ()>,
    pub transforms: SecondaryMap<EntityId, Transform>,
    /// Transform values of the previous control tick. Only entities that had
    /// a transform when [`EntityStore::snapshot_history`] last ran have an
    /// entry here; readers fall back to the current value.
    pub transforms_history: SecondaryMap<EntityId, Transform>,
    pub renders: SecondaryMap<EntityId, RenderComponent>,
    pub texture_animations: SecondaryMap<EntityId, TextureAnimationComponent>,
    pub skeletal_animations: SecondaryMap<EntityId, SkeletalAnimationComponent>,
    pub lights: SecondaryMap<EntityId, LightComponent>,
    pub shadowmaps: SecondaryMap<EntityId, ShadowmapComponent>,
    pub cameras: SecondaryMap<EntityId, CameraComponent>,
    pub sounds: SecondaryMap<EntityId, SoundComponent>,
    pub listeners: SecondaryMap<EntityId, ListenerComponent>,
    pub texts: SecondaryMap<EntityId, TextComponent>,
}

impl EntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self) -> EntityId {
        self.entities.insert(())
    }

    pub fn despawn(&mut self, entity: EntityId) {
        self.entities.remove(entity);
        self.transforms.remove(entity);
        self.transforms_history.remove(entity);
        self.renders.remove(entity);
        self.texture_animations.remove(entity);
        self.skeletal_animations.remove(entity);
        self.lights.remove(entity);
        self.shadowmaps.remove(entity);
        self.cameras.remove(entity);
        self.sounds.remove(entity);
        self.listeners.remove(entity);
        self.texts.remove(entity);
    }

    #[must_use]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.contains_key(entity)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys()
    }

    /// Copies every current transform into the history table.
    ///
    /// Runs exactly once per control tick, before emit, which guarantees
    /// `history == previous current` for every interpolating reader.
    pub fn snapshot_history(&mut self) {
        for (entity, transform) in &self.transforms {
            self.transforms_history.insert(entity, *transform);
        }
    }

    /// Current transform of an entity, identity if it has none.
    #[must_use]
    pub fn transform_of(&self, entity: EntityId) -> Transform {
        self.transforms
            .get(entity)
            .copied()
            .unwrap_or(Transform::IDENTITY)
    }

    /// History transform, falling back to the current one.
    #[must_use]
    pub fn history_of(&self, entity: EntityId) -> Transform {
        self.transforms_history
            .get(entity)
            .copied()
            .unwrap_or_else(|| self.transform_of(entity))
    }
}
