#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod animation;
pub mod assets;
pub mod config;
pub mod engine;
pub mod errors;
pub mod graphics;
pub mod platform;
pub mod scene;
pub mod sound;
pub mod sync;
pub mod utils;

pub use assets::{AssetHandle, AssetId, AssetServer, LoaderThread};
pub use config::Config;
pub use engine::{Application, Engine, EngineCreateConfig};
pub use errors::EmberError;
pub use graphics::queue::{RenderCommand, RenderQueue};
pub use scene::{
    CameraComponent, EntityId, EntityStore, LightComponent, LightKind, ListenerComponent,
    Projection, RenderComponent, ShadowmapComponent, SoundComponent, TextComponent, Transform,
};
pub use sync::swap_buffer::SwapBufferController;
pub use sync::timing::InterpolationTimingCorrector;
