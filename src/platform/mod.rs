//! Contracts of the external services the engine drives.
//!
//! The engine records GPU work, polls window events, and mixes audio, but
//! the actual OpenGL-class device, the windowing library, and the audio
//! output are external collaborators. These traits pin down exactly what the
//! pipelines require of them; the crate ships headless implementations used
//! by the tests.

pub mod gpu;
pub mod speaker;
pub mod window;

pub use gpu::{GraphicsApi, RecordingGpu, TextureFormat};
pub use speaker::{NullSpeaker, Speaker, SpeakerFormat, SpeakerSource};
pub use window::{HeadlessWindow, Modifiers, MouseButton, WindowEvent, WindowService};
