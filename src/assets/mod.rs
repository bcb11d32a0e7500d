//! Asset management: ids, refcounted handles, the typed asset server, and
//! the binary pack formats the engine reads.
//!
//! The server is thread-safe; every pipeline thread resolves asset ids
//! against it. Decoding for schemes that must run on a specific thread
//! (GPU uploads on the dispatch thread, sound buffers on the sound thread)
//! queues through per-thread channels drained by the owning thread.

pub mod formats;
pub mod handle;
pub mod ids;
pub mod server;
pub mod types;

pub use handle::AssetHandle;
pub use ids::AssetId;
pub use server::{AssetServer, LoaderThread};
pub use types::{
    Aabb, AssetPack, Collider, FontFace, Glyph, MeshRenderFlags, Model, PrimitiveType,
    RenderObject, ShaderProgram, SoundAsset, TextPack, TextureAsset, TextureTarget, VertexUvs,
};
