//! The typed, thread-safe asset server.
//!
//! Storage is keyed by `(type, id)`; values are reference-counted so a
//! handle obtained by any thread stays valid for as long as it is held,
//! including across removal. Schemes register a decode closure plus the
//! thread the closure must run on; encoded blobs submitted for such a scheme
//! queue through a channel drained by the owning thread.

use std::any::{Any, TypeId};
use std::io::BufRead;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::errors::{EmberError, Result};

use super::handle::AssetHandle;
use super::ids::AssetId;

/// Threads that scheme decoders may be pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderThread {
    /// No affinity: decode wherever the blob is submitted.
    Any,
    Control,
    /// The GPU thread; texture, model, and shader schemes decode here.
    GraphicsDispatch,
    /// The sound thread; sound buffers decode here.
    Sound,
}

const QUEUE_COUNT: usize = 3;

fn queue_index(thread: LoaderThread) -> Option<usize> {
    match thread {
        LoaderThread::Any => None,
        LoaderThread::Control => Some(0),
        LoaderThread::GraphicsDispatch => Some(1),
        LoaderThread::Sound => Some(2),
    }
}

type AnyArc = Arc<dyn Any + Send + Sync>;
type DecodeFn = Arc<dyn Fn(&[u8]) -> Result<AnyArc> + Send + Sync>;

struct SchemeEntry {
    name: &'static str,
    thread: LoaderThread,
    decode: DecodeFn,
}

struct PendingLoad {
    type_id: TypeId,
    id: AssetId,
    bytes: Vec<u8>,
}

struct Inner {
    schemes: RwLock<FxHashMap<TypeId, SchemeEntry>>,
    storage: RwLock<FxHashMap<(TypeId, AssetId), AnyArc>>,
    /// Human-readable names for diagnostics, filled by `insert_named`.
    names: RwLock<FxHashMap<AssetId, String>>,
    queues: [(flume::Sender<PendingLoad>, flume::Receiver<PendingLoad>); QUEUE_COUNT],
    reloads: (flume::Sender<String>, flume::Receiver<String>),
    listen_stop: AtomicBool,
}

/// Cheaply clonable reference to the shared asset storage.
#[derive(Clone)]
pub struct AssetServer {
    inner: Arc<Inner>,
}

impl Default for AssetServer {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetServer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                schemes: RwLock::default(),
                storage: RwLock::default(),
                names: RwLock::default(),
                queues: [flume::unbounded(), flume::unbounded(), flume::unbounded()],
                reloads: flume::unbounded(),
                listen_stop: AtomicBool::new(false),
            }),
        }
    }

    // ── Schemes ────────────────────────────────────────────────────────────

    /// Registers the decode closure for asset type `T`.
    pub fn register_scheme<T: Send + Sync + 'static>(
        &self,
        name: &'static str,
        thread: LoaderThread,
        decode: impl Fn(&[u8]) -> Result<T> + Send + Sync + 'static,
    ) {
        let entry = SchemeEntry {
            name,
            thread,
            decode: Arc::new(move |bytes| decode(bytes).map(|v| Arc::new(v) as AnyArc)),
        };
        self.inner.schemes.write().insert(TypeId::of::<T>(), entry);
    }

    /// Submits an encoded blob for decoding under `T`'s scheme.
    ///
    /// Blobs for thread-pinned schemes queue for the owning thread; blobs
    /// for `Any` schemes decode immediately on the calling thread.
    pub fn submit<T: Send + Sync + 'static>(&self, id: AssetId, bytes: Vec<u8>) -> Result<()> {
        let type_id = TypeId::of::<T>();
        let schemes = self.inner.schemes.read();
        let entry = schemes
            .get(&type_id)
            .ok_or(EmberError::SchemeNotRegistered(std::any::type_name::<T>()))?;
        match queue_index(entry.thread) {
            Some(index) => {
                // Channel is unbounded; send only fails if the server is gone.
                let _ = self.inner.queues[index].0.send(PendingLoad { type_id, id, bytes });
                Ok(())
            }
            None => {
                let value = (entry.decode)(&bytes)?;
                self.inner.storage.write().insert((type_id, id), value);
                Ok(())
            }
        }
    }

    /// Decodes one queued blob pinned to `thread`.
    ///
    /// Returns `false` when the queue is empty; the dispatch and sound
    /// threads call this in a loop each tick until it drains.
    pub fn process_thread(&self, thread: LoaderThread) -> bool {
        let Some(index) = queue_index(thread) else {
            return false;
        };
        let Ok(pending) = self.inner.queues[index].1.try_recv() else {
            return false;
        };
        let decode = {
            let schemes = self.inner.schemes.read();
            let Some(entry) = schemes.get(&pending.type_id) else {
                return true;
            };
            Arc::clone(&entry.decode)
        };
        match decode(&pending.bytes) {
            Ok(value) => {
                self.inner
                    .storage
                    .write()
                    .insert((pending.type_id, pending.id), value);
            }
            Err(err) => {
                let name = self.name_of(pending.id);
                log::error!("failed to decode asset {name}: {err}");
            }
        }
        true
    }

    // ── Storage ────────────────────────────────────────────────────────────

    /// Stores a decoded asset directly under an id.
    pub fn insert<T: Send + Sync + 'static>(&self, id: AssetId, value: T) {
        self.inner
            .storage
            .write()
            .insert((TypeId::of::<T>(), id), Arc::new(value));
    }

    /// Stores a decoded asset under the hash of `name` and returns the id.
    pub fn insert_named<T: Send + Sync + 'static>(&self, name: &str, value: T) -> AssetId {
        let id = AssetId::from_name(name);
        self.inner.names.write().insert(id, name.to_string());
        self.insert(id, value);
        id
    }

    /// Resolves an id to a refcounted handle; `None` while not loaded.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, id: AssetId) -> Option<AssetHandle<T>> {
        if !id.is_valid() {
            return None;
        }
        let storage = self.inner.storage.read();
        let value = storage.get(&(TypeId::of::<T>(), id))?;
        let typed = Arc::clone(value).downcast::<T>().ok()?;
        Some(AssetHandle::new(id, typed))
    }

    /// Drops the server's reference; outstanding handles stay valid.
    pub fn remove<T: Send + Sync + 'static>(&self, id: AssetId) {
        self.inner.storage.write().remove(&(TypeId::of::<T>(), id));
    }

    #[must_use]
    pub fn name_of(&self, id: AssetId) -> String {
        self.inner
            .names
            .read()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// Scheme name registered for `T`, for diagnostics.
    #[must_use]
    pub fn scheme_name<T: 'static>(&self) -> Option<&'static str> {
        self.inner.schemes.read().get(&TypeId::of::<T>()).map(|e| e.name)
    }

    // ── Hot reload ─────────────────────────────────────────────────────────

    /// Starts the hot-reload hook: a TCP listener whose clients send one
    /// asset name per line. Received names surface through
    /// [`AssetServer::drain_reloads`] on the control thread.
    pub fn listen(&self, host: &str, port: u16) -> Result<()> {
        let listener = TcpListener::bind((host, port))?;
        listener.set_nonblocking(true)?;
        let inner = Arc::clone(&self.inner);
        std::thread::Builder::new()
            .name("ember-asset-listen".into())
            .spawn(move || listen_loop(&listener, &inner))
            .map_err(|e| EmberError::ThreadStart(e.to_string()))?;
        log::info!("asset hot-reload listening on {host}:{port}");
        Ok(())
    }

    /// Stops the hot-reload listener thread at its next poll.
    pub fn stop_listen(&self) {
        self.inner.listen_stop.store(true, Ordering::Relaxed);
    }

    /// Hands every queued reload request to `f`.
    pub fn drain_reloads(&self, mut f: impl FnMut(&str)) {
        while let Ok(name) = self.inner.reloads.1.try_recv() {
            f(&name);
        }
    }
}

fn listen_loop(listener: &TcpListener, inner: &Inner) {
    while !inner.listen_stop.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                log::debug!("asset reload client connected: {peer}");
                let reader = std::io::BufReader::new(stream);
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    let name = line.trim();
                    if !name.is_empty() {
                        let _ = inner.reloads.0.send(name.to_string());
                    }
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => {
                log::warn!("asset reload listener error: {e}");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get_typed() {
        let server = AssetServer::new();
        let id = server.insert_named("test/number", 42u32);
        let handle = server.get::<u32>(id).unwrap();
        assert_eq!(*handle, 42);
        // Wrong type resolves to nothing.
        assert!(server.get::<f32>(id).is_none());
    }

    #[test]
    fn handles_outlive_removal() {
        let server = AssetServer::new();
        let id = server.insert_named("test/kept", String::from("alive"));
        let handle = server.get::<String>(id).unwrap();
        server.remove::<String>(id);
        assert!(server.get::<String>(id).is_none());
        assert_eq!(&*handle, "alive");
    }

    #[test]
    fn pinned_scheme_decodes_on_owner_thread() {
        let server = AssetServer::new();
        server.register_scheme::<u32>("u32", LoaderThread::GraphicsDispatch, |bytes| {
            Ok(u32::from(bytes[0]))
        });
        let id = AssetId::from_name("test/pinned");
        server.submit::<u32>(id, vec![7]).unwrap();
        // Not visible until the owning thread drains its queue.
        assert!(server.get::<u32>(id).is_none());
        assert!(server.process_thread(LoaderThread::GraphicsDispatch));
        assert!(!server.process_thread(LoaderThread::GraphicsDispatch));
        assert_eq!(*server.get::<u32>(id).unwrap(), 7);
    }
}
