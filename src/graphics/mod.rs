//! The graphics pipeline: emit → prepare → dispatch.
//!
//! [`Graphics`] owns the triple-buffered snapshots, the timing corrector,
//! the per-frame animation cache, the transient-resource registry, and the
//! two render queues the prepare/dispatch ping-pong alternates between. The
//! engine scheduler decides *when* each stage runs and on which thread;
//! this module implements *what* each stage does.

pub mod dispatch;
pub mod emit;
pub mod frustum;
pub mod prepare;
pub mod provisional;
pub mod queue;
pub mod uniforms;

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::UVec2;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::animation::preparator::AnimationPreparator;
use crate::assets::AssetServer;
use crate::config::Config;
use crate::scene::{EntityId, EntityStore};
use crate::sync::swap_buffer::SwapBuffers;
use crate::sync::timing::{interpolation_factor, InterpolationTimingCorrector};

use self::dispatch::GraphicsDispatch;
use self::emit::EmitSnapshot;
use self::prepare::PrepareContext;
use self::provisional::ProvisionalGraphics;
use self::queue::RenderQueue;

/// Prepare-side counters of the last recorded frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrepareOutput {
    pub draw_calls: u32,
    pub primitives: u64,
}

/// State shared by the graphics stages across their three threads.
pub struct Graphics {
    /// Control update period, for the interpolation factor.
    update_period_us: u64,
    emit_buffers: SwapBuffers<EmitSnapshot>,
    timing: Mutex<InterpolationTimingCorrector>,
    pub preparator: AnimationPreparator,
    pub provisional: ProvisionalGraphics,
    queues: [Mutex<RenderQueue>; 2],
    /// Queue index dispatch executes; prepare records into the other.
    front: AtomicUsize,
    /// Entities already flagged for protocol violations.
    warned: Mutex<FxHashSet<EntityId>>,
    last_prepare: Mutex<PrepareOutput>,
}

impl Graphics {
    #[must_use]
    pub fn new(update_period_us: u64) -> Self {
        Self {
            update_period_us,
            // Graphics prepare re-records a frame only for fresh snapshots;
            // no read-repeat (dispatch replays the previous queue instead).
            emit_buffers: SwapBuffers::new(false),
            timing: Mutex::new(InterpolationTimingCorrector::new()),
            preparator: AnimationPreparator::new(),
            provisional: ProvisionalGraphics::new(),
            queues: [Mutex::new(RenderQueue::new()), Mutex::new(RenderQueue::new())],
            front: AtomicUsize::new(0),
            warned: Mutex::new(FxHashSet::default()),
            last_prepare: Mutex::new(PrepareOutput::default()),
        }
    }

    // ── Emit (control thread) ──────────────────────────────────────────────

    /// Publishes a snapshot of the scene; drops the tick under contention.
    pub fn emit(&self, store: &EntityStore, time: u64) {
        let Some(mut slot) = self.emit_buffers.write() else {
            log::debug!("graphics emit dropped: no free swap slot");
            return;
        };
        let mut warned = self.warned.lock();
        emit::capture(store, time, &mut warned, &mut slot);
    }

    // ── Prepare (prepare thread) ───────────────────────────────────────────

    /// Records the next frame from the freshest snapshot.
    ///
    /// Returns `false` when no new snapshot was available; the previously
    /// recorded queue stays current and dispatch replays it.
    pub fn prepare(
        &self,
        assets: &AssetServer,
        config: &Config,
        window_resolution: UVec2,
        dispatch_time: u64,
    ) -> bool {
        let Some(snapshot) = self.emit_buffers.read() else {
            log::debug!("graphics prepare skipped: no new snapshot");
            return false;
        };

        let target = self
            .timing
            .lock()
            .correct(snapshot.time, dispatch_time, self.update_period_us);
        let factor = interpolation_factor(target, snapshot.time, self.update_period_us);

        let flags = PrepareContext::flags_from_config(config);
        let ctx = PrepareContext {
            snapshot: &*snapshot,
            assets,
            provisional: &self.provisional,
            preparator: &self.preparator,
            window_resolution,
            prepare_time: target,
            interpolation_factor: factor,
            render_missing_models: flags.render_missing_models,
            render_skeleton_bones: flags.render_skeleton_bones,
            visualize_buffer: flags.visualize_buffer,
            disable_ambient_occlusion: flags.disable_ambient_occlusion,
            disable_bloom: flags.disable_bloom,
            gamma: flags.gamma,
            max_texture_size: 16384,
        };

        let back = 1 - self.front.load(Ordering::Acquire);
        let mut queue = self.queues[back].lock();
        queue.reset();
        prepare::prepare_frame(&ctx, &mut queue);
        *self.last_prepare.lock() = PrepareOutput {
            draw_calls: queue.draw_count(),
            primitives: queue.primitive_count(),
        };
        drop(queue);
        self.front.store(back, Ordering::Release);
        true
    }

    /// Counters of the most recently recorded frame.
    #[must_use]
    pub fn prepare_output(&self) -> PrepareOutput {
        *self.last_prepare.lock()
    }

    // ── Dispatch (GPU thread) ──────────────────────────────────────────────

    /// Executes the current front queue.
    pub fn dispatch(
        &self,
        state: &mut GraphicsDispatch,
        gpu: &mut dyn crate::platform::gpu::GraphicsApi,
        assets: &AssetServer,
    ) {
        let front = self.front.load(Ordering::Acquire);
        let queue = self.queues[front].lock();
        state.execute(&queue, gpu, assets, &self.provisional);
    }

    /// Frame-end housekeeping on the GPU thread.
    pub fn end_frame(
        &self,
        state: &mut GraphicsDispatch,
        gpu: &mut dyn crate::platform::gpu::GraphicsApi,
    ) {
        state.end_frame(gpu, &self.provisional);
    }
}
