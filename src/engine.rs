//! The engine: thread model, lifecycle, and scheduling.
//!
//! Four long-running threads cooperate: **control** (the caller's thread,
//! driving the update and input schedules), **graphics prepare**, **graphics
//! dispatch**, and **sound**. Each walks the same phased lifecycle —
//! engine-init, app-init, gameloop, app-finalize, engine-finalize — with a
//! four-party barrier hit three times during startup and once during
//! shutdown, so no stage observes a half-initialized peer.
//!
//! Prepare and dispatch ping-pong on two binary semaphores: prepare records
//! frame N+1 while dispatch finishes the swap and asset work of frame N,
//! but the two never touch the same render queue concurrently.
//!
//! Any panic inside a stage is caught at the stage boundary, logged, and
//! converted into a stop request; every thread still runs its finalize
//! phase.

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};

use parking_lot::Mutex;

use crate::assets::{AssetId, AssetServer, LoaderThread};
use crate::config::{keys, Config};
use crate::errors::{EmberError, Result};
use crate::graphics::dispatch::GraphicsDispatch;
use crate::graphics::queue::RenderQueue;
use crate::graphics::Graphics;
use crate::platform::gpu::GraphicsApi;
use crate::platform::speaker::Speaker;
use crate::platform::window::{WindowEvent, WindowService};
use crate::scene::EntityStore;
use crate::sound::SoundPipeline;
use crate::sync::scheduler::{ScheduleKind, Scheduler};
use crate::sync::semaphore::{ScopedSemaphores, Semaphore};
use crate::utils::{EngineClock, SmoothingBuffer};

/// TCP port of the asset hot-reload hook.
const ASSET_LISTEN_PORT: u16 = 65_042;

// ─── Configuration & application callbacks ────────────────────────────────────

pub struct EngineCreateConfig {
    pub window: Box<dyn WindowService>,
    pub gpu: Box<dyn GraphicsApi>,
    pub speaker: Box<dyn Speaker>,
    pub config: Config,
    /// Stereo/VR output: raises the update and input rates to 90 Hz.
    pub stereo: bool,
}

/// What the control-thread callbacks may touch.
pub struct ControlContext<'a> {
    pub entities: &'a mut EntityStore,
    pub assets: &'a AssetServer,
    pub config: &'a Config,
    /// Schedule time of the current tick, microseconds.
    pub time: u64,
    stop: &'a AtomicBool,
}

impl ControlContext<'_> {
    /// Requests a clean engine stop at the next task boundary.
    pub fn stop_engine(&self) {
        self.stop.store(true, Ordering::Release);
    }
}

/// Application callbacks, all invoked on the control thread.
pub trait Application {
    fn initialize(&mut self, _ctx: &mut ControlContext<'_>) {}
    /// The update tick (default 20 Hz): mutate entities here.
    fn update(&mut self, _ctx: &mut ControlContext<'_>) {}
    /// One call per polled window event, on the input tick.
    fn input(&mut self, _event: &WindowEvent, _ctx: &mut ControlContext<'_>) {}
    /// Returns this tick's GUI render queue, dispatched after the scene.
    fn layout_gui(&mut self, _ctx: &mut ControlContext<'_>) -> Option<RenderQueue> {
        None
    }
    fn finalize(&mut self, _ctx: &mut ControlContext<'_>) {}
}

// ─── Frame statistics ─────────────────────────────────────────────────────────

#[derive(Default)]
struct FrameStatistics {
    prepare_us: SmoothingBuffer<100>,
    dispatch_us: SmoothingBuffer<100>,
    frame_us: SmoothingBuffer<100>,
    draw_calls: SmoothingBuffer<100>,
    draw_primitives: SmoothingBuffer<100>,
    entities: SmoothingBuffer<100>,
}

/// Smoothed frame counters over the last hundred samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStatisticsView {
    pub prepare_us: i64,
    pub dispatch_us: i64,
    pub frame_us: i64,
    pub draw_calls: i64,
    pub draw_primitives: i64,
    pub entities: i64,
}

// ─── Shared engine state ──────────────────────────────────────────────────────

struct Shared {
    assets: AssetServer,
    config: Config,
    graphics: Graphics,
    sound: SoundPipeline,
    clock: EngineClock,
    stopping: AtomicBool,
    barrier: Barrier,
    semaphore_prepare: Semaphore,
    semaphore_dispatch: Semaphore,
    /// Window resolution cached by the control thread, packed `w << 32 | h`.
    window_resolution: AtomicU64,
    /// GUI queue handoff: control writes, dispatch takes.
    gui_queue: Mutex<Option<RenderQueue>>,
    /// Asset ids invalidated by hot reload, drained by the dispatch thread.
    reloads: (flume::Sender<AssetId>, flume::Receiver<AssetId>),
    /// Serialize scheme-specific loaders on their owning threads.
    assets_graphics_mutex: Mutex<()>,
    assets_sound_mutex: Mutex<()>,
    stats: Mutex<FrameStatistics>,
    update_period_us: u64,
    input_period_us: u64,
    sound_period_us: u64,
}

impl Shared {
    fn stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    fn request_stop(&self) {
        self.stopping.store(true, Ordering::Release);
    }

    fn window_resolution(&self) -> glam::UVec2 {
        let packed = self.window_resolution.load(Ordering::Acquire);
        glam::UVec2::new((packed >> 32) as u32, packed as u32)
    }

    fn set_window_resolution(&self, resolution: glam::UVec2) {
        self.window_resolution.store(
            (u64::from(resolution.x) << 32) | u64::from(resolution.y),
            Ordering::Release,
        );
    }
}

/// Runs one lifecycle stage, converting panics into stop requests.
fn guarded_stage(shared: &Shared, thread: &str, stage: &str, body: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(body)).is_err() {
        log::error!("unhandled panic in {stage} on {thread} thread, stopping engine");
        shared.request_stop();
    }
}

// ─── The engine ───────────────────────────────────────────────────────────────

pub struct Engine {
    shared: Arc<Shared>,
    window: Arc<Mutex<Box<dyn WindowService>>>,
    gpu: Option<Box<dyn GraphicsApi>>,
    speaker: Option<Box<dyn Speaker>>,
    entities: EntityStore,
    started: bool,
}

impl Engine {
    #[must_use]
    pub fn new(create: EngineCreateConfig) -> Self {
        let speaker_format = create.speaker.format();
        let update_period_us = 1_000_000 / if create.stereo { 90 } else { 20 };
        let input_period_us = 1_000_000 / if create.stereo { 90 } else { 60 };
        let sound_period_us = 1_000_000 / 40;

        let resolution = create.window.resolution();
        let shared = Shared {
            assets: AssetServer::new(),
            config: create.config,
            graphics: Graphics::new(update_period_us),
            sound: SoundPipeline::new(update_period_us, speaker_format),
            clock: EngineClock::new(),
            stopping: AtomicBool::new(false),
            barrier: Barrier::new(4),
            semaphore_prepare: Semaphore::new(1),
            semaphore_dispatch: Semaphore::new(0),
            window_resolution: AtomicU64::new(0),
            gui_queue: Mutex::new(None),
            reloads: flume::unbounded(),
            assets_graphics_mutex: Mutex::new(()),
            assets_sound_mutex: Mutex::new(()),
            stats: Mutex::new(FrameStatistics::default()),
            update_period_us,
            input_period_us,
            sound_period_us,
        };
        shared.set_window_resolution(resolution);

        Self {
            shared: Arc::new(shared),
            window: Arc::new(Mutex::new(create.window)),
            gpu: Some(create.gpu),
            speaker: Some(create.speaker),
            entities: EntityStore::new(),
            started: false,
        }
    }

    #[must_use]
    pub fn assets(&self) -> &AssetServer {
        &self.shared.assets
    }

    #[must_use]
    pub fn entities_mut(&mut self) -> &mut EntityStore {
        &mut self.entities
    }

    /// Requests a clean stop; gameloop stages exit at their next boundary.
    pub fn stop(&self) {
        self.shared.request_stop();
    }

    /// Smoothed frame statistics.
    #[must_use]
    pub fn statistics(&self) -> FrameStatisticsView {
        let stats = self.shared.stats.lock();
        FrameStatisticsView {
            prepare_us: stats.prepare_us.smooth(),
            dispatch_us: stats.dispatch_us.smooth(),
            frame_us: stats.frame_us.smooth(),
            draw_calls: stats.draw_calls.smooth(),
            draw_primitives: stats.draw_primitives.smooth(),
            entities: stats.entities.smooth(),
        }
    }

    /// Runs the engine until stopped. The caller's thread becomes the
    /// control thread; prepare, dispatch, and sound threads are spawned and
    /// joined before this returns.
    pub fn run(&mut self, app: &mut dyn Application) -> Result<()> {
        if self.started {
            return Err(EmberError::InvalidState("engine already ran"));
        }
        self.started = true;
        log::info!("initializing engine");

        if self.shared.config.get_bool(keys::ASSETS_LISTEN, false) {
            if let Err(err) = self.shared.assets.listen("127.0.0.1", ASSET_LISTEN_PORT) {
                log::warn!("asset hot-reload listener failed to start: {err}");
            }
        }

        let gpu = self.gpu.take().expect("gpu backend present");
        let speaker = self.speaker.take().expect("speaker present");

        let prepare_thread = spawn_thread("ember-gfx-prepare", {
            let shared = Arc::clone(&self.shared);
            move || graphics_prepare_entry(&shared)
        })?;
        let dispatch_thread = spawn_thread("ember-gfx-dispatch", {
            let shared = Arc::clone(&self.shared);
            let window = Arc::clone(&self.window);
            move || graphics_dispatch_entry(&shared, &window, gpu)
        })?;
        let sound_thread = spawn_thread("ember-sound", {
            let shared = Arc::clone(&self.shared);
            move || sound_entry(&shared, speaker)
        })?;

        control_entry(&self.shared, &self.window, &mut self.entities, app);

        prepare_thread.join().ok();
        dispatch_thread.join().ok();
        sound_thread.join().ok();

        self.shared.assets.stop_listen();
        log::info!("engine stopped");
        Ok(())
    }
}

fn spawn_thread(
    name: &str,
    body: impl FnOnce() + Send + 'static,
) -> Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|e| EmberError::ThreadStart(e.to_string()))
}

// ─── Control thread ───────────────────────────────────────────────────────────

struct ControlState<'a> {
    entities: &'a mut EntityStore,
    app: &'a mut dyn Application,
}

fn control_entry(
    shared: &Arc<Shared>,
    window: &Arc<Mutex<Box<dyn WindowService>>>,
    entities: &mut EntityStore,
    app: &mut dyn Application,
) {
    // engine-init: nothing control-specific beyond construction.
    shared.barrier.wait();
    shared.barrier.wait();

    let state = RefCell::new(ControlState { entities, app });

    guarded_stage(shared, "control", "application initialization", || {
        let mut state = state.borrow_mut();
        let state = &mut *state;
        let entities = &mut *state.entities;
        let app = &mut *state.app;
        let mut ctx = ControlContext {
            entities,
            assets: &shared.assets,
            config: &shared.config,
            time: shared.clock.now_us(),
            stop: &shared.stopping,
        };
        app.initialize(&mut ctx);
    });
    shared.barrier.wait();

    guarded_stage(shared, "control", "gameloop", || {
        run_control_gameloop(shared, window, &state);
    });

    // stop stage: wake whoever waits on us. Nothing to release here; the
    // graphics threads unblock each other.
    shared.barrier.wait();

    guarded_stage(shared, "control", "application finalization", || {
        let mut state = state.borrow_mut();
        let state = &mut *state;
        let entities = &mut *state.entities;
        let app = &mut *state.app;
        let mut ctx = ControlContext {
            entities,
            assets: &shared.assets,
            config: &shared.config,
            time: shared.clock.now_us(),
            stop: &shared.stopping,
        };
        app.finalize(&mut ctx);
    });
}

fn run_control_gameloop(
    shared: &Arc<Shared>,
    window: &Arc<Mutex<Box<dyn WindowService>>>,
    state: &RefCell<ControlState<'_>>,
) {
    let mut scheduler = Scheduler::new(shared.clock.clone());
    let stop_handle = scheduler.stop_handle();

    // Update task: history snapshot, app update, then both emits.
    {
        let stop_handle = stop_handle.clone();
        scheduler.add(
            "control update",
            ScheduleKind::SteadyPeriodic,
            shared.update_period_us,
            move |time| {
                if shared.stopping() {
                    stop_handle.stop();
                    return;
                }
                let mut state = state.borrow_mut();
                let state = &mut *state;
                let entities = &mut *state.entities;
                let app = &mut *state.app;
                entities.snapshot_history();
                {
                    let mut ctx = ControlContext {
                        entities,
                        assets: &shared.assets,
                        config: &shared.config,
                        time,
                        stop: &shared.stopping,
                    };
                    app.update(&mut ctx);
                }
                shared.sound.emit(entities, time);
                shared.graphics.emit(entities, time);
                shared.stats.lock().entities.add(entities.count() as i64);
            },
        );
    }

    // Input task: window events, GUI layout, hot-reload routing.
    scheduler.add(
        "control input",
        ScheduleKind::FreePeriodic,
        shared.input_period_us,
        move |time| {
            if shared.stopping() {
                stop_handle.stop();
                return;
            }
            let events = window.lock().poll_events();
            let mut state = state.borrow_mut();
            let state = &mut *state;
            let entities = &mut *state.entities;
            let app = &mut *state.app;
            let mut ctx = ControlContext {
                entities,
                assets: &shared.assets,
                config: &shared.config,
                time,
                stop: &shared.stopping,
            };
            for event in &events {
                match event {
                    WindowEvent::Close => {
                        log::info!("window close requested, stopping engine");
                        shared.request_stop();
                    }
                    WindowEvent::Resize(size) => shared.set_window_resolution(*size),
                    _ => {}
                }
                app.input(event, &mut ctx);
            }
            if let Some(queue) = app.layout_gui(&mut ctx) {
                *shared.gui_queue.lock() = Some(queue);
            }
            while shared.assets.process_thread(LoaderThread::Control) {}
            shared.assets.drain_reloads(|name| {
                log::info!("asset reload requested: {name}");
                let _ = shared.reloads.0.send(AssetId::from_name(name));
            });
        },
    );

    scheduler.run();
}

// ─── Graphics prepare thread ──────────────────────────────────────────────────

fn graphics_prepare_entry(shared: &Arc<Shared>) {
    // engine-init
    shared.barrier.wait();
    shared.barrier.wait();
    // app-init: control-side only.
    shared.barrier.wait();

    guarded_stage(shared, "graphics prepare", "gameloop", || {
        while !shared.stopping() {
            let _guard =
                ScopedSemaphores::new(&shared.semaphore_prepare, &shared.semaphore_dispatch);
            let started = shared.clock.now_us();
            shared.graphics.prepare(
                &shared.assets,
                &shared.config,
                shared.window_resolution(),
                started,
            );
            let output = shared.graphics.prepare_output();
            let mut stats = shared.stats.lock();
            stats.prepare_us.add((shared.clock.now_us() - started) as i64);
            stats.draw_calls.add(i64::from(output.draw_calls));
            stats.draw_primitives.add(output.primitives as i64);
        }
    });

    // stop stage: unblock dispatch if it waits on us.
    shared.semaphore_dispatch.release();
    shared.barrier.wait();
}

// ─── Graphics dispatch thread ─────────────────────────────────────────────────

fn graphics_dispatch_entry(
    shared: &Arc<Shared>,
    window: &Arc<Mutex<Box<dyn WindowService>>>,
    mut gpu: Box<dyn GraphicsApi>,
) {
    let mut dispatch = GraphicsDispatch::new();

    guarded_stage(shared, "graphics dispatch", "engine initialization", || {
        window.lock().make_current();
    });
    shared.barrier.wait();
    shared.barrier.wait();
    shared.barrier.wait();

    guarded_stage(shared, "graphics dispatch", "gameloop", || {
        while !shared.stopping() {
            let frame_start = shared.clock.now_us();
            {
                let _guard =
                    ScopedSemaphores::new(&shared.semaphore_dispatch, &shared.semaphore_prepare);
                let started = shared.clock.now_us();
                shared
                    .graphics
                    .dispatch(&mut dispatch, gpu.as_mut(), &shared.assets);
                shared
                    .stats
                    .lock()
                    .dispatch_us
                    .add((shared.clock.now_us() - started) as i64);
            }

            // GUI commands recorded by the external collaborator.
            if let Some(gui_queue) = shared.gui_queue.lock().take() {
                dispatch.execute(
                    &gui_queue,
                    gpu.as_mut(),
                    &shared.assets,
                    &shared.graphics.provisional,
                );
            }

            // Reloaded assets lose their cached GPU incarnations.
            while let Ok(id) = shared.reloads.1.try_recv() {
                dispatch.invalidate_asset(id);
            }

            // Scheme loaders pinned to this thread.
            {
                let _lock = shared.assets_graphics_mutex.lock();
                while shared.assets.process_thread(LoaderThread::GraphicsDispatch) {}
            }

            window.lock().swap_buffers();
            gpu.finish();
            shared.graphics.end_frame(&mut dispatch, gpu.as_mut());
            shared
                .stats
                .lock()
                .frame_us
                .add((shared.clock.now_us() - frame_start) as i64);
        }
    });

    // stop stage: unblock prepare if it waits on us.
    shared.semaphore_prepare.release();
    shared.barrier.wait();

    guarded_stage(shared, "graphics dispatch", "engine finalization", || {
        window.lock().make_not_current();
    });
}

// ─── Sound thread ─────────────────────────────────────────────────────────────

fn sound_entry(shared: &Arc<Shared>, mut speaker: Box<dyn Speaker>) {
    guarded_stage(shared, "sound", "engine initialization", || {
        speaker.start();
    });
    shared.barrier.wait();
    shared.barrier.wait();
    shared.barrier.wait();

    guarded_stage(shared, "sound", "gameloop", || {
        let mut scheduler = Scheduler::new(shared.clock.clone());
        let stop_handle = scheduler.stop_handle();
        let speaker = RefCell::new(&mut speaker);
        scheduler.add(
            "sound update",
            ScheduleKind::SteadyPeriodic,
            shared.sound_period_us,
            move |time| {
                if shared.stopping() {
                    stop_handle.stop();
                    return;
                }
                shared.sound.tick(&shared.assets, time);
                shared.sound.dispatch(speaker.borrow_mut().as_mut());
                let _lock = shared.assets_sound_mutex.lock();
                while shared.assets.process_thread(LoaderThread::Sound) {}
            },
        );
        scheduler.run();
    });

    guarded_stage(shared, "sound", "stop", || {
        speaker.stop();
    });
    shared.barrier.wait();
}
