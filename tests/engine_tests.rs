//! Engine Lifecycle Tests
//!
//! Tests for:
//! - Full four-thread startup, gameloop, and clean shutdown
//! - Control-tick cadence: history snapshots, emits, app updates
//! - Frames reaching the window (swap count) while the engine runs
//! - Stop requests converting into a joined, finalized engine

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use glam::{UVec2, Vec3};

use ember::engine::{Application, ControlContext, Engine, EngineCreateConfig};
use ember::platform::gpu::RecordingGpu;
use ember::platform::speaker::NullSpeaker;
use ember::platform::window::{HeadlessWindow, WindowEvent, WindowService};
use ember::scene::components::{CameraComponent, RenderComponent};
use ember::scene::Transform;
use ember::Config;

/// Headless window that shares its swap counter with the test.
struct CountingWindow {
    inner: HeadlessWindow,
    swaps: Arc<AtomicU32>,
}

impl WindowService for CountingWindow {
    fn make_current(&mut self) {
        self.inner.make_current();
    }

    fn make_not_current(&mut self) {
        self.inner.make_not_current();
    }

    fn resolution(&self) -> UVec2 {
        self.inner.resolution()
    }

    fn swap_buffers(&mut self) {
        self.inner.swap_buffers();
        self.swaps.fetch_add(1, Ordering::Relaxed);
    }

    fn poll_events(&mut self) -> Vec<WindowEvent> {
        self.inner.poll_events()
    }
}

struct TestApp {
    model: ember::assets::AssetId,
    updates: u32,
    initialized: bool,
    finalized: bool,
}

impl Application for TestApp {
    fn initialize(&mut self, ctx: &mut ControlContext<'_>) {
        self.initialized = true;
        let camera = ctx.entities.spawn();
        ctx.entities.transforms.insert(camera, Transform::IDENTITY);
        ctx.entities.cameras.insert(camera, CameraComponent::default());

        let cube = ctx.entities.spawn();
        ctx.entities
            .transforms
            .insert(cube, Transform::from_position(Vec3::new(0.0, 0.0, -5.0)));
        ctx.entities.renders.insert(
            cube,
            RenderComponent {
                object: self.model,
                ..RenderComponent::default()
            },
        );
    }

    fn update(&mut self, ctx: &mut ControlContext<'_>) {
        self.updates += 1;
        // Nudge the cube so interpolation has real history to blend.
        for (_, transform) in &mut ctx.entities.transforms {
            transform.position.x += 0.01;
        }
        if self.updates >= 5 {
            ctx.stop_engine();
        }
    }

    fn finalize(&mut self, _ctx: &mut ControlContext<'_>) {
        self.finalized = true;
    }
}

#[test]
fn engine_runs_and_stops_cleanly() {
    common::init_test_logging();
    let swaps = Arc::new(AtomicU32::new(0));
    let window = CountingWindow {
        inner: HeadlessWindow::new(640, 480),
        swaps: Arc::clone(&swaps),
    };

    let mut engine = Engine::new(EngineCreateConfig {
        window: Box::new(window),
        gpu: Box::new(RecordingGpu::new()),
        speaker: Box::new(NullSpeaker::default()),
        config: Config::new(),
        stereo: false,
    });
    common::install_builtin_assets(engine.assets());
    let quad = engine.assets().insert_named("model/engine-quad", common::quad_model());

    let mut app = TestApp {
        model: quad,
        updates: 0,
        initialized: false,
        finalized: false,
    };
    engine.run(&mut app).expect("engine runs to completion");

    assert!(app.initialized);
    assert!(app.finalized);
    assert!(app.updates >= 5, "update task must reach the stop request");
    assert!(
        swaps.load(Ordering::Relaxed) > 0,
        "dispatch must swap at least one frame"
    );
    let stats = engine.statistics();
    assert!(stats.entities >= 2, "statistics track the entity count");
}

#[test]
fn running_twice_is_an_error() {
    common::init_test_logging();
    let mut engine = Engine::new(EngineCreateConfig {
        window: Box::new(HeadlessWindow::new(64, 64)),
        gpu: Box::new(RecordingGpu::new()),
        speaker: Box::new(NullSpeaker::default()),
        config: Config::new(),
        stereo: false,
    });
    struct StopImmediately;
    impl Application for StopImmediately {
        fn update(&mut self, ctx: &mut ControlContext<'_>) {
            ctx.stop_engine();
        }
    }
    engine.run(&mut StopImmediately).unwrap();
    assert!(engine.run(&mut StopImmediately).is_err());
}
