use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;
use portalis_core::backend::{BackendError, ViewerCamera};
use portalis_core::frame::FrameState;
use portalis_core::scheduler::{FrameScheduler, RunSummary, SchedulerError};
use portalis_core::tick::{FixedTicks, Tick};
use portalis_shared::layout::{LayoutError, SceneLayout};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::camera::{OrbitCamera, OrbitControls};
use crate::renderer::{Renderer, RendererInitError, RendererOptions};
use crate::scene::GeometryRegistry;

const SETTINGS_PATH: &str = "portalis_settings.toml";
const USAGE: &str = "usage: portalis_client [--headless <frames>] [--layout <layout.toml>]";

const MIN_WINDOW_DIMENSION: u32 = 64;
const MAX_WINDOW_DIMENSION: u32 = 8192;
const MIN_FOV: f32 = 20.0;
const MAX_FOV: f32 = 120.0;
const MIN_TEXTURE_SIZE: u32 = 16;
const MAX_TEXTURE_SIZE: u32 = 4096;
const MIN_ORBIT_SENSITIVITY: f32 = 0.0005;
const MAX_ORBIT_SENSITIVITY: f32 = 0.05;
const MIN_ZOOM_STEP: f32 = 0.01;
const MAX_ZOOM_STEP: f32 = 0.5;

const MAX_FRAME_DELTA: f32 = 0.25;
const HEADLESS_FRAME_DELTA: f32 = 1.0 / 60.0;
const HEADLESS_ORBIT_STEP: f32 = 0.01;
const PIXELS_PER_SCROLL_LINE: f32 = 50.0;
const STATS_LOG_INTERVAL_FRAMES: u64 = 600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ClientSettings {
    #[serde(default = "default_window_width")]
    window_width: u32,
    #[serde(default = "default_window_height")]
    window_height: u32,
    #[serde(default = "default_fov")]
    fov: f32,
    #[serde(default = "default_portal_texture_size")]
    portal_texture_size: u32,
    #[serde(default = "default_pattern_texture_size")]
    pattern_texture_size: u32,
    #[serde(default = "default_orbit_sensitivity")]
    orbit_sensitivity: f32,
    #[serde(default = "default_zoom_step")]
    zoom_step: f32,
    #[serde(default)]
    layout: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            fov: default_fov(),
            portal_texture_size: default_portal_texture_size(),
            pattern_texture_size: default_pattern_texture_size(),
            orbit_sensitivity: default_orbit_sensitivity(),
            zoom_step: default_zoom_step(),
            layout: None,
        }
    }
}

impl ClientSettings {
    fn sanitize(mut self) -> Self {
        self.window_width = self
            .window_width
            .clamp(MIN_WINDOW_DIMENSION, MAX_WINDOW_DIMENSION);
        self.window_height = self
            .window_height
            .clamp(MIN_WINDOW_DIMENSION, MAX_WINDOW_DIMENSION);
        self.fov = self.fov.clamp(MIN_FOV, MAX_FOV);
        self.portal_texture_size = self
            .portal_texture_size
            .clamp(MIN_TEXTURE_SIZE, MAX_TEXTURE_SIZE);
        self.pattern_texture_size = self
            .pattern_texture_size
            .clamp(MIN_TEXTURE_SIZE, MAX_TEXTURE_SIZE);
        self.orbit_sensitivity = self
            .orbit_sensitivity
            .clamp(MIN_ORBIT_SENSITIVITY, MAX_ORBIT_SENSITIVITY);
        self.zoom_step = self.zoom_step.clamp(MIN_ZOOM_STEP, MAX_ZOOM_STEP);
        if self.layout.as_deref().is_some_and(|path| path.trim().is_empty()) {
            self.layout = None;
        }
        self
    }

    fn load(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let parsed = toml::from_str::<Self>(&contents).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to deserialize settings: {e}"),
            )
        })?;
        Ok(parsed.sanitize())
    }

    fn save(&self, path: &Path) -> io::Result<()> {
        let settings = self.clone().sanitize();
        let serialized = toml::to_string_pretty(&settings).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to serialize settings: {e}"),
            )
        })?;
        fs::write(path, serialized)
    }

    fn renderer_options(&self) -> RendererOptions {
        RendererOptions {
            portal_texture_size: self.portal_texture_size,
            pattern_texture_size: self.pattern_texture_size,
        }
    }

    fn orbit_camera(&self, width: u32, height: u32) -> OrbitCamera {
        let mut camera = OrbitCamera::default();
        camera.fov = self.fov.to_radians();
        if width > 0 && height > 0 {
            camera.aspect = width as f32 / height as f32;
        }
        camera
    }
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

fn default_fov() -> f32 {
    75.0
}

fn default_portal_texture_size() -> u32 {
    256
}

fn default_pattern_texture_size() -> u32 {
    512
}

fn default_orbit_sensitivity() -> f32 {
    0.005
}

fn default_zoom_step() -> f32 {
    0.1
}

fn load_or_create_settings(path: &Path) -> ClientSettings {
    match ClientSettings::load(path) {
        Ok(settings) => settings,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let settings = ClientSettings::default();
            if let Err(save_err) = settings.save(path) {
                warn!(
                    "Failed to create default settings at {}: {save_err}",
                    path.display()
                );
            }
            settings
        }
        Err(err) => {
            warn!("Failed to load settings from {}: {err}", path.display());
            ClientSettings::default()
        }
    }
}

fn load_layout(path: Option<&Path>) -> Result<SceneLayout, LayoutError> {
    match path {
        Some(path) => SceneLayout::load(path),
        None => {
            info!("No layout configured; using the built-in three-room scene");
            Ok(SceneLayout::default())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct LaunchOptions {
    headless_frames: Option<u64>,
    layout: Option<PathBuf>,
}

fn parse_args<I>(args: I) -> Result<LaunchOptions, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = LaunchOptions::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--headless" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--headless needs a frame count".to_string())?;
                let frames = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid frame count: {value}"))?;
                options.headless_frames = Some(frames);
            }
            "--layout" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--layout needs a path".to_string())?;
                options.layout = Some(PathBuf::from(value));
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(options)
}

#[derive(Debug)]
enum ClientError {
    Renderer(RendererInitError),
    Layout(LayoutError),
    Scheduler(SchedulerError),
    Frame(BackendError),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Renderer(err) => write!(f, "failed to initialize renderer: {err}"),
            Self::Layout(err) => write!(f, "invalid scene layout: {err}"),
            Self::Scheduler(err) => write!(f, "failed to set up portal passes: {err}"),
            Self::Frame(err) => write!(f, "frame failed: {err}"),
        }
    }
}

impl std::error::Error for ClientError {}

struct Runtime {
    renderer: Renderer,
    scheduler: FrameScheduler,
}

fn build_runtime(mut renderer: Renderer, layout: &SceneLayout) -> Result<Runtime, ClientError> {
    let mut portals = layout.build_portal_scene().map_err(ClientError::Layout)?;
    let registry = GeometryRegistry::from_layout(layout, &portals);
    renderer.prepare_scene(&mut portals, &registry);
    let scheduler = FrameScheduler::new(portals, &renderer).map_err(ClientError::Scheduler)?;
    info!(
        "Portal scene ready with {} pair(s)",
        scheduler.scene().len()
    );
    Ok(Runtime {
        renderer,
        scheduler,
    })
}

fn run_headless(
    settings: &ClientSettings,
    layout: &SceneLayout,
    frames: u64,
) -> Result<RunSummary, ClientError> {
    let renderer = Renderer::new_headless(
        settings.window_width,
        settings.window_height,
        settings.renderer_options(),
    )
    .map_err(ClientError::Renderer)?;
    let mut runtime = build_runtime(renderer, layout)?;

    let mut camera = settings.orbit_camera(settings.window_width, settings.window_height);
    let mut controls = move |_: &Tick, _: &FrameState| -> ViewerCamera {
        camera.orbit(HEADLESS_ORBIT_STEP, 0.0);
        camera.viewer_camera()
    };
    let mut ticks = FixedTicks::new(frames, HEADLESS_FRAME_DELTA);
    runtime
        .scheduler
        .run(&mut ticks, &mut runtime.renderer, &mut controls)
        .map_err(ClientError::Frame)
}

struct ClientApp {
    settings: ClientSettings,
    layout: SceneLayout,
    window: Option<Arc<Window>>,
    runtime: Option<Runtime>,
    controls: OrbitControls,
    last_frame: Option<Instant>,
}

impl ClientApp {
    fn new(settings: ClientSettings, layout: SceneLayout) -> Self {
        let controls = OrbitControls::new(
            settings.orbit_camera(settings.window_width, settings.window_height),
            settings.orbit_sensitivity,
            settings.zoom_step,
        );
        Self {
            settings,
            layout,
            window: None,
            runtime: None,
            controls,
            last_frame: None,
        }
    }

    fn update_and_render(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let delta_seconds = self
            .last_frame
            .map_or(0.0, |last| now.duration_since(last).as_secs_f32())
            .min(MAX_FRAME_DELTA);
        self.last_frame = Some(now);

        let Some(runtime) = self.runtime.as_mut() else {
            return;
        };
        let tick = Tick { delta_seconds };
        match runtime
            .scheduler
            .tick(tick, &mut runtime.renderer, &mut self.controls)
        {
            Ok(report) => {
                if report.frame_index % STATS_LOG_INTERVAL_FRAMES == 0 {
                    let stats = runtime.renderer.last_frame_stats();
                    debug!(
                        "Frame {}: {} portal passes rendered, {} skipped, {} failed; {} scene passes, {} draw calls, {} hidden surfaces",
                        report.frame_index,
                        report.passes_rendered,
                        report.passes_skipped,
                        report.passes_failed,
                        stats.scene_passes,
                        stats.draw_calls,
                        stats.skipped_surfaces
                    );
                }
            }
            Err(BackendError::SurfaceLost) => runtime.renderer.reconfigure(),
            Err(BackendError::SurfaceTimeout) => warn!("Timed out acquiring the next frame"),
            Err(BackendError::OutOfMemory) => {
                error!("Graphics device is out of memory; shutting down");
                event_loop.exit();
            }
            Err(err) => warn!("Frame failed: {err}"),
        }
    }
}

impl ApplicationHandler for ClientApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("Portalis")
            .with_inner_size(PhysicalSize::new(
                self.settings.window_width,
                self.settings.window_height,
            ));
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                error!("failed to create client window: {err}");
                event_loop.exit();
                return;
            }
        };

        let runtime = Renderer::new(window.clone(), self.settings.renderer_options())
            .map_err(ClientError::Renderer)
            .and_then(|renderer| build_runtime(renderer, &self.layout));
        match runtime {
            Ok(runtime) => {
                let size = window.inner_size();
                if size.width > 0 && size.height > 0 {
                    self.controls.camera.aspect = size.width as f32 / size.height as f32;
                }
                info!("Client window and renderer initialized");
                self.window = Some(window);
                self.runtime = Some(runtime);
                self.last_frame = Some(Instant::now());
            }
            Err(err) => {
                error!("{err}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window.as_ref().map(|window| window.id()) != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested; shutting down client event loop");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(runtime) = self.runtime.as_mut() {
                    runtime.renderer.resize(size.width, size.height);
                }
                if size.width > 0 && size.height > 0 {
                    self.controls.camera.aspect = size.width as f32 / size.height as f32;
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                match event.state {
                    ElementState::Pressed if code == KeyCode::Escape => event_loop.exit(),
                    ElementState::Pressed => self.controls.input.press_key(code),
                    ElementState::Released => self.controls.input.release_key(code),
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.controls.input.dragging = state == ElementState::Pressed;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => {
                        position.y as f32 / PIXELS_PER_SCROLL_LINE
                    }
                };
                self.controls.input.add_scroll(lines);
            }
            WindowEvent::RedrawRequested => {
                self.update_and_render(event_loop);
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.controls
                .input
                .add_mouse_delta(Vec2::new(delta.0 as f32, delta.1 as f32));
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

pub fn run() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("{USAGE}");
            process::exit(2);
        }
    };

    let settings = load_or_create_settings(Path::new(SETTINGS_PATH));
    let layout_path = options
        .layout
        .clone()
        .or_else(|| settings.layout.as_ref().map(PathBuf::from));
    let layout = match load_layout(layout_path.as_deref()) {
        Ok(layout) => layout,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };

    if let Some(frames) = options.headless_frames {
        match run_headless(&settings, &layout, frames) {
            Ok(summary) => info!(
                "Rendered {} headless frame(s): {} portal passes, {} skipped, {} failed",
                summary.frames,
                summary.passes_rendered,
                summary.passes_skipped,
                summary.passes_failed
            ),
            Err(err) => {
                eprintln!("Headless run failed: {err}");
                process::exit(1);
            }
        }
        return;
    }

    let event_loop = match EventLoop::new() {
        Ok(loop_handle) => loop_handle,
        Err(err) => {
            eprintln!("Failed to create event loop: {err}");
            return;
        }
    };

    let mut app = ClientApp::new(settings, layout);
    if let Err(err) = event_loop.run_app(&mut app) {
        eprintln!("Event loop exited with error: {err}");
    }
}
