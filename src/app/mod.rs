mod egui_host;
mod input;
mod timing;

use crate::assets::{AssetEvent, AssetNotifier, AssetProvider, TextureOptions, TextureSlot};
use crate::config::{AppConfig, Cli, ConfigError};
use crate::context::RenderContext;
use crate::render::{DirectorySink, RenderError, RenderLoop, Renderer};
use crate::ui::{build_control_panel, ControlPanel};
use clap::Parser;
use egui_host::EguiHost;
use input::{Drag, InputState};
use timing::FrameTiming;

use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

const ORBIT_RADIANS_PER_PX: f32 = 0.005;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Events posted to the event loop from other threads.
pub enum AppEvent {
    Asset(AssetEvent),
}

impl AssetNotifier for EventLoopProxy<AppEvent> {
    fn notify(&self, event: AssetEvent) {
        if self.send_event(AppEvent::Asset(event)).is_err() {
            log::debug!("Event loop closed; discarding asset completion.");
        }
    }
}

/// Everything that exists only while a window does.
struct Session {
    window: Arc<Window>,
    renderer: Renderer,
    egui: EguiHost,
    context: RenderContext,
    panel: ControlPanel,
}

pub struct App {
    config: AppConfig,
    proxy: EventLoopProxy<AppEvent>,
    session: Option<Session>,
    render_loop: RenderLoop<DirectorySink>,
    input: InputState,
    ui_wants_pointer: bool,
    ui_wants_keyboard: bool,
    timing: FrameTiming,
    target_frame_duration: Duration,
    next_frame_time: Instant,
    fatal: Option<AppError>,
}

impl App {
    fn new(config: AppConfig, proxy: EventLoopProxy<AppEvent>) -> Self {
        let now = Instant::now();
        Self {
            render_loop: RenderLoop::new(DirectorySink::new(&config.capture.directory)),
            timing: FrameTiming::new(config.window.title.clone(), now),
            config,
            proxy,
            session: None,
            input: InputState::default(),
            ui_wants_pointer: false,
            ui_wants_keyboard: false,
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: now,
            fatal: None,
        }
    }

    /// Builds the scene, kicks off asset loads, wires the panel and starts the
    /// loop. Assets complete later through [`AppEvent::Asset`].
    fn start_session(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        let window_attrs = WindowAttributes::default()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(true);
        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let size = window.inner_size();
        log::info!("Window created: {}x{}", size.width, size.height);

        let renderer = Renderer::new(window.clone())?;
        let egui = EguiHost::new(&window);

        let mut context = RenderContext::new(&self.config);
        context.resize(size.width, size.height);

        let provider = AssetProvider::new(self.proxy.clone(), &self.config.assets.root);
        let options = TextureOptions { flip_y: false };
        provider.load_mesh(&self.config.assets.mesh, context.ticket());
        provider.load_texture(
            &self.config.assets.diffuse,
            TextureSlot::Diffuse,
            options,
            context.ticket(),
        );
        provider.load_texture(
            &self.config.assets.ambient_occlusion,
            TextureSlot::AmbientOcclusion,
            options,
            context.ticket(),
        );

        let panel = build_control_panel(&context);
        self.update_target_frame_duration(&window);
        self.session = Some(Session {
            window,
            renderer,
            egui,
            context,
            panel,
        });
        self.render_loop.start();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: AppError) {
        log::error!("{}", err);
        self.fatal = Some(err);
        event_loop.exit();
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(session) = &mut self.session {
            session.renderer.resize(new_size.width, new_size.height);
            session.context.resize(new_size.width, new_size.height);
        }
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(millihz) = window
            .current_monitor()
            .and_then(|monitor| monitor.refresh_rate_millihertz())
        {
            let hz = millihz as f32 / 1000.0;
            if hz > 1.0 {
                target = Duration::from_secs_f32(1.0 / hz);
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn handle_drag(&mut self, drag: Drag) {
        let Some(session) = &mut self.session else {
            return;
        };
        let camera = &mut session.context.camera;
        match drag {
            Drag::Orbit { dx, dy } => {
                camera.orbit(-dx * ORBIT_RADIANS_PER_PX, dy * ORBIT_RADIANS_PER_PX)
            }
            Drag::Pan { dx, dy } => camera.pan(dx, dy),
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(session) = &mut self.session else {
            return;
        };
        if let Some(title) = self.timing.tick(Instant::now()) {
            session.window.set_title(&title);
        }
        session
            .context
            .camera
            .update_movement(&self.input.movement(), self.timing.frame_dt());

        let Session {
            window,
            renderer,
            egui,
            context,
            panel,
        } = session;
        let frame = egui.run(window, |egui_ctx| panel.show(egui_ctx, context));
        self.ui_wants_pointer = frame.wants_pointer;
        self.ui_wants_keyboard = frame.wants_keyboard;
        if let Err(err) = renderer.update_ui(
            &frame.clipped_primitives,
            &frame.textures_delta,
            frame.pixels_per_point,
        ) {
            log::warn!("Panel update failed: {}", err);
        }

        match self.render_loop.tick(context, renderer) {
            Ok(report) => {
                if report.captured {
                    log::debug!("Capture delivered on frame {}", report.frame);
                }
            }
            Err(RenderError::Surface(wgpu::SurfaceError::Outdated)) => {
                log::debug!("Surface outdated; reconfiguring");
                renderer.reconfigure();
            }
            Err(err) if err.is_fatal() => {
                self.fail(event_loop, err.into());
                return;
            }
            Err(err) => log::warn!("Frame skipped: {}", err),
        }
        self.timing.set_render_ms(renderer.last_render_ms());
    }
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() {
            return;
        }
        if let Err(err) = self.start_session(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::Asset(event) => match &mut self.session {
                Some(session) => {
                    session.context.complete_asset(event);
                    session.window.request_redraw();
                }
                None => log::debug!("Asset completed without a live session; dropping"),
            },
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let consumed = match &mut self.session {
            Some(session) => session.egui.on_window_event(&session.window, &event),
            None => false,
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Focused(false) => self.input.release_all(),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    event_loop.exit();
                    return;
                }
                let pressed = event.state == ElementState::Pressed;
                // Releases always go through so keys cannot stick.
                if !pressed || !(consumed || self.ui_wants_keyboard) {
                    self.input.handle_key(event.physical_key, pressed);
                }
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
                if let Some(window) = self.session.as_ref().map(|s| s.window.clone()) {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.session.as_ref().map(|s| s.window.inner_size()) {
                    self.handle_resize(size);
                }
            }
            WindowEvent::Moved(_) => {
                if let Some(window) = self.session.as_ref().map(|s| s.window.clone()) {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let drag = self
                    .input
                    .cursor_moved(position.x as f32, position.y as f32);
                if let Some(drag) = drag {
                    if !self.ui_wants_pointer {
                        self.handle_drag(drag);
                    }
                }
            }
            WindowEvent::CursorLeft { .. } => self.input.cursor_left(),
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = state == ElementState::Pressed;
                if !pressed || !(consumed || self.ui_wants_pointer) {
                    self.input.handle_button(button, pressed);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if consumed || self.ui_wants_pointer {
                    return;
                }
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
                };
                if let Some(session) = &mut self.session {
                    session.context.camera.zoom(steps);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(session) = &self.session {
                session.window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }
}

pub fn run() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_cli(&cli)?;
    log::info!("Light rig viewer starting ({:?} light policy)", config.light.policy);
    log::info!("   Press ESC or close window to exit");

    let event_loop = EventLoop::<AppEvent>::with_user_event().build()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config, event_loop.create_proxy());
    event_loop.run_app(&mut app)?;

    if let Some(err) = app.fatal.take() {
        return Err(err);
    }
    log::info!("Goodbye!");
    Ok(())
}
