use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowBuilder};

use crate::error::{BootstrapError, RenderError};
use crate::gpu::GpuState;
use crate::runtime::{ControlKey, RenderContext, SystemTimeSource};
use crate::scene::Scene;
use crate::types::RendererConfig;

/// GPU state, loop state and the window they render into.
///
/// The window is declared last so it outlives the surface created from it.
struct WindowState {
    gpu: GpuState,
    context: RenderContext,
    window: Window,
}

impl WindowState {
    fn new(window: Window, config: &RendererConfig, scene: &Scene) -> Result<Self, RenderError> {
        let gpu = GpuState::new(&window, window.inner_size(), config, scene)?;
        Ok(Self {
            gpu,
            context: RenderContext::new(Box::new(SystemTimeSource::new())),
            window,
        })
    }

    fn handle_key(&mut self, code: KeyCode, state: ElementState) {
        if let Some(key) = control_key(code) {
            self.context.set_key(key, state == ElementState::Pressed);
        }
    }

    /// Plans and draws one frame. `Ok(false)` means the loop should stop.
    fn redraw(&mut self) -> Result<bool, RenderError> {
        let Some(plan) = self.context.begin_frame() else {
            return Ok(false);
        };
        let Err(error) = self.gpu.render(&plan) else {
            return Ok(true);
        };
        match recovery_for(error) {
            SurfaceRecovery::Reconfigure => {
                debug!("surface lost or outdated; reconfiguring");
                let size = self.window.inner_size();
                if size == self.gpu.size() {
                    self.gpu.reconfigure();
                } else {
                    self.gpu.resize(size);
                }
            }
            SurfaceRecovery::SkipFrame => warn!("surface timeout; retrying next frame"),
            SurfaceRecovery::Fatal(err) => return Err(err),
        }
        Ok(true)
    }
}

/// Opens the window and runs the render loop until it is closed.
///
/// Must be called from the main thread. Returns once every GPU resource has
/// been released.
pub(crate) fn run_window(config: &RendererConfig, scene: &Scene) -> Result<(), RenderError> {
    let event_loop = EventLoop::new().map_err(|err| BootstrapError::EventLoop(err.to_string()))?;
    let (width, height) = config.surface_size;
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(PhysicalSize::new(width, height))
        .with_resizable(true)
        .build(&event_loop)
        .map_err(|err| BootstrapError::Window(err.to_string()))?;

    let mut state = WindowState::new(window, config, scene)?;
    let mut fatal = None;

    event_loop.set_control_flow(ControlFlow::Poll);
    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window.id() => match event {
            WindowEvent::CloseRequested => state.context.request_close(),
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    state.handle_key(code, event.state);
                }
            }
            WindowEvent::Resized(new_size) => state.gpu.resize(new_size),
            WindowEvent::RedrawRequested => match state.redraw() {
                Ok(true) => {}
                Ok(false) => elwt.exit(),
                Err(err) => {
                    error!(error = %err, "render loop stopped");
                    fatal = Some(err);
                    elwt.exit();
                }
            },
            _ => {}
        },
        Event::AboutToWait => {
            if state.context.is_running() {
                state.window.request_redraw();
            } else {
                elwt.exit();
            }
        }
        Event::LoopExiting => info!("render loop exiting"),
        _ => {}
    });

    drop(state);
    info!("renderer shut down");

    if let Some(err) = fatal {
        return Err(err);
    }
    run_result.map_err(|err| RenderError::EventLoop(err.to_string()))
}

/// What the loop does after acquiring or presenting a frame failed.
#[derive(Debug)]
enum SurfaceRecovery {
    Reconfigure,
    SkipFrame,
    Fatal(RenderError),
}

/// Lost and outdated surfaces are rebuilt and a timeout skips one frame.
/// Anything else ends the loop.
fn recovery_for(error: wgpu::SurfaceError) -> SurfaceRecovery {
    match error {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => SurfaceRecovery::Reconfigure,
        wgpu::SurfaceError::Timeout => SurfaceRecovery::SkipFrame,
        wgpu::SurfaceError::OutOfMemory => SurfaceRecovery::Fatal(RenderError::SurfaceOutOfMemory),
        other => SurfaceRecovery::Fatal(RenderError::Surface(other.to_string())),
    }
}

fn control_key(code: KeyCode) -> Option<ControlKey> {
    match code {
        KeyCode::Escape => Some(ControlKey::Escape),
        KeyCode::F1 => Some(ControlKey::F1),
        KeyCode::F2 => Some(ControlKey::F2),
        _ => None,
    }
}
