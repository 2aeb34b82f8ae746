use crate::context::RenderContext;
use crate::render::capture::{CaptureService, CaptureSink, FrameSource};
use crate::render::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    pub captured: bool,
}

/// The piece of the renderer the loop drives: draws the scene, and can read
/// the drawn frame back for capture.
pub trait FrameBackend: FrameSource {
    fn draw(&mut self, ctx: &RenderContext) -> Result<(), RenderError>;
}

pub struct RenderLoop<S: CaptureSink> {
    state: LoopState,
    frame: u64,
    capture: CaptureService<S>,
}

impl<S: CaptureSink> RenderLoop<S> {
    pub fn new(sink: S) -> Self {
        Self {
            state: LoopState::Idle,
            frame: 0,
            capture: CaptureService::new(sink),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> LoopState {
        self.state
    }

    #[cfg(test)]
    pub fn capture_service(&self) -> &CaptureService<S> {
        &self.capture
    }

    /// Idle -> Running. Does not wait for assets.
    pub fn start(&mut self) {
        if self.state == LoopState::Idle {
            self.state = LoopState::Running;
            log::info!("Render loop running");
        }
    }

    /// Runs one frame: light state, uniforms, draw, then capture.
    ///
    /// A draw failure ends the frame before capture, leaving any capture
    /// request pending. Capture failures are logged and consume the request.
    pub fn tick(
        &mut self,
        ctx: &mut RenderContext,
        backend: &mut dyn FrameBackend,
    ) -> Result<FrameReport, RenderError> {
        if self.state == LoopState::Idle {
            log::debug!("tick before start; ignoring");
            return Ok(FrameReport {
                frame: self.frame,
                captured: false,
            });
        }

        ctx.apply_light_state();
        ctx.refresh_uniforms();
        backend.draw(ctx)?;

        let mut request = ctx.capture;
        let captured = match self.capture.service_if_requested(&mut request, &mut *backend, ctx) {
            Ok(path) => path.is_some(),
            Err(err) => {
                log::error!("Capture failed: {}", err);
                false
            }
        };
        ctx.capture = request;

        self.frame += 1;
        log::trace!("frame {} done (captured: {})", self.frame, captured);
        Ok(FrameReport {
            frame: self.frame,
            captured,
        })
    }
}
