use winit::event::WindowEvent;
use winit::window::Window;

/// Tessellated panel output for one frame, plus whether the panel wants the
/// pointer or keyboard for itself.
pub struct PanelFrame {
    pub clipped_primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
    pub wants_pointer: bool,
    pub wants_keyboard: bool,
}

/// Bridges winit input into egui and runs the panel each frame.
pub struct EguiHost {
    context: egui::Context,
    state: egui_winit::State,
}

impl EguiHost {
    pub fn new(window: &Window) -> Self {
        let context = egui::Context::default();
        let state = egui_winit::State::new(
            context.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            window.theme(),
            None,
        );
        Self { context, state }
    }

    /// Returns true when egui consumed the event.
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    pub fn run<F>(&mut self, window: &Window, build: F) -> PanelFrame
    where
        F: FnMut(&egui::Context),
    {
        let input = self.state.take_egui_input(window);
        let output = self.context.run(input, build);
        self.state
            .handle_platform_output(window, output.platform_output);
        let pixels_per_point = output.pixels_per_point;
        PanelFrame {
            clipped_primitives: self.context.tessellate(output.shapes, pixels_per_point),
            textures_delta: output.textures_delta,
            pixels_per_point,
            wants_pointer: self.context.wants_pointer_input(),
            wants_keyboard: self.context.wants_keyboard_input(),
        }
    }
}
