use crate::context::RenderContext;
use crate::scene::{ALPHA_RANGE, ANGLE_RANGE_DEG, INTENSITY_RANGE, SPECULAR_RANGE};

pub type NumberHandler = fn(&mut RenderContext, f32);
pub type NumberSource = fn(&RenderContext) -> f32;
pub type ActionHandler = fn(&mut RenderContext);

struct NumberControl {
    label: String,
    min: f32,
    max: f32,
    value: f32,
    /// Where the value lives when something other than the widget can move it.
    source: Option<NumberSource>,
    on_change: NumberHandler,
}

enum Control {
    Number(NumberControl),
    Action {
        label: String,
        on_invoke: ActionHandler,
    },
    /// Index into `ControlPanel::groups`.
    Group(usize),
}

/// A panel of labelled widgets bound to handlers over the render context.
/// Handlers run synchronously on the thread that drives the panel.
pub struct ControlPanel {
    title: String,
    controls: Vec<Control>,
    groups: Vec<ControlPanel>,
}

impl ControlPanel {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            controls: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The range is a widget hint only. Values passed to [`Self::set_value`]
    /// reach the handler unchanged.
    pub fn add_number_control(
        &mut self,
        label: &str,
        min: f32,
        max: f32,
        initial: f32,
        on_change: NumberHandler,
    ) -> &mut Self {
        self.controls.push(Control::Number(NumberControl {
            label: label.to_string(),
            min,
            max,
            value: initial,
            source: None,
            on_change,
        }));
        self
    }

    /// A number control that follows `source` every frame, so state changed
    /// outside the panel shows up in the widget.
    pub fn add_tracked_control(
        &mut self,
        label: &str,
        min: f32,
        max: f32,
        ctx: &RenderContext,
        source: NumberSource,
        on_change: NumberHandler,
    ) -> &mut Self {
        self.controls.push(Control::Number(NumberControl {
            label: label.to_string(),
            min,
            max,
            value: source(ctx),
            source: Some(source),
            on_change,
        }));
        self
    }

    /// Pulls tracked controls up to date with the context.
    pub fn sync(&mut self, ctx: &RenderContext) {
        for control in self.controls.iter_mut() {
            match control {
                Control::Number(NumberControl {
                    value,
                    source: Some(source),
                    ..
                }) => *value = source(ctx),
                Control::Group(index) => self.groups[*index].sync(ctx),
                _ => {}
            }
        }
    }

    pub fn add_action(&mut self, label: &str, on_invoke: ActionHandler) -> &mut Self {
        self.controls.push(Control::Action {
            label: label.to_string(),
            on_invoke,
        });
        self
    }

    pub fn add_group(&mut self, label: &str) -> &mut ControlPanel {
        let index = self.groups.len();
        self.groups.push(ControlPanel::new(label));
        self.controls.push(Control::Group(index));
        &mut self.groups[index]
    }

    #[cfg(test)]
    pub fn value(&self, label: &str) -> Option<f32> {
        self.find_number(label).map(|control| control.value)
    }

    #[cfg(test)]
    /// Sets a number control as if the user had moved it. Returns false if
    /// no control has that label.
    pub fn set_value(&mut self, label: &str, value: f32, ctx: &mut RenderContext) -> bool {
        let Some(control) = self.find_number_mut(label) else {
            return false;
        };
        control.value = value;
        (control.on_change)(ctx, value);
        true
    }

    #[cfg(test)]
    /// Fires an action as if its button were pressed.
    pub fn invoke(&self, label: &str, ctx: &mut RenderContext) -> bool {
        for control in &self.controls {
            match control {
                Control::Action {
                    label: action,
                    on_invoke,
                } if action == label => {
                    on_invoke(ctx);
                    return true;
                }
                Control::Group(index) => {
                    if self.groups[*index].invoke(label, ctx) {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }

    #[cfg(test)]
    fn find_number(&self, label: &str) -> Option<&NumberControl> {
        self.controls.iter().find_map(|control| match control {
            Control::Number(number) if number.label == label => Some(number),
            Control::Group(index) => self.groups[*index].find_number(label),
            _ => None,
        })
    }

    #[cfg(test)]
    fn find_number_mut(&mut self, label: &str) -> Option<&mut NumberControl> {
        let position = self.controls.iter().position(|control| match control {
            Control::Number(number) => number.label == label,
            Control::Group(index) => self.groups[*index].find_number(label).is_some(),
            Control::Action { .. } => false,
        })?;
        match &mut self.controls[position] {
            Control::Number(number) => Some(number),
            Control::Group(index) => {
                let index = *index;
                self.groups[index].find_number_mut(label)
            }
            Control::Action { .. } => None,
        }
    }

    /// Draws the panel as a floating window in the top-right corner.
    pub fn show(&mut self, egui_ctx: &egui::Context, ctx: &mut RenderContext) {
        self.sync(ctx);
        egui::Window::new(self.title())
            .anchor(egui::Align2::RIGHT_TOP, [-8.0, 8.0])
            .resizable(false)
            .collapsible(true)
            .show(egui_ctx, |ui| self.draw(ui, ctx));
    }

    fn draw(&mut self, ui: &mut egui::Ui, ctx: &mut RenderContext) {
        for control in self.controls.iter_mut() {
            match control {
                Control::Number(number) => {
                    let mut value = number.value;
                    let slider = egui::Slider::new(&mut value, number.min..=number.max)
                        .text(number.label.as_str());
                    if ui.add(slider).changed() {
                        number.value = value;
                        (number.on_change)(ctx, value);
                    }
                }
                Control::Action { label, on_invoke } => {
                    if ui.button(label.as_str()).clicked() {
                        log::debug!("Panel action '{}'", label);
                        on_invoke(ctx);
                    }
                }
                Control::Group(index) => {
                    let group = &mut self.groups[*index];
                    egui::CollapsingHeader::new(group.title.clone())
                        .default_open(true)
                        .show(ui, |ui| group.draw(ui, ctx));
                }
            }
        }
    }
}

/// Registers the material sliders, the capture action and the light group,
/// seeded from the context's current values.
pub fn build_control_panel(ctx: &RenderContext) -> ControlPanel {
    let mut panel = ControlPanel::new("Controls");
    panel
        .add_tracked_control(
            "Alpha",
            ALPHA_RANGE.0,
            ALPHA_RANGE.1,
            ctx,
            |ctx| ctx.material.alpha,
            RenderContext::on_alpha_changed,
        )
        .add_tracked_control(
            "Specular",
            SPECULAR_RANGE.0,
            SPECULAR_RANGE.1,
            ctx,
            |ctx| ctx.material.specular,
            RenderContext::on_specular_changed,
        )
        .add_action("Capture Screenshot", RenderContext::request_capture);
    panel
        .add_group("Spotlight")
        .add_tracked_control(
            "Intensity",
            INTENSITY_RANGE.0,
            INTENSITY_RANGE.1,
            ctx,
            |ctx| ctx.light.intensity,
            RenderContext::on_intensity_changed,
        )
        .add_tracked_control(
            "Angle",
            ANGLE_RANGE_DEG.0,
            ANGLE_RANGE_DEG.1,
            ctx,
            |ctx| ctx.light.angle_deg,
            RenderContext::on_angle_changed,
        );
    panel
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::context;
    use crate::scene::LightPolicy;

    #[test]
    fn panel_is_seeded_from_context() {
        let ctx = context();
        let panel = build_control_panel(&ctx);
        assert_eq!(panel.value("Alpha"), Some(100.0));
        assert_eq!(panel.value("Specular"), Some(1.0));
        assert_eq!(panel.value("Intensity"), Some(1.0));
        assert_eq!(panel.value("Angle"), Some(0.0));
        assert_eq!(panel.value("Missing"), None);
    }

    #[test]
    fn number_controls_forward_to_handlers() {
        let mut ctx = context();
        let mut panel = build_control_panel(&ctx);
        assert!(panel.set_value("Alpha", 42.0, &mut ctx));
        assert!(panel.set_value("Specular", 0.25, &mut ctx));
        assert!(panel.set_value("Angle", -90.0, &mut ctx));
        assert!(panel.set_value("Intensity", 1.5, &mut ctx));
        assert_eq!(ctx.material.alpha, 42.0);
        assert_eq!(ctx.material.specular, 0.25);
        assert_eq!(ctx.light.angle_deg, -90.0);
        assert_eq!(ctx.light.intensity, 1.5);
        assert_eq!(panel.value("Angle"), Some(-90.0));
    }

    #[test]
    fn out_of_range_values_are_not_clamped() {
        let mut ctx = context();
        let mut panel = build_control_panel(&ctx);
        panel.set_value("Alpha", 500.0, &mut ctx);
        panel.set_value("Intensity", -1.0, &mut ctx);
        assert_eq!(ctx.material.alpha, 500.0);
        assert_eq!(ctx.light.intensity, -1.0);
    }

    #[test]
    fn capture_action_sets_request() {
        let mut ctx = context();
        let panel = build_control_panel(&ctx);
        assert!(!ctx.capture.is_pending());
        assert!(panel.invoke("Capture Screenshot", &mut ctx));
        assert!(ctx.capture.is_pending());
        assert!(!panel.invoke("Alpha", &mut ctx));
    }

    #[test]
    fn unknown_labels_change_nothing() {
        let mut ctx = context();
        let mut panel = build_control_panel(&ctx);
        assert!(!panel.set_value("Roughness", 0.5, &mut ctx));
        assert_eq!(ctx.material, crate::scene::MaterialParams::default());
    }

    #[test]
    fn groups_nest_under_their_title() {
        let mut panel = ControlPanel::new("Root");
        panel.add_group("Inner").add_action("Go", RenderContext::request_capture);
        assert_eq!(panel.groups[0].title(), "Inner");
        let mut ctx = context();
        assert!(panel.invoke("Go", &mut ctx));
        assert!(ctx.capture.is_pending());
    }

    #[test]
    fn angle_slider_follows_autonomous_light() {
        let mut ctx = context();
        ctx.policy = LightPolicy::Autonomous {
            degrees_per_frame: 2.0,
        };
        let mut panel = build_control_panel(&ctx);
        for _ in 0..3 {
            ctx.apply_light_state();
        }
        panel.sync(&ctx);
        assert_eq!(panel.value("Angle"), Some(ctx.light.angle_deg));
        assert!((ctx.light.angle_deg - 6.0).abs() < 1e-5);
    }

    #[test]
    fn showing_the_panel_resyncs_tracked_controls() {
        let mut ctx = context();
        let mut panel = build_control_panel(&ctx);
        panel.add_number_control("Fixed", 0.0, 1.0, 0.5, |_, _| {});
        ctx.on_intensity_changed(1.75);
        ctx.material.alpha = 12.0;

        let egui_ctx = egui::Context::default();
        let _ = egui_ctx.run(egui::RawInput::default(), |egui_ctx| {
            panel.show(egui_ctx, &mut ctx)
        });
        assert_eq!(panel.value("Intensity"), Some(1.75));
        assert_eq!(panel.value("Alpha"), Some(12.0));
        assert_eq!(panel.value("Fixed"), Some(0.5));
    }
}
