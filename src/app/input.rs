use crate::render::CameraMovement;
use winit::event::MouseButton;
use winit::keyboard::{KeyCode, PhysicalKey};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Drag {
    Orbit { dx: f32, dy: f32 },
    Pan { dx: f32, dy: f32 },
}

#[derive(Default, Debug, Clone, Copy)]
pub struct InputState {
    movement: CameraMovement,
    orbiting: bool,
    panning: bool,
    cursor: Option<(f32, f32)>,
}

impl InputState {
    pub fn handle_key(&mut self, key: PhysicalKey, pressed: bool) {
        match key {
            PhysicalKey::Code(KeyCode::ArrowLeft) => self.movement.orbit_left = pressed,
            PhysicalKey::Code(KeyCode::ArrowRight) => self.movement.orbit_right = pressed,
            PhysicalKey::Code(KeyCode::ArrowUp) => self.movement.orbit_up = pressed,
            PhysicalKey::Code(KeyCode::ArrowDown) => self.movement.orbit_down = pressed,
            _ => {}
        }
    }

    pub fn handle_button(&mut self, button: MouseButton, pressed: bool) {
        match button {
            MouseButton::Left => self.orbiting = pressed,
            MouseButton::Right | MouseButton::Middle => self.panning = pressed,
            _ => {}
        }
    }

    /// Tracks the cursor and reports the drag it produced, if a button is held.
    pub fn cursor_moved(&mut self, x: f32, y: f32) -> Option<Drag> {
        let previous = self.cursor.replace((x, y));
        let (px, py) = previous?;
        let (dx, dy) = (x - px, y - py);
        if self.orbiting {
            Some(Drag::Orbit { dx, dy })
        } else if self.panning {
            Some(Drag::Pan { dx, dy })
        } else {
            None
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = None;
    }

    /// Drops held keys and buttons, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        *self = Self::default();
    }

    pub fn movement(&self) -> CameraMovement {
        self.movement
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrows_map_to_orbit_flags() {
        let mut input = InputState::default();
        input.handle_key(PhysicalKey::Code(KeyCode::ArrowLeft), true);
        input.handle_key(PhysicalKey::Code(KeyCode::ArrowUp), true);
        input.handle_key(PhysicalKey::Code(KeyCode::KeyW), true);
        let movement = input.movement();
        assert!(movement.orbit_left && movement.orbit_up);
        assert!(!movement.orbit_right && !movement.orbit_down);

        input.handle_key(PhysicalKey::Code(KeyCode::ArrowLeft), false);
        assert!(!input.movement().orbit_left);
    }

    #[test]
    fn drags_need_a_held_button_and_a_previous_position() {
        let mut input = InputState::default();
        assert_eq!(input.cursor_moved(10.0, 10.0), None);
        assert_eq!(input.cursor_moved(12.0, 10.0), None);

        input.handle_button(MouseButton::Left, true);
        assert_eq!(
            input.cursor_moved(15.0, 6.0),
            Some(Drag::Orbit { dx: 3.0, dy: -4.0 })
        );
        input.handle_button(MouseButton::Left, false);
        input.handle_button(MouseButton::Right, true);
        assert_eq!(
            input.cursor_moved(16.0, 6.0),
            Some(Drag::Pan { dx: 1.0, dy: 0.0 })
        );

        input.cursor_left();
        assert_eq!(input.cursor_moved(50.0, 50.0), None);
    }
}
