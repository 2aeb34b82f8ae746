use glam::{Mat4, Vec3};

const MIN_DISTANCE: f32 = 0.05;
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

#[derive(Debug, Default, Clone, Copy)]
pub struct CameraMovement {
    pub orbit_left: bool,
    pub orbit_right: bool,
    pub orbit_up: bool,
    pub orbit_down: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
    /// x, y, width, height in physical pixels.
    pub viewport: [u32; 4],
}

impl Projection {
    pub fn new(fov_y_deg: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y_deg,
            near,
            far,
            aspect: 1.0,
            viewport: [0, 0, 1, 1],
        }
    }

    /// Recomputes aspect and viewport. Zero sizes are treated as 1.
    pub fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        self.aspect = width as f32 / height as f32;
        self.viewport = [0, 0, width, height];
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_deg.to_radians(), self.aspect, self.near, self.far)
    }
}

/// Orbit controls around a target point, with panning.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub projection: Projection,
}

impl OrbitCamera {
    /// Eye on +Z at `distance`, looking at the origin.
    pub fn new(distance: f32, projection: Projection) -> Self {
        Self {
            target: Vec3::ZERO,
            distance: distance.max(MIN_DISTANCE),
            yaw: 0.0,
            pitch: 0.0,
            projection,
        }
    }

    pub fn eye(&self) -> Vec3 {
        self.target + self.offset_dir() * self.distance
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection.matrix() * self.view()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.projection.resize(width, height);
    }

    pub fn orbit(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw += yaw_delta;
        self.pitch = (self.pitch + pitch_delta).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        wrap_yaw(&mut self.yaw);
    }

    /// Moves the target in the view plane. Deltas are in pixels.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let (right, up) = self.screen_axes();
        let height = self.projection.viewport[3].max(1) as f32;
        let world_per_px =
            2.0 * self.distance * (self.projection.fov_y_deg.to_radians() * 0.5).tan() / height;
        self.target += (-right * dx + up * dy) * world_per_px;
    }

    /// Positive steps move closer.
    pub fn zoom(&mut self, steps: f32) {
        self.distance = (self.distance * 0.9_f32.powf(steps)).max(MIN_DISTANCE);
    }

    pub fn update_movement(&mut self, input: &CameraMovement, frame_dt: f32) -> bool {
        let speed = 1.8 * frame_dt;
        let mut yaw = 0.0;
        let mut pitch = 0.0;
        if input.orbit_left {
            yaw -= speed;
        }
        if input.orbit_right {
            yaw += speed;
        }
        if input.orbit_up {
            pitch += speed;
        }
        if input.orbit_down {
            pitch -= speed;
        }
        if yaw == 0.0 && pitch == 0.0 {
            return false;
        }
        self.orbit(yaw, pitch);
        true
    }

    fn offset_dir(&self) -> Vec3 {
        let cos_pitch = self.pitch.cos();
        Vec3::new(
            self.yaw.sin() * cos_pitch,
            self.pitch.sin(),
            self.yaw.cos() * cos_pitch,
        )
    }

    fn screen_axes(&self) -> (Vec3, Vec3) {
        let forward = -self.offset_dir();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward).normalize_or_zero();
        (right, up)
    }
}

fn wrap_yaw(yaw: &mut f32) {
    const TWO_PI: f32 = std::f32::consts::PI * 2.0;
    if yaw.is_finite() {
        *yaw = (*yaw + std::f32::consts::PI).rem_euclid(TWO_PI) - std::f32::consts::PI;
    }
}

#[cfg(test)]
mod tests {
    use super::{CameraMovement, OrbitCamera, Projection};
    use glam::Vec3;

    fn camera() -> OrbitCamera {
        OrbitCamera::new(2.5, Projection::new(48.0, 0.1, 1000.0))
    }

    #[test]
    fn default_eye_sits_on_positive_z() {
        let camera = camera();
        assert!((camera.eye() - Vec3::new(0.0, 0.0, 2.5)).length() < 1e-6);
    }

    #[test]
    fn resize_sets_exact_aspect_and_viewport() {
        let mut camera = camera();
        camera.resize(800, 600);
        assert_eq!(camera.projection.aspect, 800.0 / 600.0);
        assert_eq!(camera.projection.viewport, [0, 0, 800, 600]);
        camera.resize(800, 600);
        assert_eq!(camera.projection.aspect, 800.0 / 600.0);
    }

    #[test]
    fn resize_clamps_zero_dimensions() {
        let mut camera = camera();
        camera.resize(0, 0);
        assert_eq!(camera.projection.aspect, 1.0);
        assert_eq!(camera.projection.viewport, [0, 0, 1, 1]);
    }

    #[test]
    fn orbit_keeps_distance_and_clamps_pitch() {
        let mut camera = camera();
        camera.orbit(1.0, 10.0);
        assert!(((camera.eye() - camera.target).length() - 2.5).abs() < 1e-4);
        assert!(camera.pitch < std::f32::consts::FRAC_PI_2);
        assert!(camera.view_proj().is_finite());
    }

    #[test]
    fn pan_moves_target_and_zoom_has_floor() {
        let mut camera = camera();
        camera.resize(800, 600);
        camera.pan(100.0, 0.0);
        assert!(camera.target.x < 0.0);
        camera.zoom(500.0);
        assert!(camera.distance >= 0.05);
    }

    #[test]
    fn keyboard_orbit_reports_change() {
        let mut camera = camera();
        let movement = CameraMovement {
            orbit_left: true,
            ..CameraMovement::default()
        };
        assert!(camera.update_movement(&movement, 1.0 / 60.0));
        assert!(!camera.update_movement(&CameraMovement::default(), 1.0 / 60.0));
    }
}
