use std::time::{Duration, Instant};

const TITLE_REFRESH: Duration = Duration::from_millis(500);

/// Frame cadence bookkeeping. Produces a fresh window title twice a second.
pub struct FrameTiming {
    last_frame: Option<Instant>,
    window_start: Instant,
    frames_in_window: u32,
    frame_dt: f32,
    render_ms: f32,
    base_title: String,
}

impl FrameTiming {
    pub fn new(base_title: impl Into<String>, now: Instant) -> Self {
        Self {
            last_frame: None,
            window_start: now,
            frames_in_window: 0,
            frame_dt: 1.0 / 60.0,
            render_ms: 0.0,
            base_title: base_title.into(),
        }
    }

    pub fn frame_dt(&self) -> f32 {
        self.frame_dt
    }

    pub fn set_render_ms(&mut self, render_ms: f32) {
        self.render_ms = render_ms;
    }

    /// Records a frame at `now`. Returns the new title when one is due.
    pub fn tick(&mut self, now: Instant) -> Option<String> {
        if let Some(last) = self.last_frame {
            self.frame_dt = now.saturating_duration_since(last).as_secs_f32();
        }
        self.last_frame = Some(now);
        self.frames_in_window = self.frames_in_window.saturating_add(1);

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < TITLE_REFRESH {
            return None;
        }
        let fps = self.frames_in_window as f32 / elapsed.as_secs_f32();
        self.frames_in_window = 0;
        self.window_start = now;
        Some(format!(
            "{} - {:.1} fps (frame {:.2} ms, render {:.2} ms)",
            self.base_title,
            fps,
            self.frame_dt * 1000.0,
            self.render_ms
        ))
    }
}
