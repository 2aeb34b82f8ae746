//! Light rig viewer.
//!
//! Renders a textured model lit by a single directional light, with a
//! translucent cone showing where the light points. A control panel drives
//! the light angle and intensity and the material's specular terms, and can
//! dump the current frame to `screen.png`.

mod app;
mod assets;
mod config;
mod context;
mod render;
mod scene;
mod ui;

fn main() {
    if let Err(err) = app::run() {
        log::error!("{}", err);
        eprintln!("lightrig: {}", err);
        std::process::exit(1);
    }
}
