//! Screenshot capture: a single-slot request flag, a frame source seam, and
//! the PNG delivery path.

use crate::context::RenderContext;
use std::io::Cursor;
use std::path::PathBuf;

pub const CAPTURE_FILE_NAME: &str = "screen.png";

/// Single pending-capture slot. Requesting twice before service is one capture.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pending: bool,
}

impl CaptureRequest {
    pub fn request(&mut self) {
        self.pending = true;
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Clears the slot, returning whether a request was pending.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

/// Tightly packed RGBA8 pixels, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("frame readback failed: {0}")]
    Readback(String),
    #[error("frame buffer size mismatch: {width}x{height} with {len} bytes")]
    BadFrame { width: u32, height: u32, len: usize },
    #[error("png encode failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Produces the pixels of the frame that was just drawn.
pub trait FrameSource {
    fn read_frame(&mut self, ctx: &RenderContext) -> Result<CapturedFrame, CaptureError>;
}

/// Receives the encoded image.
pub trait CaptureSink {
    fn deliver(&mut self, file_name: &str, png: &[u8]) -> Result<PathBuf, CaptureError>;
}

/// Writes captures into a directory, replacing any earlier file of the same name.
pub struct DirectorySink {
    directory: PathBuf,
}

impl DirectorySink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

impl CaptureSink for DirectorySink {
    fn deliver(&mut self, file_name: &str, png: &[u8]) -> Result<PathBuf, CaptureError> {
        let path = self.directory.join(file_name);
        let write_err = |source| CaptureError::Write {
            path: path.display().to_string(),
            source,
        };
        if !self.directory.as_os_str().is_empty() {
            std::fs::create_dir_all(&self.directory).map_err(write_err)?;
        }
        std::fs::write(&path, png).map_err(write_err)?;
        Ok(path)
    }
}

pub struct CaptureService<S: CaptureSink> {
    sink: S,
}

impl<S: CaptureSink> CaptureService<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Must run after the frame's draw. Consumes the request whether or not
    /// the capture succeeds.
    pub fn service_if_requested<F: FrameSource + ?Sized>(
        &mut self,
        request: &mut CaptureRequest,
        source: &mut F,
        ctx: &RenderContext,
    ) -> Result<Option<PathBuf>, CaptureError> {
        if !request.take() {
            return Ok(None);
        }
        let frame = source.read_frame(ctx)?;
        let png = encode_png(&frame)?;
        let path = self.sink.deliver(CAPTURE_FILE_NAME, &png)?;
        log::info!(
            "Captured {}x{} frame to {}",
            frame.width,
            frame.height,
            path.display()
        );
        Ok(Some(path))
    }
}

pub fn encode_png(frame: &CapturedFrame) -> Result<Vec<u8>, CaptureError> {
    let expected = frame.width as usize * frame.height as usize * 4;
    if frame.pixels.len() != expected || frame.width == 0 || frame.height == 0 {
        return Err(CaptureError::BadFrame {
            width: frame.width,
            height: frame.height,
            len: frame.pixels.len(),
        });
    }
    let mut out = Cursor::new(Vec::new());
    image::write_buffer_with_format(
        &mut out,
        &frame.pixels,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )?;
    Ok(out.into_inner())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Keeps delivered images in memory.
    #[derive(Default)]
    pub(crate) struct MemorySink {
        pub delivered: Vec<(String, Vec<u8>)>,
    }

    impl CaptureSink for MemorySink {
        fn deliver(&mut self, file_name: &str, png: &[u8]) -> Result<PathBuf, CaptureError> {
            self.delivered.push((file_name.to_string(), png.to_vec()));
            Ok(PathBuf::from(file_name))
        }
    }

    #[test]
    fn request_is_idempotent_until_taken() {
        let mut request = CaptureRequest::default();
        request.request();
        request.request();
        assert!(request.take());
        assert!(!request.take());
        assert!(!request.is_pending());
    }

    #[test]
    fn encoded_png_decodes_to_same_pixels() {
        let frame = CapturedFrame {
            width: 2,
            height: 1,
            pixels: vec![255, 0, 0, 255, 0, 255, 0, 255],
        };
        let png = encode_png(&frame).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (2, 1));
        assert_eq!(decoded.into_raw(), frame.pixels);
    }

    #[test]
    fn mismatched_frames_are_rejected() {
        let frame = CapturedFrame {
            width: 4,
            height: 4,
            pixels: vec![0; 3],
        };
        assert!(matches!(
            encode_png(&frame),
            Err(CaptureError::BadFrame { .. })
        ));
    }

    #[test]
    fn directory_sink_overwrites_fixed_name() {
        let dir = std::env::temp_dir().join(format!("lightrig-capture-{}", std::process::id()));
        let mut sink = DirectorySink::new(&dir);
        let first = sink.deliver(CAPTURE_FILE_NAME, b"one").unwrap();
        let second = sink.deliver(CAPTURE_FILE_NAME, b"two").unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
