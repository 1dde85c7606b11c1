//! Test helpers: synthetic images, a scripted analyzer, a throwaway server.

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use facematch_core::recognizer::RecognizerError;
use facematch_core::{AnalyzerError, Embedding, FaceAnalyzer};
use image::{ImageFormat, Rgb, RgbImage};

pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(rgb));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub fn png_base64(width: u32, height: u32, rgb: [u8; 3]) -> String {
    base64::engine::general_purpose::STANDARD.encode(png_bytes(width, height, rgb))
}

/// Analyzer whose answer depends only on the (normalized) image width.
///
/// Unknown widths have no face.
#[derive(Default)]
pub struct FakeAnalyzer {
    faces: HashMap<u32, Vec<f32>>,
    delay: Duration,
    failing: bool,
    calls: Arc<AtomicUsize>,
}

impl FakeAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn face(mut self, width: u32, values: Vec<f32>) -> Self {
        self.faces.insert(width, values);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Shared count of `primary_face` invocations, readable after the
    /// analyzer has been moved into a comparator.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl FaceAnalyzer for FakeAnalyzer {
    fn primary_face(&self, image: &RgbImage) -> Result<Option<Embedding>, AnalyzerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.failing {
            return Err(RecognizerError::NoLandmarks.into());
        }
        Ok(self.faces.get(&image.width()).cloned().map(Embedding::new))
    }
}

/// Serve `router` on an ephemeral localhost port for the rest of the test.
pub async fn spawn_server(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
