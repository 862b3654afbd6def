#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};

use autoswipe::{DeviceDriver, SimilarityScorer, SwipeDirection};

/// Encoded PNG of a solid-color frame, large enough to survive the profile
/// crop.
pub fn png_frame(rgb: [u8; 3]) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 400, Rgb(rgb)));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn solid_image(rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb(rgb)))
}

/// Scripted device driver. Screenshot results are consumed from a queue;
/// once the queue is empty every capture returns the default frame.
pub struct MockDevice {
    screenshot_script: Mutex<VecDeque<Result<Vec<u8>, String>>>,
    default_frame: Vec<u8>,
    pub fail_swipes: AtomicBool,
    pub match_visible: AtomicBool,
    swipes: Mutex<Vec<SwipeDirection>>,
    actions: Mutex<Vec<String>>,
    keys: Mutex<Vec<String>>,
    opened_apps: Mutex<Vec<String>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            screenshot_script: Mutex::new(VecDeque::new()),
            default_frame: png_frame([128, 128, 128]),
            fail_swipes: AtomicBool::new(false),
            match_visible: AtomicBool::new(false),
            swipes: Mutex::new(Vec::new()),
            actions: Mutex::new(Vec::new()),
            keys: Mutex::new(Vec::new()),
            opened_apps: Mutex::new(Vec::new()),
        }
    }

    pub fn script_screenshot_failures(&self, count: usize) {
        let mut script = self.screenshot_script.lock().unwrap();
        for _ in 0..count {
            script.push_back(Err("simulated capture failure".to_string()));
        }
    }

    pub fn script_screenshot_frame(&self, frame: Vec<u8>) {
        self.screenshot_script.lock().unwrap().push_back(Ok(frame));
    }

    pub fn swipes(&self) -> Vec<SwipeDirection> {
        self.swipes.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }

    pub fn opened_apps(&self) -> Vec<String> {
        self.opened_apps.lock().unwrap().clone()
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceDriver for MockDevice {
    async fn open_app(&self, name: &str, _wait: Duration) -> Result<()> {
        self.opened_apps.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let scripted = self.screenshot_script.lock().unwrap().pop_front();
        match scripted {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(self.default_frame.clone()),
        }
    }

    async fn swipe(&self, direction: SwipeDirection) -> Result<()> {
        if self.fail_swipes.load(Ordering::SeqCst) {
            return Err(anyhow!("simulated gesture failure"));
        }
        self.swipes.lock().unwrap().push(direction);
        Ok(())
    }

    async fn execute_action(&self, query: &str, _reference_element: Option<&str>) -> Result<()> {
        if query.contains("unclickable") {
            return Err(anyhow!("element not found"));
        }
        self.actions.lock().unwrap().push(query.to_string());
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.keys.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn check_visible(&self, _description: &str, _timeout: Duration) -> Result<bool> {
        Ok(self.match_visible.load(Ordering::SeqCst))
    }
}

/// Scorer that returns the same similarity for every pair.
pub struct FixedScorer(pub f64);

impl SimilarityScorer for FixedScorer {
    fn score(&self, _candidate: &DynamicImage, _reference: &DynamicImage) -> Result<f64> {
        Ok(self.0)
    }
}

/// Scorer keyed on the reference's top-left pixel, so tests can assign a
/// distinct score per reference image.
pub struct ColorKeyedScorer {
    pub scores: Vec<([u8; 3], f64)>,
}

impl SimilarityScorer for ColorKeyedScorer {
    fn score(&self, _candidate: &DynamicImage, reference: &DynamicImage) -> Result<f64> {
        let pixel = reference.get_pixel(0, 0);
        let rgb = [pixel[0], pixel[1], pixel[2]];

        self.scores
            .iter()
            .find(|(key, _)| *key == rgb)
            .map(|(_, score)| *score)
            .ok_or_else(|| anyhow!("no score configured for reference color {rgb:?}"))
    }
}

/// Scorer that always fails.
pub struct FailingScorer;

impl SimilarityScorer for FailingScorer {
    fn score(&self, _candidate: &DynamicImage, _reference: &DynamicImage) -> Result<f64> {
        Err(anyhow!("similarity backend offline"))
    }
}
