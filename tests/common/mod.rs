#![allow(dead_code)]

use async_trait::async_trait;
use image::{ImageOutputFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tileloop::net::{HttpRequest, HttpResponse};
use tileloop::traits::HttpClient;
use tileloop::{ApiKeyCredentials, LoopConfig, LoopContext, Result};

pub fn ts(minute: u32) -> String {
    format!("2024-05-01T12:{:02}:00", minute)
}

pub fn png(color: [u8; 4]) -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbaImage::from_pixel(256, 256, Rgba(color))
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .expect("encode png");
    bytes
}

/// Scripted tile server: valid-times documents, PNG tiles and failing URLs
pub struct MockServer {
    valid_times: Mutex<(u16, String)>,
    failing: Mutex<Vec<String>>,
    delay: Duration,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockServer {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            valid_times: Mutex::new((200, "{}".into())),
            failing: Mutex::new(Vec::new()),
            delay,
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn set_valid_times(&self, status: u16, body: impl Into<String>) {
        *self.valid_times.lock().unwrap() = (status, body.into());
    }

    /// Tiles whose URL contains `fragment` answer with HTTP 500
    pub fn fail_urls_containing(&self, fragment: impl Into<String>) {
        self.failing.lock().unwrap().push(fragment.into());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn tile_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, _)| !url.contains("valid_frames"))
            .map(|(_, count)| count)
            .sum()
    }

    pub fn calls_to(&self, fragment: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(url, _)| url.contains(fragment))
            .map(|(_, count)| count)
            .sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for MockServer {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse> {
        *self.calls.lock().unwrap().entry(request.url.clone()).or_default() += 1;

        if request.url.contains("valid_frames") {
            let (status, body) = self.valid_times.lock().unwrap().clone();
            return Ok(HttpResponse::new(status, body.into_bytes()));
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failing = self.failing.lock().unwrap().iter().any(|f| request.url.contains(f.as_str()));
        if failing {
            return Ok(HttpResponse::new(500, Vec::new()));
        }
        Ok(HttpResponse::new(200, png([30, 144, 255, 255])))
    }
}

pub fn context(server: &Arc<MockServer>, config: LoopConfig) -> LoopContext {
    let _ = env_logger::builder().is_test(true).try_init();
    LoopContext::builder()
        .config(config)
        .credentials(ApiKeyCredentials::new("test-id", "test-key"))
        .http_client(server.clone())
        .build()
        .expect("test context")
}
