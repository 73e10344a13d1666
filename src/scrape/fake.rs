use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;

use super::{FetchFailure, PageSource, RawPage};

/// In-memory source for pipeline tests. Unknown URLs fail like an exhausted fetch.
#[derive(Default)]
pub struct FakeSource {
    pages: Mutex<HashMap<String, Result<String, String>>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, body: &str) -> Self {
        self.set_page(url, body);
        self
    }

    pub fn failing(self, url: &str, reason: &str) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(reason.to_string()));
        self
    }

    pub fn set_page(&self, url: &str, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(body.to_string()));
    }

    pub fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.calls().into_iter().map(|(url, _)| url).collect()
    }
}

#[async_trait]
impl PageSource for FakeSource {
    async fn fetch(&self, url: &str) -> Result<RawPage, FetchFailure> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));

        let page = self.pages.lock().unwrap().get(url).cloned();
        match page {
            Some(Ok(body)) => Ok(RawPage {
                url: url.to_string(),
                status: 200,
                body,
            }),
            Some(Err(reason)) => Err(FetchFailure {
                url: url.to_string(),
                reason,
                attempts: 1,
            }),
            None => Err(FetchFailure {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
                attempts: 1,
            }),
        }
    }
}
