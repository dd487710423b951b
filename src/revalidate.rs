use std::sync::{Arc, Mutex, PoisonError};

/// Public pages that render the project list.
pub const PROJECT_LISTING_PATHS: [&str; 2] = ["/", "/work"];

/// Revalidator
///
/// Drops cached renderings of public pages after content changes. Calls are
/// fire-and-forget: a failed revalidation is logged and never fails the request that
/// triggered it.
pub trait Revalidator: Send + Sync {
    fn revalidate(&self, paths: Vec<String>);
}

pub type RevalidatorState = Arc<dyn Revalidator>;

/// Listing paths plus, when known, the project's own detail page.
pub fn project_paths(slug: Option<&str>) -> Vec<String> {
    let mut paths: Vec<String> = PROJECT_LISTING_PATHS.iter().map(|p| p.to_string()).collect();
    if let Some(slug) = slug {
        paths.push(format!("/work/{}", slug));
    }
    paths
}

/// HttpRevalidator
///
/// Posts `{ "paths": [...], "secret": "..." }` to the frontend's revalidation hook on a
/// background task.
#[derive(Clone)]
pub struct HttpRevalidator {
    client: reqwest::Client,
    url: Option<String>,
    secret: Option<String>,
}

impl HttpRevalidator {
    pub fn new(url: Option<String>, secret: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            secret,
        }
    }
}

impl Revalidator for HttpRevalidator {
    fn revalidate(&self, paths: Vec<String>) {
        let Some(url) = self.url.clone() else {
            tracing::debug!(?paths, "revalidation hook not configured, skipping");
            return;
        };

        let client = self.client.clone();
        let body = serde_json::json!({ "paths": paths, "secret": self.secret });

        tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(?paths, "revalidated public pages");
                }
                Ok(response) => {
                    tracing::warn!(
                        status = %response.status(),
                        ?paths,
                        "revalidation hook refused request"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, ?paths, "revalidation hook unreachable");
                }
            }
        });
    }
}

/// RecordingRevalidator
///
/// Keeps every requested path in memory so tests can assert on invalidations.
#[derive(Default)]
pub struct RecordingRevalidator {
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingRevalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Revalidator for RecordingRevalidator {
    fn revalidate(&self, paths: Vec<String>) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(paths);
    }
}
