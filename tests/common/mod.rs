#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{DateTime, TimeZone, Utc};
use portfolio_cms::{
    AppConfig, AppState, InMemoryRepository, RecordingRevalidator, create_router,
    models::{Project, Role, User},
};
use serde_json::Value;
use tower::util::ServiceExt;
use uuid::Uuid;

/// A fixed instant plus `offset` seconds, so orderings are deterministic.
pub fn ts(offset: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + offset, 0).unwrap()
}

pub fn project(slug: &str, created_at: DateTime<Utc>, featured: bool) -> Project {
    Project {
        id: Uuid::new_v4(),
        title: slug.replace('-', " "),
        slug: slug.to_string(),
        summary: format!("Summary of {}", slug),
        featured,
        created_at,
        updated_at: created_at,
        ..Project::default()
    }
}

pub fn user(role: Role) -> User {
    let id = Uuid::new_v4();
    User {
        id,
        email: format!("{}@example.com", id.simple()),
        name: Some(format!("{:?} user", role)),
        role,
        created_at: ts(0),
    }
}

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryRepository>,
    pub revalidator: Arc<RecordingRevalidator>,
    pub admin: User,
    pub editor: User,
    pub viewer: User,
}

impl TestApp {
    /// Router over an in-memory store seeded with one user per role. `AppConfig::default()`
    /// runs in `Env::Local`, so callers are identified through the `x-user-id` header.
    pub fn new() -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let revalidator = Arc::new(RecordingRevalidator::new());

        let admin = user(Role::Admin);
        let editor = user(Role::Editor);
        let viewer = user(Role::Viewer);
        repo.seed_user(admin.clone());
        repo.seed_user(editor.clone());
        repo.seed_user(viewer.clone());

        let state = AppState {
            repo: repo.clone(),
            revalidator: revalidator.clone(),
            config: AppConfig::default(),
        };

        TestApp {
            router: create_router(state),
            repo,
            revalidator,
            admin,
            editor,
            viewer,
        }
    }

    pub fn seed_projects(&self, projects: &[Project]) {
        for project in projects {
            self.repo.seed_project(project.clone());
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        caller: Option<&User>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder.header("x-user-id", caller.id.to_string());
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send_request(request).await
    }

    pub async fn send_request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    /// Slugs of the public listing, in display order.
    pub async fn listing(&self, uri: &str) -> Vec<String> {
        let (status, body) = self.send(Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        body.as_array()
            .unwrap()
            .iter()
            .map(|p| p["slug"].as_str().unwrap().to_string())
            .collect()
    }
}
