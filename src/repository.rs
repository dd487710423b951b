use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{CreateProjectRequest, NewUser, Project, Role, UpdateProjectRequest, User},
    ordering::{self, Direction, OrderKey, SwapPlan},
};

/// Repository Trait
///
/// The persistence contract used by handlers and by session resolution. Handlers only ever
/// see `Arc<dyn Repository>`, so Postgres and the in-memory store are interchangeable.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn list_users(&self) -> AppResult<Vec<User>>;
    // Fails with `Conflict` when the email is taken.
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    async fn update_user_role(&self, id: Uuid, role: Role) -> AppResult<Option<User>>;
    async fn delete_user(&self, id: Uuid) -> AppResult<bool>;

    // --- Projects (always returned newest-first) ---
    async fn list_projects(&self) -> AppResult<Vec<Project>>;
    async fn list_featured_projects(&self) -> AppResult<Vec<Project>>;
    async fn get_project(&self, id: Uuid) -> AppResult<Option<Project>>;
    async fn get_project_by_slug(&self, slug: &str) -> AppResult<Option<Project>>;
    // Fails with `Conflict` when the slug is taken.
    async fn create_project(&self, req: CreateProjectRequest) -> AppResult<Project>;
    async fn update_project(
        &self,
        id: Uuid,
        req: UpdateProjectRequest,
    ) -> AppResult<Option<Project>>;
    async fn delete_project(&self, id: Uuid) -> AppResult<bool>;
    // Returns the number of rows removed.
    async fn delete_projects(&self, ids: &[Uuid]) -> AppResult<u64>;
    // All-or-nothing upsert by id. Fails with `Conflict` when a slug belongs to another id.
    async fn import_projects(&self, projects: &[Project]) -> AppResult<u64>;

    /// Swaps `id`'s timestamp with its neighbor's in `direction`, atomically. Fails with
    /// `NotFound`, `Boundary`, or `Conflict` when a row disappears mid-swap, and leaves every
    /// row untouched in that case.
    async fn reorder_project(&self, id: Uuid, direction: Direction) -> AppResult<SwapPlan>;
}

pub type RepositoryState = Arc<dyn Repository>;

// Advisory lock key serializing reorders of the projects list.
const PROJECT_REORDER_LOCK: i64 = 0x7072_6f6a_6f72_6472;

const PROJECT_COLUMNS: &str = "id, title, slug, summary, content, cover_image, live_url, \
                               repo_url, featured, created_at, updated_at";
const USER_COLUMNS: &str = "id, email, name, role, created_at";

fn slug_taken(slug: &str) -> String {
    format!("A project with slug '{}' already exists", slug)
}

fn email_taken(email: &str) -> String {
    format!("A user with email '{}' already exists", email)
}

/// Maps a unique-constraint violation to `Conflict`, everything else to `Database`.
fn conflict_on_unique(e: sqlx::Error, message: impl Into<String>) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return AppError::Conflict(message.into());
        }
    }
    AppError::Database(e)
}

/// PostgresRepository
///
/// `Repository` backed by Postgres through a shared `PgPool`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC");
        let users = sqlx::query_as::<_, User>(&query).fetch_all(&self.pool).await?;
        Ok(users)
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let query = format!(
            "INSERT INTO users (id, email, password_hash, name, role, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING {USER_COLUMNS}"
        );
        let email = user.email.clone();
        sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.name)
            .bind(user.role)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, email_taken(&email)))
    }

    async fn update_user_role(&self, id: Uuid, role: Role) -> AppResult<Option<User>> {
        let query = format!("UPDATE users SET role = $1 WHERE id = $2 RETURNING {USER_COLUMNS}");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(role)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_projects(&self) -> AppResult<Vec<Project>> {
        let query = format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC");
        let projects = sqlx::query_as::<_, Project>(&query).fetch_all(&self.pool).await?;
        Ok(projects)
    }

    /// Filters the globally ordered list; `featured` never partitions the timestamp axis.
    async fn list_featured_projects(&self) -> AppResult<Vec<Project>> {
        let query = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE featured = true ORDER BY created_at DESC"
        );
        let projects = sqlx::query_as::<_, Project>(&query).fetch_all(&self.pool).await?;
        Ok(projects)
    }

    async fn get_project(&self, id: Uuid) -> AppResult<Option<Project>> {
        let query = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1");
        let project = sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(project)
    }

    async fn get_project_by_slug(&self, slug: &str) -> AppResult<Option<Project>> {
        let query = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE slug = $1");
        let project = sqlx::query_as::<_, Project>(&query)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(project)
    }

    async fn create_project(&self, req: CreateProjectRequest) -> AppResult<Project> {
        let query = format!(
            "INSERT INTO projects ({PROJECT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW()) RETURNING {PROJECT_COLUMNS}"
        );
        let slug = req.slug.clone();
        sqlx::query_as::<_, Project>(&query)
            .bind(Uuid::new_v4())
            .bind(req.title)
            .bind(req.slug)
            .bind(req.summary)
            .bind(req.content)
            .bind(req.cover_image)
            .bind(req.live_url)
            .bind(req.repo_url)
            .bind(req.featured)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, slug_taken(&slug)))
    }

    /// Partial update through `COALESCE`: only `Some` fields overwrite their column.
    /// `created_at` is never written here: it is the display rank.
    async fn update_project(
        &self,
        id: Uuid,
        req: UpdateProjectRequest,
    ) -> AppResult<Option<Project>> {
        let query = format!(
            r#"
            UPDATE projects
            SET title = COALESCE($2, title),
                slug = COALESCE($3, slug),
                summary = COALESCE($4, summary),
                content = COALESCE($5, content),
                cover_image = COALESCE($6, cover_image),
                live_url = COALESCE($7, live_url),
                repo_url = COALESCE($8, repo_url),
                featured = COALESCE($9, featured),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PROJECT_COLUMNS}
            "#
        );
        let slug = req.slug.clone().unwrap_or_default();
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(req.title)
            .bind(req.slug)
            .bind(req.summary)
            .bind(req.content)
            .bind(req.cover_image)
            .bind(req.live_url)
            .bind(req.repo_url)
            .bind(req.featured)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, slug_taken(&slug)))
    }

    async fn delete_project(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_projects(&self, ids: &[Uuid]) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// reorder_project
    ///
    /// One transaction:
    /// 1. `pg_advisory_xact_lock` so concurrent reorders run one after another and never
    ///    both read the same "before" timestamps.
    /// 2. Read the target, then its neighbor across the whole table, both `FOR UPDATE` so a
    ///    concurrent delete of either row waits for this transaction.
    /// 3. Write both swapped timestamps, each of which must hit exactly one row, and commit.
    ///
    /// Returning early with `?` drops `tx`, which rolls back.
    async fn reorder_project(&self, id: Uuid, direction: Direction) -> AppResult<SwapPlan> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(PROJECT_REORDER_LOCK)
            .execute(&mut *tx)
            .await?;

        let target = sqlx::query_as::<_, OrderKey>(
            "SELECT id, created_at FROM projects WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ordering::ReorderError::NotFound(id))?;

        let neighbor_query = match direction {
            Direction::Up => {
                "SELECT id, created_at FROM projects WHERE created_at > $1 \
                 ORDER BY created_at ASC LIMIT 1 FOR UPDATE"
            }
            Direction::Down => {
                "SELECT id, created_at FROM projects WHERE created_at < $1 \
                 ORDER BY created_at DESC LIMIT 1 FOR UPDATE"
            }
        };

        let neighbor = sqlx::query_as::<_, OrderKey>(neighbor_query)
            .bind(target.created_at)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ordering::ReorderError::Boundary(direction))?;

        let plan = SwapPlan::between(target, neighbor);

        for (row_id, created_at) in plan.updates() {
            let result = sqlx::query("UPDATE projects SET created_at = $1 WHERE id = $2")
                .bind(created_at)
                .bind(row_id)
                .execute(&mut *tx)
                .await?;

            // A one-sided swap must never commit.
            if result.rows_affected() != 1 {
                tracing::warn!(project_id = %id, %row_id, "reorder target vanished mid-swap");
                return Err(AppError::Conflict(format!(
                    "Project {} changed during reorder, try again",
                    row_id
                )));
            }
        }

        tx.commit().await?;

        Ok(plan)
    }

    /// import_projects
    ///
    /// Upserts every project by id inside one transaction, keeping the imported
    /// `created_at` values. The reorder lock is held too, since timestamps are rewritten.
    async fn import_projects(&self, projects: &[Project]) -> AppResult<u64> {
        let query = format!(
            r#"
            INSERT INTO projects ({PROJECT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title,
                slug = EXCLUDED.slug,
                summary = EXCLUDED.summary,
                content = EXCLUDED.content,
                cover_image = EXCLUDED.cover_image,
                live_url = EXCLUDED.live_url,
                repo_url = EXCLUDED.repo_url,
                featured = EXCLUDED.featured,
                created_at = EXCLUDED.created_at,
                updated_at = EXCLUDED.updated_at
            "#
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(PROJECT_REORDER_LOCK)
            .execute(&mut *tx)
            .await?;

        let mut imported = 0;
        for project in projects {
            let result = sqlx::query(&query)
                .bind(project.id)
                .bind(&project.title)
                .bind(&project.slug)
                .bind(&project.summary)
                .bind(&project.content)
                .bind(&project.cover_image)
                .bind(&project.live_url)
                .bind(&project.repo_url)
                .bind(project.featured)
                .bind(project.created_at)
                .bind(project.updated_at)
                .execute(&mut *tx)
                .await
                .map_err(|e| conflict_on_unique(e, slug_taken(&project.slug)))?;
            imported += result.rows_affected();
        }

        tx.commit().await?;

        Ok(imported)
    }
}

/// InMemoryRepository
///
/// `Repository` over plain vectors behind a mutex, used by tests and local tooling. Each
/// operation holds the guard for its whole read-modify-write, which is what makes the
/// reorder swap atomic here.
#[derive(Default)]
pub struct InMemoryRepository {
    users: Mutex<Vec<User>>,
    projects: Mutex<Vec<Project>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully-formed user as-is (id and timestamps included).
    pub fn seed_user(&self, user: User) {
        self.users_guard().push(user);
    }

    /// Inserts a fully-formed project as-is (id and timestamps included).
    pub fn seed_project(&self, project: Project) {
        self.projects_guard().push(project);
    }

    fn users_guard(&self) -> MutexGuard<'_, Vec<User>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn projects_guard(&self) -> MutexGuard<'_, Vec<Project>> {
        self.projects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users_guard().iter().find(|u| u.id == id).cloned())
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let mut users = self.users_guard().clone();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut users = self.users_guard();
        if users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(email_taken(&user.email)));
        }

        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            role: user.role,
            created_at: Utc::now(),
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn update_user_role(&self, id: Uuid, role: Role) -> AppResult<Option<User>> {
        let mut users = self.users_guard();
        Ok(users.iter_mut().find(|u| u.id == id).map(|user| {
            user.role = role;
            user.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<bool> {
        let mut users = self.users_guard();
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() < before)
    }

    async fn list_projects(&self) -> AppResult<Vec<Project>> {
        let mut projects = self.projects_guard().clone();
        ordering::sort_newest_first(&mut projects);
        Ok(projects)
    }

    async fn list_featured_projects(&self) -> AppResult<Vec<Project>> {
        let projects = self.projects_guard().clone();
        Ok(ordering::featured_in_display_order(projects))
    }

    async fn get_project(&self, id: Uuid) -> AppResult<Option<Project>> {
        Ok(self.projects_guard().iter().find(|p| p.id == id).cloned())
    }

    async fn get_project_by_slug(&self, slug: &str) -> AppResult<Option<Project>> {
        Ok(self.projects_guard().iter().find(|p| p.slug == slug).cloned())
    }

    async fn create_project(&self, req: CreateProjectRequest) -> AppResult<Project> {
        let mut projects = self.projects_guard();
        if projects.iter().any(|p| p.slug == req.slug) {
            return Err(AppError::Conflict(slug_taken(&req.slug)));
        }

        let now = Utc::now();
        let created = Project {
            id: Uuid::new_v4(),
            title: req.title,
            slug: req.slug,
            summary: req.summary,
            content: req.content,
            cover_image: req.cover_image,
            live_url: req.live_url,
            repo_url: req.repo_url,
            featured: req.featured,
            created_at: now,
            updated_at: now,
        };
        projects.push(created.clone());
        Ok(created)
    }

    async fn update_project(
        &self,
        id: Uuid,
        req: UpdateProjectRequest,
    ) -> AppResult<Option<Project>> {
        let mut projects = self.projects_guard();

        if let Some(slug) = &req.slug {
            if projects.iter().any(|p| p.id != id && &p.slug == slug) {
                return Err(AppError::Conflict(slug_taken(slug)));
            }
        }

        let Some(project) = projects.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };

        if let Some(title) = req.title {
            project.title = title;
        }
        if let Some(slug) = req.slug {
            project.slug = slug;
        }
        if let Some(summary) = req.summary {
            project.summary = summary;
        }
        if let Some(content) = req.content {
            project.content = content;
        }
        if req.cover_image.is_some() {
            project.cover_image = req.cover_image;
        }
        if req.live_url.is_some() {
            project.live_url = req.live_url;
        }
        if req.repo_url.is_some() {
            project.repo_url = req.repo_url;
        }
        if let Some(featured) = req.featured {
            project.featured = featured;
        }
        project.updated_at = Utc::now();

        Ok(Some(project.clone()))
    }

    async fn delete_project(&self, id: Uuid) -> AppResult<bool> {
        let mut projects = self.projects_guard();
        let before = projects.len();
        projects.retain(|p| p.id != id);
        Ok(projects.len() < before)
    }

    async fn delete_projects(&self, ids: &[Uuid]) -> AppResult<u64> {
        let mut projects = self.projects_guard();
        let before = projects.len();
        projects.retain(|p| !ids.contains(&p.id));
        Ok((before - projects.len()) as u64)
    }

    async fn import_projects(&self, projects: &[Project]) -> AppResult<u64> {
        let mut stored = self.projects_guard();

        // Applied to a copy first so a conflict leaves the store untouched.
        let mut staged = stored.clone();
        for project in projects {
            if staged.iter().any(|p| p.id != project.id && p.slug == project.slug) {
                return Err(AppError::Conflict(slug_taken(&project.slug)));
            }
            match staged.iter_mut().find(|p| p.id == project.id) {
                Some(existing) => *existing = project.clone(),
                None => staged.push(project.clone()),
            }
        }

        *stored = staged;
        Ok(projects.len() as u64)
    }

    async fn reorder_project(&self, id: Uuid, direction: Direction) -> AppResult<SwapPlan> {
        let mut projects = self.projects_guard();

        let keys: Vec<OrderKey> = projects.iter().map(OrderKey::from).collect();
        let plan = ordering::plan_swap(&keys, id, direction)?;

        for (row_id, created_at) in plan.updates() {
            if let Some(project) = projects.iter_mut().find(|p| p.id == row_id) {
                project.created_at = created_at;
            }
        }

        Ok(plan)
    }
}
