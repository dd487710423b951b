//! Postgres-backed repository tests. They need a reachable database:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`
//!
//! Reorder searches the whole `projects` table, so these tests run serially.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use portfolio_cms::{
    error::AppError,
    models::{CreateProjectRequest, NewUser, Project, Role},
    ordering::Direction,
    repository::{PostgresRepository, Repository},
};
use serial_test::serial;
use sqlx::PgPool;
use uuid::Uuid;

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }

    async fn cleanup(&self, ids: &[Uuid]) {
        sqlx::query("DELETE FROM projects WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .unwrap();
    }
}

fn ts(offset: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_600_000_000 + offset, 0).unwrap()
}

/// Instants far past any real content, so fixtures built on them are the newest rows.
fn future(offset: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(4_000_000_000 + offset, 0).unwrap()
}

/// Inserts a project row with an explicit timestamp. Slugs carry a random suffix so runs
/// against a shared database do not collide.
async fn insert_project(pool: &PgPool, created_at: DateTime<Utc>) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO projects (id, title, slug, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $4)",
    )
    .bind(id)
    .bind("Fixture")
    .bind(format!("fixture-{}", id.simple()))
    .bind(created_at)
    .execute(pool)
    .await
    .expect("Failed to insert fixture project");
    id
}

async fn created_at(pool: &PgPool, id: Uuid) -> DateTime<Utc> {
    sqlx::query_scalar("SELECT created_at FROM projects WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn count_where(pool: &PgPool, condition: &str, at: DateTime<Utc>) -> i64 {
    let query = format!("SELECT COUNT(*) FROM projects WHERE created_at {condition} $1");
    sqlx::query_scalar::<_, i64>(&query)
        .bind(at)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn all_timestamps(pool: &PgPool) -> Vec<DateTime<Utc>> {
    sqlx::query_scalar("SELECT created_at FROM projects ORDER BY created_at")
        .fetch_all(pool)
        .await
        .unwrap()
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_reorder_swaps_timestamps_in_postgres() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    // Timestamps far in the past of anything else so these rows are adjacent.
    let c = insert_project(&ctx.pool, ts(-3_000_000)).await;
    let b = insert_project(&ctx.pool, ts(-2_000_000)).await;
    let a = insert_project(&ctx.pool, ts(-1_000_000)).await;
    assert_eq!(
        count_where(&ctx.pool, "<", ts(-3_000_000)).await,
        0,
        "fixture must be the oldest rows in the table"
    );

    let plan = repo.reorder_project(b, Direction::Up).await.unwrap();
    assert_eq!(plan.neighbor.id, a);

    assert_eq!(created_at(&ctx.pool, b).await, ts(-1_000_000));
    assert_eq!(created_at(&ctx.pool, a).await, ts(-2_000_000));
    assert_eq!(created_at(&ctx.pool, c).await, ts(-3_000_000));

    let boundary = repo.reorder_project(c, Direction::Down).await;
    assert!(matches!(boundary, Err(AppError::Boundary(Direction::Down))));
    assert_eq!(created_at(&ctx.pool, c).await, ts(-3_000_000));

    ctx.cleanup(&[a, b, c]).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_reorder_unknown_project_is_not_found() {
    let ctx = DbTestContext::setup().await;
    let result = ctx.repository().reorder_project(Uuid::new_v4(), Direction::Up).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_reorders_keep_every_timestamp() {
    let ctx = DbTestContext::setup().await;

    let mut ids = Vec::new();
    for i in 0..6 {
        ids.push(insert_project(&ctx.pool, future(100 + i * 10)).await);
    }
    let before = all_timestamps(&ctx.pool).await;

    let mut tasks = Vec::new();
    for i in 0..32 {
        let repo = ctx.repository();
        let id = ids[i % ids.len()];
        let direction = if i % 3 == 0 { Direction::Down } else { Direction::Up };
        tasks.push(tokio::spawn(async move { repo.reorder_project(id, direction).await }));
    }

    for task in tasks {
        match task.await.unwrap() {
            Ok(_) | Err(AppError::Boundary(_)) => {}
            Err(e) => panic!("unexpected reorder failure: {}", e),
        }
    }

    // Swaps only permute timestamps: none lost, none duplicated.
    assert_eq!(all_timestamps(&ctx.pool).await, before);

    ctx.cleanup(&ids).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_reorder_never_commits_half_a_swap_when_neighbor_is_deleted() {
    let ctx = DbTestContext::setup().await;

    let b = insert_project(&ctx.pool, future(1_000)).await;
    let a = insert_project(&ctx.pool, future(2_000)).await;
    assert_eq!(
        count_where(&ctx.pool, ">", future(2_000)).await,
        0,
        "fixture must be the newest rows in the table"
    );

    // Delete the neighbor in an open transaction, so its row lock is held while the
    // reorder runs, then commit once the reorder is waiting on it.
    let mut deleter = ctx.pool.begin().await.unwrap();
    sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(a)
        .execute(&mut *deleter)
        .await
        .unwrap();

    let repo = ctx.repository();
    let reorder = tokio::spawn(async move { repo.reorder_project(b, Direction::Up).await });
    tokio::time::sleep(Duration::from_millis(300)).await;
    deleter.commit().await.unwrap();

    let result = reorder.await.unwrap();
    assert!(result.is_err(), "a swap with a deleted row must not succeed");
    assert_eq!(created_at(&ctx.pool, b).await, future(1_000));
    assert_eq!(
        count_where(&ctx.pool, "=", future(2_000)).await,
        0,
        "no row may inherit the deleted neighbor's timestamp"
    );

    ctx.cleanup(&[b]).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_import_is_all_or_nothing() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let existing = insert_project(&ctx.pool, ts(-5_000_000)).await;
    let taken_slug = format!("fixture-{}", existing.simple());

    let fresh = Project {
        id: Uuid::new_v4(),
        title: "Imported".to_string(),
        slug: format!("imported-{}", Uuid::new_v4().simple()),
        created_at: ts(-4_000_000),
        updated_at: ts(-4_000_000),
        ..Project::default()
    };
    let clashing = Project {
        id: Uuid::new_v4(),
        title: "Clash".to_string(),
        slug: taken_slug,
        created_at: ts(-4_500_000),
        updated_at: ts(-4_500_000),
        ..Project::default()
    };

    let result = repo.import_projects(&[fresh.clone(), clashing]).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(repo.get_project(fresh.id).await.unwrap().is_none(), "import rolled back");

    assert_eq!(repo.import_projects(&[fresh.clone()]).await.unwrap(), 1);
    let stored = repo.get_project(fresh.id).await.unwrap().unwrap();
    assert_eq!(stored.created_at, ts(-4_000_000));

    ctx.cleanup(&[existing, fresh.id]).await;
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_unique_constraints_map_to_conflict() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let suffix = Uuid::new_v4().simple().to_string();

    let req = CreateProjectRequest {
        title: "Unique".to_string(),
        slug: format!("unique-{}", suffix),
        ..CreateProjectRequest::default()
    };
    let project = repo.create_project(req.clone()).await.unwrap();
    assert!(matches!(repo.create_project(req).await, Err(AppError::Conflict(_))));

    let new_user = NewUser {
        email: format!("{}@example.com", suffix),
        password_hash: "$argon2id$fixture".to_string(),
        name: None,
        role: Role::Editor,
    };
    let user = repo.create_user(new_user.clone()).await.unwrap();
    assert_eq!(user.role, Role::Editor);
    assert!(matches!(repo.create_user(new_user).await, Err(AppError::Conflict(_))));

    assert!(repo.delete_project(project.id).await.unwrap());
    assert!(repo.delete_user(user.id).await.unwrap());
}
