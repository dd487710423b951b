//! Position-swap reordering over a list ranked by creation timestamp.
//!
//! The public listing renders newest-first, so "up" means "become newer" and "down" means
//! "become older". There is no rank column: moving an item exchanges its `created_at` with the
//! adjacent item's.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Project;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

/// The slice of a project row the reordering engine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct OrderKey {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<&Project> for OrderKey {
    fn from(project: &Project) -> Self {
        OrderKey {
            id: project.id,
            created_at: project.created_at,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderError {
    #[error("item {0} does not exist")]
    NotFound(Uuid),

    #[error("cannot move further {0}")]
    Boundary(Direction),
}

/// SwapPlan
///
/// The two writes of a reorder: each side takes the other's original timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapPlan {
    pub target: OrderKey,
    pub neighbor: OrderKey,
}

impl SwapPlan {
    pub fn between(target: OrderKey, neighbor: OrderKey) -> Self {
        SwapPlan { target, neighbor }
    }

    pub fn updates(&self) -> [(Uuid, DateTime<Utc>); 2] {
        [
            (self.target.id, self.neighbor.created_at),
            (self.neighbor.id, self.target.created_at),
        ]
    }
}

/// find_neighbor
///
/// `Up` picks the smallest timestamp strictly greater than the target's (the next-newer
/// item); `Down` picks the largest timestamp strictly smaller (the next-older item).
/// Items sharing the target's timestamp are never candidates.
pub fn find_neighbor(
    keys: &[OrderKey],
    target: &OrderKey,
    direction: Direction,
) -> Option<OrderKey> {
    let candidates = keys.iter().filter(|key| key.id != target.id);

    match direction {
        Direction::Up => candidates
            .filter(|key| key.created_at > target.created_at)
            .min_by_key(|key| key.created_at)
            .copied(),
        Direction::Down => candidates
            .filter(|key| key.created_at < target.created_at)
            .max_by_key(|key| key.created_at)
            .copied(),
    }
}

/// plan_swap
///
/// Locates `id` in the full collection and its neighbor in `direction`. `keys` must cover
/// every item of the collection, featured or not.
pub fn plan_swap(
    keys: &[OrderKey],
    id: Uuid,
    direction: Direction,
) -> Result<SwapPlan, ReorderError> {
    let target = keys
        .iter()
        .find(|key| key.id == id)
        .copied()
        .ok_or(ReorderError::NotFound(id))?;

    let neighbor =
        find_neighbor(keys, &target, direction).ok_or(ReorderError::Boundary(direction))?;

    Ok(SwapPlan::between(target, neighbor))
}

/// Sorts into display order: newest first.
pub fn sort_newest_first(projects: &mut [Project]) {
    projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Featured projects in display order. Ordering is computed over the whole list first,
/// then the featured flag filters it.
pub fn featured_in_display_order(mut projects: Vec<Project>) -> Vec<Project> {
    sort_newest_first(&mut projects);
    projects.into_iter().filter(|project| project.featured).collect()
}
