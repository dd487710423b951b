mod common;

use common::{project, ts};
use portfolio_cms::ordering::{
    self, Direction, OrderKey, ReorderError, SwapPlan, featured_in_display_order, find_neighbor,
    plan_swap,
};
use uuid::Uuid;

fn key(offset: i64) -> OrderKey {
    OrderKey {
        id: Uuid::new_v4(),
        created_at: ts(offset),
    }
}

fn apply(keys: &mut [OrderKey], plan: &SwapPlan) {
    for (id, created_at) in plan.updates() {
        keys.iter_mut().find(|k| k.id == id).unwrap().created_at = created_at;
    }
}

fn newest_first(keys: &[OrderKey]) -> Vec<Uuid> {
    let mut sorted = keys.to_vec();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted.into_iter().map(|k| k.id).collect()
}

#[test]
fn test_move_up_swaps_with_next_newer_item() {
    // C (T1) < B (T2) < A (T3)
    let c = key(1);
    let b = key(2);
    let a = key(3);
    let mut keys = vec![c, b, a];

    let plan = plan_swap(&keys, b.id, Direction::Up).unwrap();
    assert_eq!(plan.target, b);
    assert_eq!(plan.neighbor, a);

    apply(&mut keys, &plan);

    assert_eq!(keys[1].created_at, ts(3), "B takes A's timestamp");
    assert_eq!(keys[2].created_at, ts(2), "A takes B's timestamp");
    assert_eq!(keys[0].created_at, ts(1), "C is untouched");
    assert_eq!(newest_first(&keys), vec![b.id, a.id, c.id]);
}

#[test]
fn test_move_down_swaps_with_next_older_item() {
    let c = key(1);
    let b = key(2);
    let a = key(3);
    let mut keys = vec![a, b, c];

    let plan = plan_swap(&keys, b.id, Direction::Down).unwrap();
    assert_eq!(plan.neighbor, c);

    apply(&mut keys, &plan);
    assert_eq!(newest_first(&keys), vec![a.id, c.id, b.id]);
}

#[test]
fn test_newest_cannot_move_up() {
    let keys = vec![key(1), key(2), key(3)];
    let newest = keys[2];

    assert_eq!(
        plan_swap(&keys, newest.id, Direction::Up),
        Err(ReorderError::Boundary(Direction::Up))
    );
}

#[test]
fn test_oldest_cannot_move_down() {
    let keys = vec![key(1), key(2), key(3)];
    let oldest = keys[0];

    assert_eq!(
        plan_swap(&keys, oldest.id, Direction::Down),
        Err(ReorderError::Boundary(Direction::Down))
    );
}

#[test]
fn test_single_item_is_at_both_edges() {
    let only = key(5);
    let keys = vec![only];

    assert!(matches!(plan_swap(&keys, only.id, Direction::Up), Err(ReorderError::Boundary(_))));
    assert!(matches!(plan_swap(&keys, only.id, Direction::Down), Err(ReorderError::Boundary(_))));
}

#[test]
fn test_unknown_item_is_not_found() {
    let keys = vec![key(1), key(2)];
    let missing = Uuid::new_v4();

    assert_eq!(
        plan_swap(&keys, missing, Direction::Up),
        Err(ReorderError::NotFound(missing))
    );
}

#[test]
fn test_neighbor_is_the_closest_timestamp_regardless_of_input_order() {
    let target = key(50);
    let far_newer = key(90);
    let near_newer = key(60);
    let near_older = key(40);
    let far_older = key(10);
    let keys = vec![far_newer, far_older, target, near_older, near_newer];

    assert_eq!(find_neighbor(&keys, &target, Direction::Up), Some(near_newer));
    assert_eq!(find_neighbor(&keys, &target, Direction::Down), Some(near_older));
}

#[test]
fn test_equal_timestamps_are_never_neighbors() {
    let target = key(20);
    let twin = OrderKey {
        id: Uuid::new_v4(),
        created_at: target.created_at,
    };
    let older = key(10);
    let keys = vec![target, twin, older];

    // Only strictly greater timestamps qualify as "newer".
    assert_eq!(find_neighbor(&keys, &target, Direction::Up), None);
    assert_eq!(find_neighbor(&keys, &target, Direction::Down), Some(older));
}

#[test]
fn test_up_then_down_round_trips() {
    let c = key(1);
    let b = key(2);
    let a = key(3);
    let original = vec![c, b, a];
    let mut keys = original.clone();

    let up = plan_swap(&keys, b.id, Direction::Up).unwrap();
    apply(&mut keys, &up);

    // A now sits in B's old slot; moving B back down restores everything.
    let down = plan_swap(&keys, b.id, Direction::Down).unwrap();
    assert_eq!(down.neighbor.id, a.id);
    apply(&mut keys, &down);

    assert_eq!(keys, original);
}

#[test]
fn test_featured_filter_applies_after_global_ordering() {
    let older_featured = project("older-featured", ts(1), true);
    let plain = project("plain", ts(2), false);
    let newer_featured = project("newer-featured", ts(3), true);

    let featured = featured_in_display_order(vec![older_featured, plain, newer_featured]);
    let slugs: Vec<&str> = featured.iter().map(|p| p.slug.as_str()).collect();

    assert_eq!(slugs, vec!["newer-featured", "older-featured"]);
}

#[test]
fn test_sort_newest_first() {
    let mut projects = vec![
        project("b", ts(2), false),
        project("c", ts(3), false),
        project("a", ts(1), false),
    ];
    ordering::sort_newest_first(&mut projects);

    let slugs: Vec<&str> = projects.iter().map(|p| p.slug.as_str()).collect();
    assert_eq!(slugs, vec!["c", "b", "a"]);
}

#[test]
fn test_direction_wire_format() {
    assert_eq!(serde_json::to_string(&Direction::Up).unwrap(), r#""up""#);
    assert_eq!(serde_json::from_str::<Direction>(r#""down""#).unwrap(), Direction::Down);
    assert!(serde_json::from_str::<Direction>(r#""sideways""#).is_err());
    assert!(serde_json::from_str::<Direction>(r#""UP""#).is_err());
}
