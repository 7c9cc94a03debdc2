use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::time::Instant;

use super::*;
use crate::resource::Resource;

fn delayed(label: &'static str, ms: u64) -> Resource<String, String> {
    Resource::new(move || async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(label.to_string())
    })
}

fn failing(ms: u64) -> Resource<String, String> {
    Resource::new(move || async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Err("missingno".to_string())
    })
}

/// Runs the group to completion and records `(elapsed_ms, newly_revealed)`
/// for every update that revealed something.
async fn reveal_timeline(group: &RevealGroup) -> Vec<(u128, Vec<usize>)> {
    let start = Instant::now();
    let mut timeline = Vec::new();

    loop {
        let plan = group.next_update().await.unwrap();
        if !plan.newly_revealed.is_empty() {
            timeline.push((start.elapsed().as_millis(), plan.newly_revealed.clone()));
        }
        if plan.is_complete() {
            return timeline;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_forwards_reveals_in_index_order() {
    let group = RevealGroup::new(
        vec![
            RevealItem::new("bulbasaur", delayed("bulbasaur", 100)),
            RevealItem::new("charmander", delayed("charmander", 50)),
            RevealItem::new("squirtle", delayed("squirtle", 10)),
        ],
        RevealOrder::Forwards,
    );

    let first = group.plan();
    assert_eq!(first.views(), vec![SlotView::Fallback; 3]);
    assert!(first.newly_revealed.is_empty());

    let timeline = reveal_timeline(&group).await;
    assert_eq!(timeline, vec![(100, vec![0, 1, 2])]);
}

#[tokio::test(start_paused = true)]
async fn test_forwards_reveals_prefix_as_it_settles() {
    let group = RevealGroup::new(
        vec![
            RevealItem::new("a", delayed("a", 10)),
            RevealItem::new("b", delayed("b", 80)),
            RevealItem::new("c", delayed("c", 40)),
        ],
        RevealOrder::Forwards,
    );

    let timeline = reveal_timeline(&group).await;
    assert_eq!(timeline, vec![(10, vec![0]), (80, vec![1, 2])]);
}

#[tokio::test(start_paused = true)]
async fn test_together_reveals_atomically() {
    let group = RevealGroup::new(
        vec![
            RevealItem::new("fast", delayed("fast", 10)),
            RevealItem::new("slow", delayed("slow", 200)),
        ],
        RevealOrder::Together,
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    let midway = group.plan();
    assert_eq!(midway.views(), vec![SlotView::Fallback, SlotView::Fallback]);

    let timeline = reveal_timeline(&group).await;
    assert_eq!(timeline, vec![(150, vec![0, 1])]);
}

#[tokio::test(start_paused = true)]
async fn test_backwards_reveals_suffix() {
    let group = RevealGroup::new(
        vec![
            RevealItem::new("first", delayed("first", 100)),
            RevealItem::new("second", delayed("second", 50)),
            RevealItem::new("third", delayed("third", 10)),
        ],
        RevealOrder::Backwards,
    );

    let timeline = reveal_timeline(&group).await;
    assert_eq!(timeline, vec![(10, vec![2]), (50, vec![1]), (100, vec![0])]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_item_counts_as_settled() {
    let group = RevealGroup::new(
        vec![
            RevealItem::new("broken", failing(20)),
            RevealItem::new("fine", delayed("fine", 30)),
        ],
        RevealOrder::Forwards,
    );

    let timeline = reveal_timeline(&group).await;
    assert_eq!(timeline, vec![(20, vec![0]), (30, vec![1])]);
    assert_eq!(group.plan().views(), vec![SlotView::Failed, SlotView::Content]);
}

#[tokio::test(start_paused = true)]
async fn test_nested_group_is_ready_when_fully_settled() {
    let inner = RevealGroup::new(
        vec![
            RevealItem::new("sprite", delayed("sprite", 30)),
            RevealItem::new("stats", failing(60)),
        ],
        RevealOrder::Together,
    );
    let outer = RevealGroup::new(
        vec![RevealItem::new("header", delayed("header", 10)), RevealItem::group("details", inner)],
        RevealOrder::Forwards,
    );

    assert_eq!(outer.items()[1].nested().map(RevealGroup::len), Some(2));
    assert_eq!(outer.ready_state(), ReadyState::Pending);
    assert_eq!(outer.pending_suspensions().len(), 3);

    let timeline = reveal_timeline(&outer).await;
    assert_eq!(timeline, vec![(10, vec![0]), (60, vec![1])]);

    let plan = outer.plan();
    assert_eq!(outer.ready_state(), ReadyState::Ready);
    assert_eq!(plan.slots[1].view, SlotView::Content);
    let nested = plan.slots[1].nested.as_ref().expect("revealed group carries its own plan");
    assert_eq!(nested.views(), vec![SlotView::Content, SlotView::Failed]);
}

#[tokio::test(start_paused = true)]
async fn test_reveal_all_collects_updates() {
    let group = RevealGroup::new(
        vec![RevealItem::new("a", delayed("a", 5)), RevealItem::new("b", delayed("b", 15))],
        RevealOrder::Forwards,
    );

    let updates = group.reveal_all().await.unwrap();
    let labels: Vec<Vec<&str>> = updates.iter().map(RevealPlan::newly_revealed_labels).collect();
    assert_eq!(labels, vec![vec!["a"], vec!["b"]]);
}

#[test]
fn test_empty_group_is_complete() {
    for order in [RevealOrder::Together, RevealOrder::Forwards, RevealOrder::Backwards] {
        let group = RevealGroup::new(Vec::new(), order);
        assert!(group.plan().is_complete());
        assert_eq!(group.ready_state(), ReadyState::Ready);
    }
}

/// Readiness that can be flipped back to pending.
struct Flag(AtomicU8);

impl Flag {
    fn set(&self, state: ReadyState) {
        let raw = match state {
            ReadyState::Pending => 0,
            ReadyState::Ready => 1,
            ReadyState::Failed => 2,
        };
        self.0.store(raw, Ordering::SeqCst);
    }
}

impl Readiness for Flag {
    fn ready_state(&self) -> ReadyState {
        match self.0.load(Ordering::SeqCst) {
            0 => ReadyState::Pending,
            1 => ReadyState::Ready,
            _ => ReadyState::Failed,
        }
    }

    fn pending_suspensions(&self) -> Vec<Suspension> {
        Vec::new()
    }
}

#[test]
fn test_revealed_slots_stay_revealed() {
    let flag = Arc::new(Flag(AtomicU8::new(0)));
    let (resource, _settle) = Resource::<u8, String>::deferred();
    let group = RevealGroup::new(
        vec![RevealItem::new("flag", Arc::clone(&flag)), RevealItem::new("resource", resource)],
        RevealOrder::Forwards,
    );

    flag.set(ReadyState::Ready);
    assert_eq!(group.plan().newly_revealed, vec![0]);

    flag.set(ReadyState::Pending);
    let plan = group.plan();
    assert_eq!(plan.views(), vec![SlotView::Content, SlotView::Fallback]);
    assert!(plan.newly_revealed.is_empty());
}

#[test]
fn test_fallback_slots_render_item_or_group_placeholder() {
    let (sprite, sprite_settle) = Resource::<String, String>::deferred();
    let (stats, _stats_settle) = Resource::<String, String>::deferred();
    let (moves, _moves_settle) = Resource::<String, String>::deferred();
    let group = RevealGroup::new(
        vec![
            RevealItem::new("sprite", sprite).with_fallback("sprite skeleton"),
            RevealItem::new("stats", stats),
            RevealItem::new("moves", moves).with_fallback("move list skeleton"),
        ],
        RevealOrder::Forwards,
    )
    .with_fallback("card skeleton");
    let renderer = |descriptor: &str| format!("<{descriptor}>");

    let plan = group.plan();
    assert_eq!(plan.slots[0].fallback.as_deref(), Some("sprite skeleton"));
    assert_eq!(
        plan.render_fallbacks(&renderer),
        vec![
            Some("<sprite skeleton>".to_string()),
            Some("<card skeleton>".to_string()),
            Some("<move list skeleton>".to_string()),
        ]
    );

    sprite_settle.resolve("sprite".to_string());
    let plan = group.plan();
    assert_eq!(plan.slots[0].render_fallback(&renderer), None);
    assert_eq!(plan.slots[0].fallback, None);
    assert_eq!(plan.slots[1].render_fallback(&renderer), Some("<card skeleton>".to_string()));
}

#[test]
fn test_fallback_defaults_to_label() {
    let (pending, _settle) = Resource::<u8, String>::deferred();
    let group = RevealGroup::new(vec![RevealItem::new("bio", pending)], RevealOrder::Together);

    let plan = group.plan();
    assert_eq!(plan.slots[0].render_fallback(&|label: &str| label.len()), Some(3));
}
