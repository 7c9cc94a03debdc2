//! Coordinated fallback removal across sibling suspending items.

mod order;

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::boundary::FallbackRenderer;
use crate::error::SuspensorError;
use crate::readiness::{ReadyState, Readiness, wait_any};
use crate::resource::Suspension;

pub use order::RevealOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotView {
    Fallback,
    Content,
    Failed,
}

pub struct RevealItem {
    label: String,
    fallback: Option<String>,
    source: Arc<dyn Readiness>,
    nested: Option<Arc<RevealGroup>>,
}

impl RevealItem {
    pub fn new(label: impl Into<String>, source: impl Readiness + 'static) -> Self {
        Self { label: label.into(), fallback: None, source: Arc::new(source), nested: None }
    }

    /// An item whose content is itself a group with its own order.
    pub fn group(label: impl Into<String>, group: RevealGroup) -> Self {
        let nested = Arc::new(group);
        let source: Arc<dyn Readiness> = Arc::<RevealGroup>::clone(&nested);
        Self { label: label.into(), fallback: None, source, nested: Some(nested) }
    }

    /// Placeholder descriptor for this item, overriding the group's.
    pub fn with_fallback(mut self, descriptor: impl Into<String>) -> Self {
        self.fallback = Some(descriptor.into());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    pub fn nested(&self) -> Option<&RevealGroup> {
        self.nested.as_deref()
    }

    fn view(&self, state: ReadyState) -> SlotView {
        match state {
            ReadyState::Pending => SlotView::Fallback,
            ReadyState::Failed if self.nested.is_none() => SlotView::Failed,
            ReadyState::Ready | ReadyState::Failed => SlotView::Content,
        }
    }
}

impl fmt::Debug for RevealItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevealItem")
            .field("label", &self.label)
            .field("fallback", &self.fallback)
            .field("state", &self.source.ready_state())
            .field("nested", &self.nested.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotPlan {
    pub label: String,
    pub view: SlotView,
    /// Placeholder descriptor while the slot shows its fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested: Option<RevealPlan>,
}

impl SlotPlan {
    /// Renders the placeholder for a fallback slot, using the label when no
    /// descriptor was given. `None` once the slot is revealed.
    pub fn render_fallback<B>(&self, renderer: &B) -> Option<B::Output>
    where
        B: FallbackRenderer<str>,
    {
        if self.view != SlotView::Fallback {
            return None;
        }
        Some(renderer.render_fallback(self.fallback.as_deref().unwrap_or(&self.label)))
    }
}

/// What each slot of a group should show after one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevealPlan {
    pub order: RevealOrder,
    pub slots: Vec<SlotPlan>,
    /// Slots that switched away from their fallback during this poll, in the
    /// order they were revealed.
    pub newly_revealed: Vec<usize>,
}

impl RevealPlan {
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|slot| slot.view != SlotView::Fallback)
    }

    pub fn revealed_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.view != SlotView::Fallback).count()
    }

    pub fn newly_revealed_labels(&self) -> Vec<&str> {
        self.newly_revealed.iter().map(|&index| self.slots[index].label.as_str()).collect()
    }

    pub fn views(&self) -> Vec<SlotView> {
        self.slots.iter().map(|slot| slot.view).collect()
    }

    pub fn render_fallbacks<B>(&self, renderer: &B) -> Vec<Option<B::Output>>
    where
        B: FallbackRenderer<str>,
    {
        self.slots.iter().map(|slot| slot.render_fallback(renderer)).collect()
    }
}

/// An ordered list of items revealed under one [`RevealOrder`].
///
/// Revealed slots are never hidden again, even if an item's readiness were
/// to regress.
pub struct RevealGroup {
    items: Vec<RevealItem>,
    order: RevealOrder,
    fallback: Option<String>,
    revealed: Mutex<Vec<bool>>,
}

impl RevealGroup {
    pub fn new(items: Vec<RevealItem>, order: RevealOrder) -> Self {
        let revealed = Mutex::new(vec![false; items.len()]);
        Self { items, order, fallback: None, revealed }
    }

    /// Placeholder descriptor for items that carry none of their own.
    pub fn with_fallback(mut self, descriptor: impl Into<String>) -> Self {
        self.fallback = Some(descriptor.into());
        self
    }

    pub fn order(&self) -> RevealOrder {
        self.order
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[RevealItem] {
        &self.items
    }

    /// Polls every item and advances the revealed set under this group's
    /// order.
    pub fn plan(&self) -> RevealPlan {
        let states: Vec<ReadyState> =
            self.items.iter().map(|item| item.source.ready_state()).collect();
        let mut revealed = self.revealed.lock();

        let candidates: Vec<usize> = match self.order {
            RevealOrder::Together => {
                if states.iter().all(|state| state.is_settled()) {
                    (0..states.len()).collect()
                } else {
                    Vec::new()
                }
            }
            RevealOrder::Forwards => {
                (0..states.len()).take_while(|&index| is_shown(&states, &revealed, index)).collect()
            }
            RevealOrder::Backwards => (0..states.len())
                .rev()
                .take_while(|&index| is_shown(&states, &revealed, index))
                .collect(),
        };

        let mut newly_revealed = Vec::new();
        for index in candidates {
            if !revealed[index] {
                revealed[index] = true;
                newly_revealed.push(index);
            }
        }

        let slots = self
            .items
            .iter()
            .zip(states.iter().copied())
            .zip(revealed.iter().copied())
            .map(|((item, state), shown)| {
                if !shown {
                    return SlotPlan {
                        label: item.label.clone(),
                        view: SlotView::Fallback,
                        fallback: item.fallback.clone().or_else(|| self.fallback.clone()),
                        nested: None,
                    };
                }
                let settled = if state.is_settled() { state } else { ReadyState::Ready };
                SlotPlan {
                    label: item.label.clone(),
                    view: item.view(settled),
                    fallback: None,
                    nested: item.nested.as_ref().map(|group| group.plan()),
                }
            })
            .collect();
        drop(revealed);

        if !newly_revealed.is_empty() {
            let labels: Vec<&str> =
                newly_revealed.iter().map(|&index| self.items[index].label.as_str()).collect();
            debug!("Revealed {:?} ({} order)", labels, self.order);
        }

        RevealPlan { order: self.order, slots, newly_revealed }
    }

    /// Waits until some pending item settles, then returns the resulting
    /// plan. Returns the current plan right away when nothing is pending.
    pub async fn next_update(&self) -> Result<RevealPlan, SuspensorError> {
        let pending = self.pending_suspensions();
        if !pending.is_empty() {
            wait_any(pending).await?;
        }
        Ok(self.plan())
    }

    /// Drives the group to completion, returning every plan that revealed
    /// something.
    pub async fn reveal_all(&self) -> Result<Vec<RevealPlan>, SuspensorError> {
        let mut updates = Vec::new();
        let mut plan = self.plan();
        loop {
            let complete = plan.is_complete();
            if !plan.newly_revealed.is_empty() {
                updates.push(plan);
            }
            if complete {
                return Ok(updates);
            }
            plan = self.next_update().await?;
        }
    }
}

fn is_shown(states: &[ReadyState], revealed: &[bool], index: usize) -> bool {
    revealed[index] || states[index].is_settled()
}

/// A group counts as ready once every item in it is settled. Failed items
/// show their error view inside the group rather than failing the parent.
impl Readiness for RevealGroup {
    fn ready_state(&self) -> ReadyState {
        if self.items.iter().all(|item| item.source.ready_state().is_settled()) {
            ReadyState::Ready
        } else {
            ReadyState::Pending
        }
    }

    fn pending_suspensions(&self) -> Vec<Suspension> {
        self.items.iter().flat_map(|item| item.source.pending_suspensions()).collect()
    }
}

impl fmt::Debug for RevealGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevealGroup")
            .field("order", &self.order)
            .field("items", &self.items)
            .field("revealed", &*self.revealed.lock())
            .finish()
    }
}
