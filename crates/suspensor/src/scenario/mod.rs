//! Scripted runs of mock delayed lookups through a cache, a transition and a
//! reveal group. Backs the `simulate` command.


use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::cache::{CacheMetrics, ResourceCache};
use crate::config::{Config, ConfigError};
use crate::error::SuspensorError;
use crate::resource::Resource;
use crate::reveal::{RevealGroup, RevealItem, RevealOrder, RevealPlan};
use crate::transition::{BusyPhase, TransitionConfig, TransitionScheduler, TransitionStatus};

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse scenario: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Suspensor(#[from] SuspensorError),

    #[error("Invalid scenario: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioItem {
    pub label: String,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub fail: bool,
    /// Placeholder shown while this item is hidden.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    /// Order for `children`; only meaningful on group items.
    #[serde(default)]
    pub order: Option<RevealOrder>,
    #[serde(default)]
    pub children: Vec<ScenarioItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub order: Option<RevealOrder>,
    #[serde(default)]
    pub transition: Option<TransitionConfig>,
    pub items: Vec<ScenarioItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub at_ms: u64,
    pub phase: BusyPhase,
    pub is_busy: bool,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub revealed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub order: RevealOrder,
    pub transition: TransitionConfig,
    pub timeline: Vec<TimelineEntry>,
    pub final_plan: RevealPlan,
    pub cache: CacheMetrics,
    pub total_ms: u64,
}

impl Scenario {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let contents = std::fs::read_to_string(path)?;
        contents.parse()
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.items.is_empty() {
            return Err(ScenarioError::Invalid("no items".to_string()));
        }
        validate_items(&self.items)?;
        if let Some(transition) = &self.transition {
            transition.validate()?;
        }
        Ok(())
    }

    /// Replays the scenario on the current runtime's clock and records every
    /// change in busy state or reveals.
    pub async fn run(&self, config: &Config) -> Result<ScenarioReport, ScenarioError> {
        self.validate()?;

        let order = self.order.unwrap_or(config.reveal.default_order);
        let transition = self.transition.unwrap_or(config.transition);
        let cache = ResourceCache::<String, String, String>::from_config(&config.cache)
            .named("scenario");
        let scheduler = TransitionScheduler::new(transition);

        info!("Running scenario with {} items ({} order)", self.items.len(), order);

        let start = Instant::now();
        let group = Arc::new(build_group(&self.items, order, &cache));
        let tracked = Arc::clone(&group);
        scheduler.start_transition(move || tracked);

        let mut timeline: Vec<TimelineEntry> = Vec::new();
        let mut plan = group.plan();

        loop {
            let status = scheduler.status();
            record(&mut timeline, elapsed_ms(start), status, &plan);

            if plan.is_complete() && status.phase == BusyPhase::Idle {
                break;
            }

            let next_change = scheduler.next_change();
            if plan.is_complete() {
                let Some(wait) = next_change else {
                    break;
                };
                sleep(wait).await;
                plan = group.plan();
                continue;
            }

            tokio::select! {
                update = group.next_update() => plan = update?,
                _ = sleep(next_change.unwrap_or(Duration::ZERO)), if next_change.is_some() => {
                    plan = group.plan();
                }
            }
        }

        let total_ms = elapsed_ms(start);
        debug!("Scenario finished after {}ms", total_ms);

        Ok(ScenarioReport {
            order,
            transition,
            timeline,
            final_plan: group.plan(),
            cache: cache.metrics(),
            total_ms,
        })
    }
}

impl std::str::FromStr for Scenario {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

fn validate_items(items: &[ScenarioItem]) -> Result<(), ScenarioError> {
    for item in items {
        if item.label.trim().is_empty() {
            return Err(ScenarioError::Invalid("item with empty label".to_string()));
        }
        if item.order.is_some() && item.children.is_empty() {
            return Err(ScenarioError::Invalid(format!(
                "{} sets an order but has no children",
                item.label
            )));
        }
        validate_items(&item.children)?;
    }
    Ok(())
}

fn build_group(
    items: &[ScenarioItem],
    order: RevealOrder,
    cache: &ResourceCache<String, String, String>,
) -> RevealGroup {
    let items = items
        .iter()
        .map(|item| {
            let built = if item.children.is_empty() {
                let resource = cache.get_or_create(item.label.as_str(), |key| {
                    mock_lookup(key.clone(), item.delay_ms, item.fail)
                });
                RevealItem::new(item.label.clone(), resource)
            } else {
                let nested = build_group(&item.children, item.order.unwrap_or(order), cache);
                RevealItem::group(item.label.clone(), nested)
            };
            match &item.fallback {
                Some(descriptor) => built.with_fallback(descriptor.clone()),
                None => built,
            }
        })
        .collect();

    RevealGroup::new(items, order)
}

fn mock_lookup(key: String, delay_ms: u64, fail: bool) -> Resource<String, String> {
    Resource::new(move || async move {
        sleep(Duration::from_millis(delay_ms)).await;
        if fail { Err(format!("{key} not found")) } else { Ok(key) }
    })
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn record(
    timeline: &mut Vec<TimelineEntry>,
    at_ms: u64,
    status: TransitionStatus,
    plan: &RevealPlan,
) {
    let revealed: Vec<String> =
        plan.newly_revealed_labels().into_iter().map(str::to_string).collect();
    let unchanged = timeline.last().is_some_and(|last| {
        last.phase == status.phase
            && last.is_busy == status.is_busy
            && last.timed_out == status.timed_out
    });

    if unchanged && revealed.is_empty() {
        return;
    }

    timeline.push(TimelineEntry {
        at_ms,
        phase: status.phase,
        is_busy: status.is_busy,
        timed_out: status.timed_out,
        revealed,
    });
}
