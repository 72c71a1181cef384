//! The dispatch loop.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{debug, warn};
use waypoint_common::Config;
use waypoint_events::{Event, EventPattern};

use crate::dead_letter::{DeadLetter, FailureReason};
use crate::error::BusError;
use crate::traits::{DeadLetterSink, Handler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(u64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule-{}", self.0)
    }
}

#[derive(Clone)]
pub struct BusOptions {
    pub handler_timeout: Duration,
    pub dead_letters: Option<Arc<dyn DeadLetterSink>>,
}

impl Default for BusOptions {
    fn default() -> Self {
        Self {
            handler_timeout: Duration::from_secs(3),
            dead_letters: None,
        }
    }
}

impl BusOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            handler_timeout: config.handler_timeout,
            dead_letters: None,
        }
    }

    pub fn with_dead_letters(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letters = Some(sink);
        self
    }
}

/// Counters since the bus was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub published: u64,
    /// Published events that matched no rule and were dropped.
    pub unrouted: u64,
    pub invocations: u64,
    pub failures: u64,
}

/// Registered rule, as reported by `EventBus::rules`.
#[derive(Debug, Clone)]
pub struct RuleInfo {
    pub id: RuleId,
    pub name: String,
    pub pattern: EventPattern,
}

struct Rule {
    id: RuleId,
    name: String,
    pattern: EventPattern,
    handler: Arc<dyn Handler>,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    unrouted: AtomicU64,
    invocations: AtomicU64,
    failures: AtomicU64,
}

struct BusInner {
    rules: RwLock<Vec<Rule>>,
    next_rule: AtomicU64,
    in_flight: AtomicUsize,
    idle: Notify,
    options: BusOptions,
    counters: Counters,
}

/// Fan-out event bus. Cheap to clone; clones share rules and in-flight state.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new(options: BusOptions) -> Self {
        Self {
            inner: Arc::new(BusInner {
                rules: RwLock::new(Vec::new()),
                next_rule: AtomicU64::new(1),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                options,
                counters: Counters::default(),
            }),
        }
    }

    /// Register a rule. New stages are added by appending rules.
    pub fn register_rule(
        &self,
        name: impl Into<String>,
        pattern: EventPattern,
        handler: Arc<dyn Handler>,
    ) -> Result<RuleId, BusError> {
        pattern.validate()?;
        let mut rules = self.inner.rules.write().map_err(|_| BusError::Poisoned)?;
        let id = RuleId(self.inner.next_rule.fetch_add(1, Ordering::SeqCst));
        let rule = Rule {
            id,
            name: name.into(),
            pattern,
            handler,
        };
        debug!(rule = %id, name = rule.name.as_str(), handler = rule.handler.name(), "Registered rule");
        rules.push(rule);
        Ok(id)
    }

    /// Remove a rule. In-flight invocations of it run to completion.
    pub fn remove_rule(&self, id: RuleId) -> bool {
        let Ok(mut rules) = self.inner.rules.write() else {
            return false;
        };
        let before = rules.len();
        rules.retain(|r| r.id != id);
        rules.len() != before
    }

    pub fn rules(&self) -> Vec<RuleInfo> {
        self.inner
            .rules
            .read()
            .map(|rules| {
                rules
                    .iter()
                    .map(|r| RuleInfo {
                        id: r.id,
                        name: r.name.clone(),
                        pattern: r.pattern.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Rules whose pattern matches `event`, without dispatching.
    pub fn matching_rules(&self, event: &Event) -> Vec<RuleId> {
        self.inner
            .rules
            .read()
            .map(|rules| {
                rules
                    .iter()
                    .filter(|r| r.pattern.matches(event))
                    .map(|r| r.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Publish an event. Returns before any handler runs.
    ///
    /// Every matching rule's handler is invoked in its own task; order among
    /// them is unspecified. An event matching no rule is dropped.
    /// Must be called from within a Tokio runtime.
    pub fn publish(&self, event: Event) {
        let counters = &self.inner.counters;
        counters.published.fetch_add(1, Ordering::Relaxed);

        let targets: Vec<(RuleId, String, Arc<dyn Handler>)> = match self.inner.rules.read() {
            Ok(rules) => rules
                .iter()
                .filter(|r| r.pattern.matches(&event))
                .map(|r| (r.id, r.name.clone(), r.handler.clone()))
                .collect(),
            Err(_) => Vec::new(),
        };

        if targets.is_empty() {
            counters.unrouted.fetch_add(1, Ordering::Relaxed);
            debug!(
                event_id = %event.id,
                source = event.source.as_str(),
                detail_type = event.detail_type.as_str(),
                "No rule matched, event dropped"
            );
            return;
        }

        let event = Arc::new(event);
        for (rule, name, handler) in targets {
            let guard = InFlight::enter(&self.inner);
            let bus = self.clone();
            let event = event.clone();
            tokio::spawn(async move {
                bus.invoke(rule, &name, handler, event).await;
                drop(guard);
            });
        }
    }

    /// Resolves once no handler invocation is in flight, including those
    /// triggered by re-published events.
    pub async fn settled(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> BusStats {
        let c = &self.inner.counters;
        BusStats {
            published: c.published.load(Ordering::Relaxed),
            unrouted: c.unrouted.load(Ordering::Relaxed),
            invocations: c.invocations.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
        }
    }

    async fn invoke(&self, rule: RuleId, name: &str, handler: Arc<dyn Handler>, event: Arc<Event>) {
        self.inner.counters.invocations.fetch_add(1, Ordering::Relaxed);
        let timeout = self.inner.options.handler_timeout;

        // Separate task so a panic surfaces as a JoinError instead of unwinding here.
        let mut invocation = {
            let handler = handler.clone();
            let event = event.clone();
            tokio::spawn(async move { handler.handle(&event).await })
        };

        let reason = match tokio::time::timeout(timeout, &mut invocation).await {
            Ok(Ok(Ok(children))) => {
                debug!(
                    rule = %rule,
                    handler = handler.name(),
                    event_id = %event.id,
                    emitted = children.len(),
                    "Handler completed"
                );
                for child in children {
                    let child = match child.caused_by {
                        Some(_) => child,
                        None => child.caused_by(event.id),
                    };
                    self.publish(child);
                }
                return;
            }
            Ok(Ok(Err(e))) => FailureReason::Error(format!("{e:#}")),
            Ok(Err(join_error)) => FailureReason::Panicked(join_error.to_string()),
            Err(_) => {
                invocation.abort();
                FailureReason::TimedOut(timeout)
            }
        };

        self.inner.counters.failures.fetch_add(1, Ordering::Relaxed);
        warn!(
            rule = %rule,
            rule_name = name,
            handler = handler.name(),
            event_id = %event.id,
            source = event.source.as_str(),
            detail_type = event.detail_type.as_str(),
            reason = %reason,
            "Handler failed"
        );

        if let Some(sink) = &self.inner.options.dead_letters {
            sink.record(DeadLetter {
                rule,
                handler: handler.name().to_string(),
                event: (*event).clone(),
                reason,
                failed_at: Utc::now(),
            });
        }
    }
}

/// Counts one handler invocation as in flight until dropped.
struct InFlight(Arc<BusInner>);

impl InFlight {
    fn enter(inner: &Arc<BusInner>) -> Self {
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        Self(inner.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}
