//! The pipeline's rule table and its installation on a bus.
//!
//! Stage selection is data: each row pairs an event pattern with a stage.
//! Adding a stage means appending a row here, not branching in a handler.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use waypoint_common::{DetailType, EntityFamily};
use waypoint_engine::{BusError, EventBus, Handler, RuleId};
use waypoint_events::EventPattern;
use waypoint_store::Table;

use crate::audit::AuditSink;
use crate::delivery::Delivery;
use crate::entities::{Connection, KeyLayout, Location};
use crate::registry::ConnectionRegistry;
use crate::stages::{LoadStage, NotifyStage, ObserverStage, TransformStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Transform,
    LoadLocation,
    LoadConnection,
    Notify,
    Observe,
}

#[derive(Debug, Clone)]
pub struct RuleDef {
    pub name: &'static str,
    pub description: &'static str,
    pub pattern: EventPattern,
    pub stage: Stage,
}

/// Every rule the pipeline registers.
pub fn rule_table() -> Vec<RuleDef> {
    vec![
        RuleDef {
            name: "transform",
            description: "Reshape raw location updates",
            pattern: EventPattern::families(&[EntityFamily::Location])
                .detail_type(DetailType::Update),
            stage: Stage::Transform,
        },
        RuleDef {
            name: "load-location",
            description: "Persist canonical locations",
            pattern: EventPattern::families(&[EntityFamily::Location])
                .detail_type(DetailType::Transformed),
            stage: Stage::LoadLocation,
        },
        RuleDef {
            name: "load-ws",
            description: "Persist websocket connection state",
            pattern: EventPattern::families(&[EntityFamily::Ws])
                .detail_type(DetailType::Transformed),
            stage: Stage::LoadConnection,
        },
        RuleDef {
            name: "notify",
            description: "Push loaded locations to connected consumers",
            pattern: EventPattern::families(&[EntityFamily::Location])
                .detail_type(DetailType::Loaded),
            stage: Stage::Notify,
        },
        RuleDef {
            name: "observe",
            description: "Audit every pipeline event",
            pattern: EventPattern::families(&EntityFamily::ALL),
            stage: Stage::Observe,
        },
    ]
}

/// Collaborators the stages are built from.
#[derive(Clone)]
pub struct PipelineDeps {
    pub table: Table,
    pub registry: Arc<dyn ConnectionRegistry>,
    pub delivery: Arc<dyn Delivery>,
    pub audit: Arc<dyn AuditSink>,
    pub layout: KeyLayout,
}

impl PipelineDeps {
    fn handler(&self, stage: Stage) -> Arc<dyn Handler> {
        match stage {
            Stage::Transform => Arc::new(TransformStage),
            Stage::LoadLocation => Arc::new(LoadStage::<Location>::new(self.table.clone(), self.layout)),
            Stage::LoadConnection => {
                Arc::new(LoadStage::<Connection>::new(self.table.clone(), self.layout))
            }
            Stage::Notify => Arc::new(NotifyStage::new(
                self.table.clone(),
                self.registry.clone(),
                self.delivery.clone(),
            )),
            Stage::Observe => Arc::new(ObserverStage::new(self.audit.clone())),
        }
    }
}

/// The rule table installed on a bus.
pub struct Pipeline {
    bus: EventBus,
    rules: HashMap<Stage, RuleId>,
}

impl Pipeline {
    /// Register every row of `rule_table` on `bus`. The Observer row is
    /// skipped when `observer_enabled` is false.
    pub fn install(
        bus: &EventBus,
        deps: &PipelineDeps,
        observer_enabled: bool,
    ) -> Result<Self, BusError> {
        let mut rules = HashMap::new();
        for def in rule_table() {
            if def.stage == Stage::Observe && !observer_enabled {
                info!(rule = def.name, "Observer disabled, rule not registered");
                continue;
            }
            let id = bus.register_rule(def.name, def.pattern, deps.handler(def.stage))?;
            debug!(rule = %id, name = def.name, description = def.description, "Installed rule");
            rules.insert(def.stage, id);
        }

        info!(rules = rules.len(), "Pipeline installed");
        Ok(Self {
            bus: bus.clone(),
            rules,
        })
    }

    pub fn rule_id(&self, stage: Stage) -> Option<RuleId> {
        self.rules.get(&stage).copied()
    }

    /// Unregister the Observer. Pipeline behavior is unchanged.
    pub fn disable_observer(&mut self) -> bool {
        match self.rules.remove(&Stage::Observe) {
            Some(id) => self.bus.remove_rule(id),
            None => false,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use waypoint_events::Event;

    fn matching(event: &Event) -> Vec<&'static str> {
        rule_table()
            .into_iter()
            .filter(|def| def.pattern.matches(event))
            .map(|def| def.name)
            .collect()
    }

    #[test]
    fn every_rule_is_valid() {
        for def in rule_table() {
            assert!(def.pattern.validate().is_ok(), "{}", def.name);
        }
    }

    #[test]
    fn rows_route_each_step() {
        let of = |family, dt| Event::of(family, dt, json!({"id": "x"}));

        assert_eq!(
            matching(&of(EntityFamily::Location, DetailType::Update)),
            vec!["transform", "observe"]
        );
        assert_eq!(
            matching(&of(EntityFamily::Location, DetailType::Transformed)),
            vec!["load-location", "observe"]
        );
        assert_eq!(
            matching(&of(EntityFamily::Ws, DetailType::Transformed)),
            vec!["load-ws", "observe"]
        );
        assert_eq!(
            matching(&of(EntityFamily::Location, DetailType::Loaded)),
            vec!["notify", "observe"]
        );
        assert_eq!(matching(&of(EntityFamily::Ws, DetailType::Loaded)), vec!["observe"]);
    }

    #[test]
    fn foreign_sources_match_nothing() {
        let event = Event::new("Billing", "Update", json!({}));
        assert!(matching(&event).is_empty());
    }
}
