//! Identifier stability across extractions.
//!
//! Power BI regenerates some identifiers (partition names, lineage tags)
//! every time a package is saved, even when nothing changed. The resolver
//! rewrites each regenerated identifier back to the value recorded at the
//! previous extraction, so unchanged models produce unchanged files.
//!
//! Entities are matched by structural key, found by pluggable
//! [`IdentityStrategy`] implementations. Renaming an entity changes its key,
//! so it is treated as a new entity and gets a new baseline.

mod strategy;

use std::collections::BTreeMap;

use serde_json::Value;

use pbix_model::IdentifierMap;

use crate::context::ConversionContext;

pub use strategy::{
    EntityIdentity, ExpressionStrategy, IdentityStrategy, QueryStrategy, TableMemberStrategy,
    TableStrategy, default_strategies,
};

/// Counts from one resolver pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StabilityReport {
    /// Identifiers rewritten to their recorded stable value.
    pub rewritten: usize,
    /// Identifiers that already matched their stable value.
    pub unchanged: usize,
    /// Entities seen for the first time.
    pub baselined: usize,
    /// Entities whose stable value was taken by another entity and were
    /// given their fresh identifier as the new baseline.
    pub rebaselined: usize,
}

impl StabilityReport {
    pub fn total(&self) -> usize {
        self.rewritten + self.unchanged + self.baselined + self.rebaselined
    }
}

pub struct StabilityResolver {
    strategies: Vec<Box<dyn IdentityStrategy>>,
}

impl Default for StabilityResolver {
    fn default() -> Self {
        Self::new(default_strategies())
    }
}

impl StabilityResolver {
    pub fn new(strategies: Vec<Box<dyn IdentityStrategy>>) -> Self {
        Self { strategies }
    }

    /// Rewrite identifiers in `schema` to their stable values and update
    /// `map` with what was observed. Keys absent from this schema keep their
    /// entries in `map`.
    pub fn resolve(
        &self,
        schema: &mut Value,
        map: &mut IdentifierMap,
        ctx: &mut ConversionContext,
    ) -> StabilityReport {
        let mut report = StabilityReport::default();
        for strategy in &self.strategies {
            let entities = disambiguate(strategy.locate(schema));
            let kind_report = resolve_kind(strategy.kind(), &entities, schema, map, ctx);
            report.rewritten += kind_report.rewritten;
            report.unchanged += kind_report.unchanged;
            report.baselined += kind_report.baselined;
            report.rebaselined += kind_report.rebaselined;
        }
        tracing::info!(
            rewritten = report.rewritten,
            unchanged = report.unchanged,
            baselined = report.baselined,
            rebaselined = report.rebaselined,
            "resolved identifier stability"
        );
        report
    }
}

/// Suffix repeated keys with `#dup1`, `#dup2`, ... in document order.
fn disambiguate(entities: Vec<EntityIdentity>) -> Vec<EntityIdentity> {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    entities
        .into_iter()
        .map(|mut entity| {
            let count = seen.entry(entity.key.clone()).or_insert(0);
            if *count > 0 {
                entity.key = format!("{}#dup{}", entity.key, count);
            }
            *count += 1;
            entity
        })
        .collect()
}

/// Outcome for one located identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Decision {
    /// First sighting. The current id becomes the baseline.
    Baseline,
    /// Current id already equals the stable id.
    Unchanged,
    /// Rewrite to this stable id.
    Restore(String),
    /// This stable id would collide with another entity; keep the current id.
    Rebaseline(String),
}

fn resolve_kind(
    kind: &'static str,
    entities: &[EntityIdentity],
    schema: &mut Value,
    map: &mut IdentifierMap,
    ctx: &mut ConversionContext,
) -> StabilityReport {
    let mut decisions: Vec<Decision> = entities
        .iter()
        .map(|entity| match map.stable_id(&entity.key) {
            None => Decision::Baseline,
            Some(stable) if stable == entity.id => Decision::Unchanged,
            Some(stable) => Decision::Restore(stable.to_string()),
        })
        .collect();
    demote_colliding_restores(entities, &mut decisions);

    let mut report = StabilityReport::default();
    for (entity, decision) in entities.iter().zip(decisions) {
        match decision {
            Decision::Baseline => {
                map.record(&entity.key, &entity.id, &entity.id);
                report.baselined += 1;
            }
            Decision::Unchanged => {
                map.record(&entity.key, &entity.id, &entity.id);
                report.unchanged += 1;
            }
            Decision::Restore(stable) => {
                if let Some(slot) = schema.pointer_mut(&entity.pointer) {
                    *slot = Value::String(stable.clone());
                }
                tracing::debug!(key = %entity.key, from = %entity.id, to = %stable, "restored stable id");
                map.record(&entity.key, &stable, &entity.id);
                report.rewritten += 1;
            }
            Decision::Rebaseline(stable) => {
                ctx.warn(
                    Some(&entity.key),
                    format!(
                        "{kind} stable id '{stable}' is already used; keeping '{}' as the new baseline",
                        entity.id
                    ),
                );
                map.record(&entity.key, &entity.id, &entity.id);
                report.rebaselined += 1;
            }
        }
    }
    report
}

/// Turn restores into rebaselines until no restore shares its final id with
/// another entity. Entities keeping their current id win over a restore, and
/// an earlier restore wins over a later one. A demoted entity keeps its
/// current id, which may collide with another restore, so passes repeat.
fn demote_colliding_restores(entities: &[EntityIdentity], decisions: &mut [Decision]) {
    loop {
        let demote: Vec<usize> = {
            let mut holders: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
            for (index, (entity, decision)) in entities.iter().zip(decisions.iter()).enumerate() {
                let id = match decision {
                    Decision::Restore(stable) => stable.as_str(),
                    _ => entity.id.as_str(),
                };
                holders.entry(id).or_default().push(index);
            }
            let mut demote = Vec::new();
            for indexes in holders.values().filter(|indexes| indexes.len() > 1) {
                let restores: Vec<usize> = indexes
                    .iter()
                    .copied()
                    .filter(|&i| matches!(decisions[i], Decision::Restore(_)))
                    .collect();
                // Without a keeper the first restore holds the id.
                let kept_by_other = restores.len() < indexes.len();
                demote.extend(restores.into_iter().skip(usize::from(!kept_by_other)));
            }
            demote
        };
        if demote.is_empty() {
            return;
        }
        for index in demote {
            if let Decision::Restore(stable) = &decisions[index] {
                let stable = stable.clone();
                decisions[index] = Decision::Rebaseline(stable);
            }
        }
    }
}
