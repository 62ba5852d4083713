use crate::digest;
use crate::types::{
    ComposedArtifact, Entity, MenuPolicy, MenuResult, MenuSection, NotifierError, Result,
    TargetDate, WeatherResult,
};
use std::collections::HashMap;
use tracing::{info, warn};

/// Outcome of one entity's menu fetch, success or failure.
#[derive(Debug)]
pub struct MenuOutcome {
    pub entity: Entity,
    pub result: Result<MenuResult>,
}

impl MenuOutcome {
    pub fn new(entity: Entity, result: Result<MenuResult>) -> Self {
        Self { entity, result }
    }
}

/// Merges fetch outcomes into the day's artifact under a `MenuPolicy`.
pub struct Aggregator {
    entities: Vec<Entity>,
    policy: MenuPolicy,
}

impl Aggregator {
    pub fn new(entities: Vec<Entity>, policy: MenuPolicy) -> Self {
        Self { entities, policy }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Build the artifact, or fail with `NoPrimaryMenu` when the policy's
    /// required menus are missing. Weather never fails the run.
    pub fn compose(
        &self,
        date: &TargetDate,
        menus: Vec<MenuOutcome>,
        weather: Option<WeatherResult>,
    ) -> Result<ComposedArtifact> {
        let accepted = self.accept(menus)?;
        let sections = group_sections(&accepted);

        let weather = weather.filter(|w| {
            if !w.has_data() {
                info!(date = %date, "Omitting weather section, forecast has no readings");
            }
            w.has_data()
        });

        let text = digest::render(date, &sections, weather.as_ref());
        info!(
            date = %date,
            menus = accepted.len(),
            sections = sections.len(),
            weather = weather.is_some(),
            "Composed artifact"
        );

        Ok(ComposedArtifact {
            date: *date,
            sections,
            weather,
            text,
        })
    }

    /// Apply the policy, returning successful menus in configured entity order.
    fn accept(&self, menus: Vec<MenuOutcome>) -> Result<Vec<(Entity, MenuResult)>> {
        let mut by_id: HashMap<String, Result<MenuResult>> = HashMap::new();
        for outcome in menus {
            if !self.entities.iter().any(|e| e.id == outcome.entity.id) {
                warn!(entity = %outcome.entity.display_name, "Ignoring menu for unconfigured entity");
                continue;
            }
            by_id.insert(outcome.entity.id, outcome.result);
        }

        let mut accepted = Vec::new();
        let mut failed: Vec<&Entity> = Vec::new();
        for entity in &self.entities {
            match by_id.remove(&entity.id) {
                Some(Ok(menu)) => accepted.push((entity.clone(), menu)),
                Some(Err(e)) => {
                    warn!(entity = %entity.display_name, error = %e, "Menu unavailable");
                    failed.push(entity);
                }
                None => {
                    warn!(entity = %entity.display_name, "No menu outcome recorded");
                    failed.push(entity);
                }
            }
        }

        let missing: Vec<&Entity> = match self.policy {
            MenuPolicy::Primary => self
                .entities
                .first()
                .filter(|primary| failed.iter().any(|f| f.id == primary.id))
                .into_iter()
                .collect(),
            MenuPolicy::All => failed,
            MenuPolicy::Any if accepted.is_empty() => self.entities.iter().collect(),
            MenuPolicy::Any => Vec::new(),
        };

        if !missing.is_empty() || accepted.is_empty() {
            let names = if missing.is_empty() {
                "all entities".to_string()
            } else {
                missing
                    .iter()
                    .map(|e| e.display_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            return Err(NotifierError::NoPrimaryMenu { entities: names });
        }

        Ok(accepted)
    }
}

/// Group menus whose trimmed items match, keeping first-appearance order.
///
/// When every menu lands in one group of two or more entities, that group
/// becomes the single unlabeled shared section.
pub fn group_sections(menus: &[(Entity, MenuResult)]) -> Vec<MenuSection> {
    let mut groups: Vec<(Vec<String>, Vec<String>)> = Vec::new();

    for (entity, menu) in menus {
        let key: Vec<String> = menu.items.iter().map(|i| i.trim().to_string()).collect();
        match groups.iter_mut().find(|(items, _)| *items == key) {
            Some((_, names)) => names.push(entity.display_name.clone()),
            None => groups.push((key, vec![entity.display_name.clone()])),
        }
    }

    let shared = groups.len() == 1 && groups[0].1.len() > 1;
    groups
        .into_iter()
        .map(|(items, entity_names)| MenuSection {
            entity_names,
            items,
            shared,
        })
        .collect()
}
