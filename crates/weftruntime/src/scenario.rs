use crate::cycle::{Cycle, CycleManager};
use crate::data_node::DataNode;
use crate::error::ScenarioError;
use crate::pipeline::Pipeline;
use crate::pipeline_manager::PipelineManager;
use crate::repository::{Entity, InMemoryRepository, Repository};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;
use weftcore::{Comparator, ScenarioConfig, Value};

pub type ScenarioId = String;

/// Runtime instance of a scenario: a set of pipelines, optionally attached
/// to a recurrence cycle. Cloning is cheap and shares the same instance.
#[derive(Clone)]
pub struct Scenario {
    inner: Arc<ScenarioInner>,
}

struct ScenarioInner {
    id: ScenarioId,
    config_name: String,
    pipelines: Vec<Pipeline>,
    cycle: Option<Cycle>,
    creation_date: DateTime<Utc>,
    comparators: HashMap<String, Vec<Comparator>>,
    properties: HashMap<String, Value>,
}

impl Scenario {
    fn new(
        id: ScenarioId,
        config_name: impl Into<String>,
        pipelines: Vec<Pipeline>,
        cycle: Option<Cycle>,
        comparators: HashMap<String, Vec<Comparator>>,
        properties: HashMap<String, Value>,
    ) -> Self {
        Self {
            inner: Arc::new(ScenarioInner {
                id,
                config_name: config_name.into(),
                pipelines,
                cycle,
                creation_date: Utc::now(),
                comparators,
                properties,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn config_name(&self) -> &str {
        &self.inner.config_name
    }

    pub fn pipelines(&self) -> &[Pipeline] {
        &self.inner.pipelines
    }

    pub fn pipeline(&self, config_name: &str) -> Option<&Pipeline> {
        self.inner
            .pipelines
            .iter()
            .find(|pipeline| pipeline.config_name() == config_name)
    }

    pub fn cycle(&self) -> Option<&Cycle> {
        self.inner.cycle.as_ref()
    }

    pub fn creation_date(&self) -> DateTime<Utc> {
        self.inner.creation_date
    }

    /// Comparators declared on the config, keyed by data node config name.
    pub fn comparators(&self, data_node_name: &str) -> &[Comparator] {
        self.inner
            .comparators
            .get(data_node_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every data node reachable from this scenario's pipelines,
    /// deduplicated by identity.
    pub fn data_nodes(&self) -> Vec<DataNode> {
        let mut nodes: Vec<DataNode> = Vec::new();
        for pipeline in &self.inner.pipelines {
            for node in pipeline.data_nodes() {
                if !nodes.contains(&node) {
                    nodes.push(node);
                }
            }
        }
        nodes
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.properties.get(key)
    }
}

impl PartialEq for Scenario {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Scenario {}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("id", &self.inner.id)
            .field("config_name", &self.inner.config_name)
            .field("pipelines", &self.inner.pipelines.len())
            .field("cycle", &self.inner.cycle.as_ref().map(Cycle::id))
            .finish()
    }
}

impl Entity for Scenario {
    fn id(&self) -> String {
        self.inner.id.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "config_name" => Some(self.inner.config_name.clone()),
            "cycle_id" => self.inner.cycle.as_ref().map(|c| c.id().to_string()),
            _ => None,
        }
    }
}

/// Creates and retrieves scenarios. Unlike data nodes, tasks and pipelines,
/// every `create` call makes a fresh scenario instance; sharing happens at
/// the data node level through scopes.
#[derive(Clone)]
pub struct ScenarioManager {
    repository: Arc<dyn Repository<Scenario>>,
    pipeline_manager: PipelineManager,
    cycle_manager: CycleManager,
}

impl ScenarioManager {
    pub fn new(pipeline_manager: PipelineManager) -> Self {
        Self {
            repository: InMemoryRepository::new(),
            pipeline_manager,
            cycle_manager: CycleManager::new(),
        }
    }

    pub fn pipeline_manager(&self) -> &PipelineManager {
        &self.pipeline_manager
    }

    pub fn cycle_manager(&self) -> &CycleManager {
        &self.cycle_manager
    }

    /// Creates a new scenario from `config`, materializing its pipelines.
    /// When the config has a frequency, the scenario is attached to the
    /// cycle containing `creation_date` (now by default).
    pub fn create(
        &self,
        config: &ScenarioConfig,
        creation_date: Option<DateTime<Utc>>,
    ) -> Result<Scenario, ScenarioError> {
        let cycle = config
            .frequency()
            .map(|frequency| {
                self.cycle_manager
                    .get_or_create(frequency, creation_date.unwrap_or_else(Utc::now))
            });
        let scenario_id: ScenarioId = format!("scenario_{}_{}", config.name(), Uuid::new_v4());
        let mut pipelines: Vec<Pipeline> = Vec::with_capacity(config.pipelines().len());
        for pipeline_config in config.pipelines() {
            let pipeline = self
                .pipeline_manager
                .get_or_create(pipeline_config, Some(&scenario_id))?;
            pipelines.push(pipeline);
        }
        let scenario = Scenario::new(
            scenario_id,
            config.name(),
            pipelines,
            cycle,
            config.comparators().clone(),
            config.properties.clone(),
        );
        tracing::info!(
            scenario_id = scenario.id(),
            config_name = config.name(),
            "scenario created"
        );
        self.repository.save(scenario.clone());
        Ok(scenario)
    }

    pub fn get(&self, id: &str) -> Result<Scenario, ScenarioError> {
        self.repository
            .load(id)
            .ok_or_else(|| ScenarioError::NotFound(id.to_string()))
    }

    pub fn get_all(&self) -> Vec<Scenario> {
        self.repository.load_all()
    }

    /// Scenarios attached to the given cycle.
    pub fn get_all_by_cycle(&self, cycle_id: &str) -> Vec<Scenario> {
        self.repository.search_all("cycle_id", cycle_id)
    }

    pub fn delete(&self, id: &str) -> Result<(), ScenarioError> {
        if self.repository.delete(id) {
            Ok(())
        } else {
            Err(ScenarioError::NotFound(id.to_string()))
        }
    }

    pub fn delete_all(&self) {
        self.repository.delete_all();
    }

    /// Deletes the scenario together with its scenario-scoped pipelines,
    /// tasks and data nodes. Entities shared with a broader scope survive.
    pub fn hard_delete(&self, id: &str) -> Result<(), ScenarioError> {
        let scenario = self.get(id)?;
        for pipeline in scenario.pipelines() {
            if pipeline.parent_id() == Some(scenario.id()) {
                for task in pipeline.tasks() {
                    if task.parent_id() == Some(scenario.id()) {
                        self.pipeline_manager
                            .task_manager()
                            .hard_delete(task.id(), Some(scenario.id()), None)
                            .map_err(crate::error::PipelineError::Task)?;
                    }
                }
                self.pipeline_manager.hard_delete(pipeline.id())?;
            }
        }
        self.delete(scenario.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_manager::DataManager;
    use crate::task_manager::TaskManager;
    use weftcore::{DataNodeConfig, Frequency, PipelineConfig, Scope, TaskConfig, TaskOutput};

    fn noop() -> weftcore::TaskFunction {
        Arc::new(|_| Ok(TaskOutput::Single(Value::Null)))
    }

    fn manager() -> ScenarioManager {
        ScenarioManager::new(PipelineManager::new(TaskManager::new(DataManager::new())))
    }

    fn config() -> ScenarioConfig {
        let raw = DataNodeConfig::new("raw").with_scope(Scope::Scenario);
        let out = DataNodeConfig::new("out").with_scope(Scope::Pipeline);
        ScenarioConfig::new("monthly_report").with_pipeline(
            PipelineConfig::new("etl").with_task(
                TaskConfig::new("clean", noop())
                    .with_input(raw)
                    .with_output(out),
            ),
        )
    }

    #[test]
    fn each_create_makes_a_fresh_scenario() {
        let manager = manager();
        let first = manager.create(&config(), None).unwrap();
        let second = manager.create(&config(), None).unwrap();
        assert_ne!(first.id(), second.id());
        // Scenario-scoped nodes are private to each scenario.
        let n1 = first.pipelines()[0].tasks()[0].input("raw").unwrap().id();
        let n2 = second.pipelines()[0].tasks()[0].input("raw").unwrap().id();
        assert_ne!(n1, n2);
    }

    #[test]
    fn frequency_attaches_the_scenario_to_a_cycle() {
        let manager = manager();
        let config = config().with_frequency(Frequency::Monthly);
        let scenario = manager.create(&config, None).unwrap();
        let cycle = scenario.cycle().unwrap();
        assert_eq!(cycle.frequency(), Frequency::Monthly);
        assert_eq!(
            manager.get_all_by_cycle(cycle.id()).len(),
            1
        );
        // Another scenario created in the same window shares the cycle.
        let sibling = manager.create(&config, None).unwrap();
        assert_eq!(sibling.cycle().unwrap().id(), cycle.id());
    }

    #[test]
    fn hard_delete_spares_global_nodes() {
        let manager = manager();
        let shared = DataNodeConfig::new("reference").with_scope(Scope::Global);
        let local = DataNodeConfig::new("result").with_scope(Scope::Scenario);
        let config = ScenarioConfig::new("s").with_pipeline(
            PipelineConfig::new("p").with_task(
                TaskConfig::new("t", noop())
                    .with_input(shared)
                    .with_output(local),
            ),
        );
        let scenario = manager.create(&config, None).unwrap();
        let data_manager = manager
            .pipeline_manager()
            .task_manager()
            .data_manager()
            .clone();
        assert_eq!(data_manager.get_all().len(), 2);

        manager.hard_delete(scenario.id()).unwrap();
        assert!(manager.get_all().is_empty());
        let remaining = data_manager.get_all();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].config_name(), "reference");
    }
}
