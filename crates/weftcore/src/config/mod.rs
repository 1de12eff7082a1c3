//! Layered configuration resolver.
//!
//! Three independent fragments are merged in strictly increasing precedence:
//! hard-coded defaults, code configuration (built through [`Config`]'s
//! `add_*`/`set_*` calls), a file fragment loaded with [`Config::load`], and
//! an environment fragment read from the path named by the
//! [`Config::CONFIG_PATH_ENV_VAR`] environment variable. Each later layer
//! overwrites only the keys it defines. After merging, the checker validates
//! the result; any error-level issue fails compilation after the full issue
//! list has been logged.

pub mod checker;
mod data_node_config;
mod file;
mod global_config;
mod job_config;
mod pipeline_config;
mod scenario_config;
mod task_config;

pub use data_node_config::{DataNodeConfig, DEFAULT_SCOPE, DEFAULT_STORAGE_TYPE};
pub use global_config::GlobalConfig;
pub use job_config::{JobConfig, JobMode, DEFAULT_NB_OF_WORKERS};
pub use pipeline_config::PipelineConfig;
pub use scenario_config::ScenarioConfig;
pub use task_config::TaskConfig;

use crate::error::ConfigError;
use file::FileFragment;
use std::collections::BTreeMap;
use std::path::Path;

/// Entry point to configure an application and compile the applied
/// configuration. One instance per application run; no global state.
#[derive(Debug, Default)]
pub struct Config {
    global: GlobalConfig,
    job: JobConfig,
    data_nodes: BTreeMap<String, DataNodeConfig>,
    tasks: BTreeMap<String, TaskConfig>,
    pipelines: BTreeMap<String, PipelineConfig>,
    scenarios: BTreeMap<String, ScenarioConfig>,
    file: Option<FileFragment>,
}

impl Config {
    /// Environment variable naming the path of the environment-layer
    /// configuration file.
    pub const CONFIG_PATH_ENV_VAR: &'static str = "WEFT_CONFIG_PATH";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_global_config(&mut self, config: GlobalConfig) -> &mut Self {
        self.global = config;
        self
    }

    pub fn set_job_config(&mut self, config: JobConfig) -> &mut Self {
        self.job = config;
        self
    }

    /// Registers a data node config; one instance is kept per normalized name.
    pub fn add_data_node(&mut self, config: DataNodeConfig) -> &mut Self {
        self.data_nodes.insert(config.name().to_string(), config);
        self
    }

    pub fn add_task(&mut self, config: TaskConfig) -> &mut Self {
        for node in config.inputs().iter().chain(config.outputs()) {
            self.data_nodes
                .entry(node.name().to_string())
                .or_insert_with(|| node.clone());
        }
        self.tasks.insert(config.name().to_string(), config);
        self
    }

    pub fn add_pipeline(&mut self, config: PipelineConfig) -> &mut Self {
        for task in config.tasks() {
            if !self.tasks.contains_key(task.name()) {
                self.add_task(task.clone());
            }
        }
        self.pipelines.insert(config.name().to_string(), config);
        self
    }

    pub fn add_scenario(&mut self, config: ScenarioConfig) -> &mut Self {
        for pipeline in config.pipelines() {
            if !self.pipelines.contains_key(pipeline.name()) {
                self.add_pipeline(pipeline.clone());
            }
        }
        self.scenarios.insert(config.name().to_string(), config);
        self
    }

    /// Loads the file-layer fragment. `ENV[VAR]` placeholders inside it are
    /// resolved at compile time, not here.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.file = Some(FileFragment::read(path.as_ref())?);
        Ok(())
    }

    /// Merges defaults, code, file and environment layers, validates the
    /// result and returns the applied configuration.
    ///
    /// The environment layer is re-read on every call, so external mutation
    /// of the environment between calls legitimately changes the result.
    pub fn compile(&self) -> Result<AppliedConfig, ConfigError> {
        let mut applied = AppliedConfig::default_config();
        applied.update_from_code(self);
        if let Some(fragment) = &self.file {
            applied.apply_fragment(fragment)?;
        }
        if let Some(path) = std::env::var_os(Self::CONFIG_PATH_ENV_VAR) {
            tracing::info!(
                path = %Path::new(&path).display(),
                "loading environment configuration fragment"
            );
            let fragment = FileFragment::read(Path::new(&path))?;
            applied.apply_fragment(&fragment)?;
        }
        applied.refresh_references();
        let collector = checker::check(&applied);
        collector.log();
        if !collector.errors.is_empty() {
            return Err(ConfigError::Issues(collector));
        }
        Ok(applied)
    }
}

/// Fully merged and validated configuration.
#[derive(Debug, Clone)]
pub struct AppliedConfig {
    global: GlobalConfig,
    job: JobConfig,
    data_nodes: BTreeMap<String, DataNodeConfig>,
    tasks: BTreeMap<String, TaskConfig>,
    pipelines: BTreeMap<String, PipelineConfig>,
    scenarios: BTreeMap<String, ScenarioConfig>,
}

impl AppliedConfig {
    fn default_config() -> Self {
        Self {
            global: GlobalConfig::default_config(),
            job: JobConfig::default_config(),
            data_nodes: BTreeMap::new(),
            tasks: BTreeMap::new(),
            pipelines: BTreeMap::new(),
            scenarios: BTreeMap::new(),
        }
    }

    pub fn global_config(&self) -> &GlobalConfig {
        &self.global
    }

    pub fn job_config(&self) -> &JobConfig {
        &self.job
    }

    pub fn data_nodes(&self) -> &BTreeMap<String, DataNodeConfig> {
        &self.data_nodes
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.tasks
    }

    pub fn pipelines(&self) -> &BTreeMap<String, PipelineConfig> {
        &self.pipelines
    }

    pub fn scenarios(&self) -> &BTreeMap<String, ScenarioConfig> {
        &self.scenarios
    }

    pub fn data_node(&self, name: &str) -> Option<&DataNodeConfig> {
        self.data_nodes.get(name)
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.tasks.get(name)
    }

    pub fn pipeline(&self, name: &str) -> Option<&PipelineConfig> {
        self.pipelines.get(name)
    }

    pub fn scenario(&self, name: &str) -> Option<&ScenarioConfig> {
        self.scenarios.get(name)
    }

    fn update_from_code(&mut self, code: &Config) {
        self.global.update_from(&code.global);
        self.job.update_from(&code.job);
        for (name, config) in &code.data_nodes {
            self.data_nodes
                .entry(name.clone())
                .or_insert_with(|| DataNodeConfig::new(name))
                .update_from(config);
        }
        for (name, config) in &code.tasks {
            self.tasks
                .entry(name.clone())
                .or_insert_with(|| TaskConfig::unbound(name))
                .update_from(config);
        }
        for (name, config) in &code.pipelines {
            self.pipelines
                .entry(name.clone())
                .or_insert_with(|| PipelineConfig::new(name))
                .update_from(config);
        }
        for (name, config) in &code.scenarios {
            self.scenarios
                .entry(name.clone())
                .or_insert_with(|| ScenarioConfig::new(name))
                .update_from(config);
        }
    }

    fn apply_fragment(&mut self, fragment: &FileFragment) -> Result<(), ConfigError> {
        if let Some(table) = &fragment.global {
            self.global.apply_table(table)?;
        }
        if let Some(table) = &fragment.job {
            self.job.apply_table(table)?;
        }
        // Data nodes first so same-fragment tasks can reference them.
        for (name, table) in &fragment.data_nodes {
            self.data_nodes
                .entry(name.clone())
                .or_insert_with(|| DataNodeConfig::new(name))
                .apply_table(table)?;
        }
        let data_nodes = self.data_nodes.clone();
        for (name, table) in &fragment.tasks {
            self.tasks
                .entry(name.clone())
                .or_insert_with(|| TaskConfig::unbound(name))
                .apply_table(table, &data_nodes)?;
        }
        let tasks = self.tasks.clone();
        for (name, table) in &fragment.pipelines {
            self.pipelines
                .entry(name.clone())
                .or_insert_with(|| PipelineConfig::new(name))
                .apply_table(table, &tasks)?;
        }
        let pipelines = self.pipelines.clone();
        for (name, table) in &fragment.scenarios {
            self.scenarios
                .entry(name.clone())
                .or_insert_with(|| ScenarioConfig::new(name))
                .apply_table(table, &pipelines)?;
        }
        Ok(())
    }

    /// Re-syncs nested config copies with the final registries so a later
    /// layer's override of a data node flows into the tasks that use it.
    fn refresh_references(&mut self) {
        let data_nodes = self.data_nodes.clone();
        for task in self.tasks.values_mut() {
            task.refresh_nodes(&data_nodes);
        }
        let tasks = self.tasks.clone();
        for pipeline in self.pipelines.values_mut() {
            pipeline.refresh_tasks(&tasks);
        }
        let pipelines = self.pipelines.clone();
        for scenario in self.scenarios.values_mut() {
            scenario.refresh_pipelines(&pipelines);
        }
    }

    /// Serializes the applied configuration back to the TOML section layout.
    /// Output is deterministic: registries are name-sorted and properties are
    /// key-sorted.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        let mut root = toml::Table::new();
        root.insert("global".to_string(), toml::Value::Table(self.global.to_toml()));
        root.insert("job".to_string(), toml::Value::Table(self.job.to_toml()));
        root.insert(
            "data_node".to_string(),
            toml::Value::Table(
                self.data_nodes
                    .iter()
                    .map(|(name, config)| (name.clone(), toml::Value::Table(config.to_toml())))
                    .collect(),
            ),
        );
        root.insert(
            "task".to_string(),
            toml::Value::Table(
                self.tasks
                    .iter()
                    .map(|(name, config)| (name.clone(), toml::Value::Table(config.to_toml())))
                    .collect(),
            ),
        );
        root.insert(
            "pipeline".to_string(),
            toml::Value::Table(
                self.pipelines
                    .iter()
                    .map(|(name, config)| (name.clone(), toml::Value::Table(config.to_toml())))
                    .collect(),
            ),
        );
        root.insert(
            "scenario".to_string(),
            toml::Value::Table(
                self.scenarios
                    .iter()
                    .map(|(name, config)| (name.clone(), toml::Value::Table(config.to_toml())))
                    .collect(),
            ),
        );
        Ok(toml::to_string(&root)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{TaskOutput, Value};
    use std::io::Write;
    use std::sync::{Arc, Mutex, OnceLock};

    // compile() reads process-wide environment state, so tests touching env
    // vars or calling compile() serialize on one lock.
    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn noop_function() -> crate::value::TaskFunction {
        Arc::new(|_inputs| Ok(TaskOutput::Single(Value::Null)))
    }

    fn write_fragment(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let _guard = env_lock().lock().unwrap();
        let config = Config::new();
        let applied = config.compile().unwrap();
        assert_eq!(applied.job_config().mode(), JobMode::Synchronous);
        assert_eq!(applied.job_config().nb_of_workers(), 1);
        assert_eq!(applied.global_config().root_folder(), "./weft/");
    }

    #[test]
    fn file_layer_overlays_only_the_keys_it_defines() {
        let _guard = env_lock().lock().unwrap();
        let file = write_fragment("[job]\nmode = \"parallel\"\n");
        let mut config = Config::new();
        config.set_job_config(JobConfig::new().with_nb_of_workers(7));
        config.load(file.path()).unwrap();
        let applied = config.compile().unwrap();
        // mode comes from the file, worker count survives from code
        assert_eq!(applied.job_config().mode(), JobMode::Parallel);
        assert_eq!(applied.job_config().nb_of_workers(), 7);
    }

    #[test]
    fn environment_layer_has_highest_precedence() {
        let _guard = env_lock().lock().unwrap();
        let file = write_fragment("[job]\nnb_of_workers = 2\n");
        let env_file = write_fragment("[job]\nnb_of_workers = 5\n");
        let mut config = Config::new();
        config.set_job_config(JobConfig::new().with_nb_of_workers(1));
        config.load(file.path()).unwrap();
        std::env::set_var(Config::CONFIG_PATH_ENV_VAR, env_file.path());
        let applied = config.compile();
        std::env::remove_var(Config::CONFIG_PATH_ENV_VAR);
        assert_eq!(applied.unwrap().job_config().nb_of_workers(), 5);
    }

    #[test]
    fn env_placeholder_in_worker_count() {
        let _guard = env_lock().lock().unwrap();
        let file = write_fragment("[job]\nnb_of_workers = \"ENV[WEFT_TEST_WORKERS]\"\n");
        let mut config = Config::new();
        config.load(file.path()).unwrap();

        std::env::remove_var("WEFT_TEST_WORKERS");
        let err = config.compile().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVariable(v) if v == "WEFT_TEST_WORKERS"));

        std::env::set_var("WEFT_TEST_WORKERS", "3");
        let applied = config.compile();
        std::env::remove_var("WEFT_TEST_WORKERS");
        assert_eq!(applied.unwrap().job_config().nb_of_workers(), 3);
    }

    #[test]
    fn checker_error_aborts_compilation() {
        let _guard = env_lock().lock().unwrap();
        let mut config = Config::new();
        config.set_job_config(JobConfig::new().with_nb_of_workers(0));
        match config.compile() {
            Err(ConfigError::Issues(collector)) => {
                assert_eq!(collector.errors.len(), 1);
                assert_eq!(collector.errors[0].field, "job.nb_of_workers");
            }
            other => panic!("expected checker failure, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn recompiling_unchanged_layers_is_idempotent() {
        let _guard = env_lock().lock().unwrap();
        let mut config = Config::new();
        let input = DataNodeConfig::new("raw").with_scope(crate::Scope::Scenario);
        let output = DataNodeConfig::new("clean");
        config.add_task(
            TaskConfig::new("cleaning", noop_function())
                .with_input(input)
                .with_output(output),
        );
        let first = config.compile().unwrap().to_toml_string().unwrap();
        let second = config.compile().unwrap().to_toml_string().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn file_task_references_unknown_data_node() {
        let _guard = env_lock().lock().unwrap();
        let file = write_fragment("[task.training]\ninputs = [\"nowhere\"]\n");
        let mut config = Config::new();
        config.load(file.path()).unwrap();
        let err = config.compile().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownReference { name, .. } if name == "nowhere"));
    }

    #[test]
    fn file_declared_task_without_function_fails_the_checker() {
        let _guard = env_lock().lock().unwrap();
        let file = write_fragment(
            "[data_node.raw]\nscope = \"scenario\"\n\n[task.training]\ninputs = [\"raw\"]\noutputs = []\n",
        );
        let mut config = Config::new();
        config.load(file.path()).unwrap();
        match config.compile() {
            Err(ConfigError::Issues(collector)) => {
                assert!(collector
                    .errors
                    .iter()
                    .any(|issue| issue.field == "task.training.function"));
            }
            other => panic!("expected checker failure, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn later_data_node_override_flows_into_tasks() {
        let _guard = env_lock().lock().unwrap();
        let file = write_fragment("[data_node.raw]\nscope = \"global\"\n");
        let mut config = Config::new();
        config.add_task(
            TaskConfig::new("t", noop_function())
                .with_input(DataNodeConfig::new("raw").with_scope(crate::Scope::Pipeline)),
        );
        config.load(file.path()).unwrap();
        let applied = config.compile().unwrap();
        let task = applied.task("t").unwrap();
        assert_eq!(task.inputs()[0].scope(), crate::Scope::Global);
    }
}
