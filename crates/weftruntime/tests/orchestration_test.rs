use std::sync::Arc;
use weftcore::{
    Config, DataNodeConfig, Frequency, PipelineConfig, ScenarioConfig, Scope, TaskConfig,
    TaskFunction, TaskOutput, Value,
};
use weftruntime::Runtime;

fn double() -> TaskFunction {
    Arc::new(|inputs: Vec<Value>| match inputs.first() {
        Some(Value::Int(n)) => Ok(TaskOutput::Single(Value::Int(n * 2))),
        other => Err(format!("expected an int input, got {:?}", other)),
    })
}

fn sales_scenario() -> ScenarioConfig {
    let history = DataNodeConfig::new("history")
        .with_scope(Scope::Global)
        .with_default_data(21i64);
    let forecast = DataNodeConfig::new("forecast").with_scope(Scope::Scenario);
    let report = DataNodeConfig::new("report").with_scope(Scope::Pipeline);
    ScenarioConfig::new("sales")
        .with_frequency(Frequency::Monthly)
        .with_pipeline(
            PipelineConfig::new("forecasting")
                .with_task(
                    TaskConfig::new("predict", double())
                        .with_input(history)
                        .with_output(forecast.clone()),
                )
                .with_task(
                    TaskConfig::new("publish", double())
                        .with_input(forecast)
                        .with_output(report),
                ),
        )
}

#[test]
fn test_configured_scenario_runs_end_to_end() {
    let mut config = Config::new();
    config.add_scenario(sales_scenario());
    let applied = config.compile().unwrap();
    let runtime = Runtime::new(&applied);

    let scenario_config = applied.scenario("sales").unwrap();
    let scenario = runtime
        .scenario_manager()
        .create(scenario_config, None)
        .unwrap();
    assert!(scenario.cycle().is_some());
    assert_eq!(scenario.data_nodes().len(), 3);

    let pipeline = scenario.pipeline("forecasting").unwrap();
    let jobs = runtime
        .scheduler()
        .submit_pipeline(pipeline, &[])
        .unwrap();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|job| job.is_completed()));

    let report = pipeline.task("publish").unwrap().output("report").unwrap();
    assert_eq!(report.read(), Some(Value::Int(84)));
    // The write history names the publishing job.
    assert_eq!(report.job_ids(), vec![jobs[1].id()]);
}

#[test]
fn test_two_scenarios_share_only_broad_scopes() {
    let mut config = Config::new();
    config.add_scenario(sales_scenario());
    let applied = config.compile().unwrap();
    let runtime = Runtime::new(&applied);
    let scenario_config = applied.scenario("sales").unwrap();

    let first = runtime
        .scenario_manager()
        .create(scenario_config, None)
        .unwrap();
    let second = runtime
        .scenario_manager()
        .create(scenario_config, None)
        .unwrap();

    let node = |scenario: &weftruntime::Scenario, name: &str| {
        scenario
            .data_nodes()
            .into_iter()
            .find(|node| node.config_name() == name)
            .unwrap()
    };
    // The global node is one shared instance, the scenario-scoped one is not.
    assert_eq!(node(&first, "history").id(), node(&second, "history").id());
    assert_ne!(node(&first, "forecast").id(), node(&second, "forecast").id());

    // Running one scenario leaves the other's private nodes untouched.
    let pipeline = first.pipeline("forecasting").unwrap();
    let jobs = runtime.scheduler().submit_pipeline(pipeline, &[]).unwrap();
    assert!(jobs.iter().all(|job| job.is_completed()));
    assert!(node(&first, "forecast").is_ready_for_reading());
    assert!(!node(&second, "forecast").is_ready_for_reading());

    // Both scenarios fall into the same monthly cycle.
    assert_eq!(
        first.cycle().unwrap().id(),
        second.cycle().unwrap().id()
    );
}
