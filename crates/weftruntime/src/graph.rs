//! Dependency ordering over a set of tasks.
//!
//! Two tasks are dependent when one produces a data node the other
//! consumes. Node identity (not config name) decides the match, so two
//! pipelines writing data nodes with the same config name under different
//! parents stay independent.

use crate::data_node::DataNodeId;
use crate::error::PipelineError;
use crate::task::Task;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Sorts tasks into execution waves: every task in wave `n` only consumes
/// data nodes produced by waves `< n` (or by no task at all). Within a
/// wave, tasks keep the caller's relative order.
///
/// A task that consumes one of its own outputs depends on itself and makes
/// the set cyclic.
pub fn sort_into_waves(tasks: &[Task]) -> Result<Vec<Vec<Task>>, PipelineError> {
    let graph = build_graph(tasks);
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|ix| graph.neighbors_directed(ix, petgraph::Direction::Incoming).count())
        .collect();
    let mut remaining: usize = tasks.len();
    let mut placed = vec![false; tasks.len()];
    let mut waves: Vec<Vec<Task>> = Vec::new();

    while remaining > 0 {
        let wave_indices: Vec<usize> = (0..tasks.len())
            .filter(|&i| !placed[i] && in_degree[i] == 0)
            .collect();
        if wave_indices.is_empty() {
            return Err(PipelineError::CyclicDependency);
        }
        for &i in &wave_indices {
            placed[i] = true;
            remaining -= 1;
            for successor in graph.neighbors_directed(NodeIndex::new(i), petgraph::Direction::Outgoing)
            {
                in_degree[successor.index()] -= 1;
            }
        }
        waves.push(wave_indices.into_iter().map(|i| tasks[i].clone()).collect());
    }
    Ok(waves)
}

/// True when no dependency cycle exists among `tasks`.
pub fn is_acyclic(tasks: &[Task]) -> bool {
    !petgraph::algo::is_cyclic_directed(&build_graph(tasks))
}

fn build_graph(tasks: &[Task]) -> DiGraph<usize, ()> {
    let mut graph = DiGraph::with_capacity(tasks.len(), tasks.len());
    for i in 0..tasks.len() {
        graph.add_node(i);
    }
    let mut producers: HashMap<DataNodeId, Vec<usize>> = HashMap::new();
    for (i, task) in tasks.iter().enumerate() {
        for output in task.outputs() {
            producers.entry(output.id()).or_default().push(i);
        }
    }
    for (consumer, task) in tasks.iter().enumerate() {
        for input in task.inputs() {
            if let Some(indices) = producers.get(&input.id()) {
                for &producer in indices {
                    graph.add_edge(NodeIndex::new(producer), NodeIndex::new(consumer), ());
                }
            }
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_node::DataNode;
    use std::sync::Arc;
    use weftcore::{DataNodeConfig, TaskOutput, Value};

    fn node(name: &str) -> DataNode {
        crate::data_manager::DataManager::new()
            .get_or_create(
                &DataNodeConfig::new(name).with_scope(weftcore::Scope::Global),
                &crate::data_manager::ParentIds::none(),
            )
            .unwrap()
    }

    fn task(name: &str, inputs: Vec<DataNode>, outputs: Vec<DataNode>) -> Task {
        Task::new(
            name,
            inputs,
            Arc::new(|_| Ok(TaskOutput::Single(Value::Null))),
            outputs,
            None,
            Default::default(),
        )
    }

    #[test]
    fn chain_sorts_into_one_task_per_wave() {
        let a = node("a");
        let b = node("b");
        let c = node("c");
        let t1 = task("t1", vec![a.clone()], vec![b.clone()]);
        let t2 = task("t2", vec![b], vec![c]);
        // Submission order should not matter.
        let waves = sort_into_waves(&[t2.clone(), t1.clone()]).unwrap();
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0], vec![t1]);
        assert_eq!(waves[1], vec![t2]);
    }

    #[test]
    fn independent_tasks_share_a_wave_in_input_order() {
        let t1 = task("t1", vec![node("a")], vec![node("b")]);
        let t2 = task("t2", vec![node("c")], vec![node("d")]);
        let waves = sort_into_waves(&[t1.clone(), t2.clone()]).unwrap();
        assert_eq!(waves, vec![vec![t1, t2]]);
    }

    #[test]
    fn diamond_joins_after_both_branches() {
        let src = node("src");
        let left = node("left");
        let right = node("right");
        let sink = node("sink");
        let fan_out_l = task("l", vec![src.clone()], vec![left.clone()]);
        let fan_out_r = task("r", vec![src], vec![right.clone()]);
        let join = task("join", vec![left, right], vec![sink]);
        let waves =
            sort_into_waves(&[join.clone(), fan_out_l.clone(), fan_out_r.clone()]).unwrap();
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0], vec![fan_out_l, fan_out_r]);
        assert_eq!(waves[1], vec![join]);
    }

    #[test]
    fn same_config_name_under_different_identities_stays_independent() {
        // Two distinct nodes can share a config name when they belong to
        // different parents; only identity creates an edge.
        let manager = crate::data_manager::DataManager::new();
        let config = DataNodeConfig::new("shared").with_scope(weftcore::Scope::Pipeline);
        let n1 = manager
            .get_or_create(&config, &crate::data_manager::ParentIds::none().with_pipeline("p1"))
            .unwrap();
        let n2 = manager
            .get_or_create(&config, &crate::data_manager::ParentIds::none().with_pipeline("p2"))
            .unwrap();
        let producer = task("producer", vec![], vec![n1]);
        let consumer = task("consumer", vec![n2], vec![]);
        let waves = sort_into_waves(&[producer.clone(), consumer.clone()]).unwrap();
        assert_eq!(waves, vec![vec![producer, consumer]]);
    }

    #[test]
    fn cycle_is_rejected() {
        let a = node("a");
        let b = node("b");
        let t1 = task("t1", vec![a.clone()], vec![b.clone()]);
        let t2 = task("t2", vec![b], vec![a]);
        assert!(matches!(
            sort_into_waves(&[t1.clone(), t2.clone()]),
            Err(PipelineError::CyclicDependency)
        ));
        assert!(!is_acyclic(&[t1, t2]));
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let a = node("a");
        let t = task("t", vec![a.clone()], vec![a]);
        assert!(matches!(
            sort_into_waves(&[t]),
            Err(PipelineError::CyclicDependency)
        ));
    }
}
