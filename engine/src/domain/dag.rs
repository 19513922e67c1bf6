//! DAG construction, cycle detection, leveling and critical-path analysis
//! over a task set.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::task::Task;

/// A directed edge `from` (a dependency) `to` (the dependent task).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagEdge {
    pub from: String,
    pub to: String,
}

/// Directed acyclic multigraph over a task set, with a stable topological
/// stratification into levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dag {
    pub nodes: Vec<Task>,
    pub edges: Vec<DagEdge>,
    pub levels: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DagStatistics {
    pub total_tasks: usize,
    pub total_edges: usize,
    pub levels: usize,
    pub max_parallelism: usize,
    pub has_cycles: bool,
    pub critical_path_duration: u32,
}

/// Build a DAG from a task set. Edges are derived purely from
/// `task.dependencies`; levels are computed by repeated Kahn-style
/// peeling of zero-unresolved-in-degree nodes, which yields each task's
/// longest dependency-chain depth from any root.
///
/// If the task set contains a cycle, `levels` covers only the acyclic
/// prefix; callers should check `detect_cycles` first.
pub fn build_dag(tasks: Vec<Task>) -> Dag {
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut edges = Vec::new();
    for task in &tasks {
        for dep in &task.dependencies {
            if by_id.contains_key(dep.as_str()) {
                edges.push(DagEdge {
                    from: dep.clone(),
                    to: task.id.clone(),
                });
            }
        }
    }

    let levels = compute_levels(&tasks);

    Dag {
        nodes: tasks,
        edges,
        levels,
    }
}

/// Stratify `tasks` into levels via Kahn's algorithm: each round peels
/// every node whose unresolved in-degree (restricted to dependencies
/// present in this task set) is zero.
fn compute_levels(tasks: &[Task]) -> Vec<Vec<String>> {
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for task in tasks {
        let deps_in_set = task.dependencies.iter().filter(|d| by_id.contains_key(d.as_str())).count();
        in_degree.insert(&task.id, deps_in_set);
        for dep in &task.dependencies {
            if by_id.contains_key(dep.as_str()) {
                dependents.entry(dep.as_str()).or_default().push(&task.id);
            }
        }
    }

    let mut remaining = in_degree.clone();
    let mut levels: Vec<Vec<String>> = Vec::new();
    let mut frontier: Vec<&str> = remaining.iter().filter(|(_, d)| **d == 0).map(|(id, _)| *id).collect();

    let mut placed: HashSet<&str> = HashSet::new();
    while !frontier.is_empty() {
        let mut level_ids: Vec<&str> = frontier.drain(..).collect();
        level_ids.sort_by(|a, b| tie_break(by_id[a], by_id[b]));
        for id in &level_ids {
            placed.insert(id);
        }

        let mut next_frontier = Vec::new();
        for id in &level_ids {
            if let Some(deps) = dependents.get(id) {
                for dependent in deps {
                    if let Some(d) = remaining.get_mut(dependent) {
                        *d -= 1;
                        if *d == 0 && !placed.contains(dependent) {
                            next_frontier.push(*dependent);
                        }
                    }
                }
            }
        }

        levels.push(level_ids.into_iter().map(|s| s.to_string()).collect());
        frontier = next_frontier;
    }

    levels
}

/// Tie-break order within a level: priority ascending, severity (critical
/// first), then lexicographic task id.
fn tie_break(a: &Task, b: &Task) -> std::cmp::Ordering {
    a.priority
        .cmp(&b.priority)
        .then(a.severity.cmp(&b.severity))
        .then(a.id.cmp(&b.id))
}

/// Depth-first three-color cycle detection over `task.dependencies`.
pub fn detect_cycles(tasks: &[Task]) -> bool {
    find_cycle_path(tasks).is_some()
}

/// Returns the ids forming a cycle, if one exists.
pub fn find_cycle_path(tasks: &[Task]) -> Option<Vec<String>> {
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut rec_stack: HashSet<&str> = HashSet::new();
    let mut path: Vec<String> = Vec::new();

    for id in by_id.keys() {
        if !visited.contains(id) && dfs_has_cycle(id, &by_id, &mut visited, &mut rec_stack, &mut path) {
            return Some(path);
        }
    }
    None
}

fn dfs_has_cycle<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, &'a Task>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<String>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node.to_string());

    if let Some(task) = graph.get(node) {
        for dep in &task.dependencies {
            let dep = dep.as_str();
            if !graph.contains_key(dep) {
                continue;
            }
            if !visited.contains(dep) {
                if dfs_has_cycle(dep, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(dep) {
                path.push(dep.to_string());
                return true;
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    false
}

/// Longest-duration path through the DAG, computed by dynamic programming
/// over a topological order derived from `dag.levels`.
pub fn calculate_critical_path(dag: &Dag) -> u32 {
    let by_id: HashMap<&str, &Task> = dag.nodes.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut best: HashMap<&str, u32> = HashMap::new();

    for level in &dag.levels {
        for id in level {
            let task = by_id[id.as_str()];
            let own = task.estimated_duration_minutes;
            let from_deps = task
                .dependencies
                .iter()
                .filter_map(|d| best.get(d.as_str()))
                .max()
                .copied()
                .unwrap_or(0);
            best.insert(id.as_str(), own + from_deps);
        }
    }

    best.values().max().copied().unwrap_or(0)
}

pub fn get_statistics(dag: &Dag) -> DagStatistics {
    let has_cycles = detect_cycles(&dag.nodes);
    DagStatistics {
        total_tasks: dag.nodes.len(),
        total_edges: dag.edges.len(),
        levels: dag.levels.len(),
        max_parallelism: dag.levels.iter().map(|l| l.len()).max().unwrap_or(0),
        has_cycles,
        critical_path_duration: if has_cycles { 0 } else { calculate_critical_path(dag) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentKind;

    fn task_with_deps(id: &str, deps: &[&str]) -> Task {
        let mut t = Task::new(id, "feature", AgentKind::CodeGen);
        t.id = id.to_string();
        t.dependencies = deps.iter().map(|s| s.to_string()).collect();
        t
    }

    #[test]
    fn levels_cover_all_nodes_exactly_once() {
        let tasks = vec![
            task_with_deps("a", &[]),
            task_with_deps("b", &["a"]),
            task_with_deps("c", &["a", "b"]),
        ];
        let dag = build_dag(tasks);
        let all: HashSet<&str> = dag.levels.iter().flatten().map(|s| s.as_str()).collect();
        assert_eq!(all.len(), 3);
        assert_eq!(dag.levels[0], vec!["a".to_string()]);
        assert_eq!(dag.levels[1], vec!["b".to_string()]);
        assert_eq!(dag.levels[2], vec!["c".to_string()]);
    }

    #[test]
    fn detects_simple_cycle() {
        let tasks = vec![task_with_deps("a", &["b"]), task_with_deps("b", &["a"])];
        assert!(detect_cycles(&tasks));
        assert!(find_cycle_path(&tasks).is_some());
    }

    #[test]
    fn detects_self_cycle() {
        let tasks = vec![task_with_deps("a", &["a"])];
        assert!(detect_cycles(&tasks));
    }

    #[test]
    fn acyclic_graph_has_no_cycle() {
        let tasks = vec![task_with_deps("a", &[]), task_with_deps("b", &["a"])];
        assert!(!detect_cycles(&tasks));
    }

    #[test]
    fn critical_path_sums_longest_duration_chain() {
        let mut a = task_with_deps("a", &[]);
        a.estimated_duration_minutes = 10;
        let mut b = task_with_deps("b", &["a"]);
        b.estimated_duration_minutes = 20;
        let dag = build_dag(vec![a, b]);
        assert_eq!(calculate_critical_path(&dag), 30);
    }

    #[test]
    fn statistics_max_parallelism_is_widest_level() {
        let tasks = vec![
            task_with_deps("a", &[]),
            task_with_deps("b", &[]),
            task_with_deps("c", &["a", "b"]),
        ];
        let dag = build_dag(tasks);
        let stats = get_statistics(&dag);
        assert_eq!(stats.max_parallelism, 2);
        assert!(!stats.has_cycles);
    }
}
