//! Dependency graph views over a replayed task map
//!
//! Edges are implicit: `task.deps` lists the ids a task waits on. Nothing
//! here assumes the stored graph is acyclic; every traversal carries a
//! visited set so corrupted data cannot hang a reader.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;

use serde::Serialize;

use crate::task::{by_priority_then_created, Priority, Task, TaskMap, TaskStatus};

/// Open, live, non-backlog tasks whose every known dependency is done.
///
/// A dependency id that does not resolve to a task counts as satisfied.
pub fn ready_tasks(tasks: &TaskMap) -> Vec<&Task> {
    let mut ready: Vec<&Task> = tasks
        .values()
        .filter(|task| {
            !task.deleted && task.status == TaskStatus::Open && task.priority != Priority::Backlog
        })
        .filter(|task| {
            task.deps.iter().all(|dep| {
                tasks
                    .get(dep)
                    .map_or(true, |dep| dep.status == TaskStatus::Done)
            })
        })
        .collect();
    ready.sort_by(|left, right| by_priority_then_created(left, right));
    ready
}

/// Open, live, non-backlog tasks still waiting on an unfinished dependency,
/// each paired with the dependency ids it waits on. Together with
/// `ready_tasks` this partitions the open, non-backlog work.
pub fn blocked_tasks(tasks: &TaskMap) -> Vec<(&Task, Vec<&str>)> {
    let mut blocked: Vec<(&Task, Vec<&str>)> = tasks
        .values()
        .filter(|task| {
            !task.deleted && task.status == TaskStatus::Open && task.priority != Priority::Backlog
        })
        .filter_map(|task| {
            let waiting: Vec<&str> = task
                .deps
                .iter()
                .filter(|dep| {
                    tasks
                        .get(dep.as_str())
                        .is_some_and(|dep| dep.status != TaskStatus::Done)
                })
                .map(String::as_str)
                .collect();
            (!waiting.is_empty()).then_some((task, waiting))
        })
        .collect();
    blocked.sort_by(|(left, _), (right, _)| by_priority_then_created(left, right));
    blocked
}

/// Would recording "`task_id` depends on `dep_id`" close a cycle?
///
/// True for a self-dependency, or when `task_id` is already reachable from
/// `dep_id` through existing edges. Must be asked before the dep-add event
/// is appended.
pub fn would_create_cycle(tasks: &TaskMap, task_id: &str, dep_id: &str) -> bool {
    if task_id == dep_id {
        return true;
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack = vec![dep_id];
    while let Some(current) = stack.pop() {
        if current == task_id {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(task) = tasks.get(current) {
            stack.extend(task.deps.iter().map(String::as_str));
        }
    }
    false
}

const BRANCH: &str = "├─ ";
const LAST_BRANCH: &str = "└─ ";
const PIPE: &str = "│  ";
const SPACE: &str = "   ";

/// Render the active tasks (not done, not deleted) as a forest.
///
/// Roots are active tasks no other active task depends on; each task's
/// active dependencies hang beneath it. Tasks only reachable through a
/// cycle get drawn as extra roots so nothing active is hidden.
pub fn dependency_tree(tasks: &TaskMap) -> String {
    let active: Vec<&Task> = tasks.values().filter(|task| task.is_active()).collect();
    if active.is_empty() {
        return "No active tasks".to_string();
    }

    let depended_on: HashSet<&str> = active
        .iter()
        .flat_map(|task| task.deps.iter())
        .filter(|dep| tasks.get(dep.as_str()).is_some_and(Task::is_active))
        .map(String::as_str)
        .collect();

    let mut roots: Vec<&Task> = active
        .iter()
        .copied()
        .filter(|task| !depended_on.contains(task.id.as_str()))
        .collect();
    roots.sort_by(|left, right| {
        let left_working = left.status == TaskStatus::InProgress;
        let right_working = right.status == TaskStatus::InProgress;
        right_working
            .cmp(&left_working)
            .then_with(|| by_priority_then_created(left, right))
    });

    let mut out = String::new();
    let mut reached: HashSet<&str> = HashSet::new();
    for (index, root) in roots.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        render_subtree(&mut out, tasks, root, &mut reached);
    }

    let mut stranded: Vec<&Task> = active
        .iter()
        .copied()
        .filter(|task| !reached.contains(task.id.as_str()))
        .collect();
    stranded.sort_by(|left, right| by_priority_then_created(left, right));
    for task in stranded {
        if reached.contains(task.id.as_str()) {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        render_subtree(&mut out, tasks, task, &mut reached);
    }

    out
}

/// Pre-order walk from `root` with an explicit stack. `seen` is local to
/// this root so shared dependencies appear under every parent; `reached`
/// accumulates across roots.
fn render_subtree<'a>(
    out: &mut String,
    tasks: &'a TaskMap,
    root: &'a Task,
    reached: &mut HashSet<&'a str>,
) {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<(&Task, String, &str)> = vec![(root, String::new(), "")];

    while let Some((task, prefix, connector)) = stack.pop() {
        if !seen.insert(task.id.as_str()) {
            continue;
        }
        reached.insert(task.id.as_str());
        let _ = writeln!(
            out,
            "{prefix}{connector}{} {}  {}",
            task.status.glyph(),
            task.id,
            task.title
        );

        let mut children: Vec<&Task> = task
            .deps
            .iter()
            .filter_map(|dep| tasks.get(dep))
            .filter(|dep| dep.is_active())
            .collect();
        if children.is_empty() {
            continue;
        }
        children.sort_by(|left, right| by_priority_then_created(left, right));

        let child_prefix = match connector {
            BRANCH => format!("{prefix}{PIPE}"),
            LAST_BRANCH => format!("{prefix}{SPACE}"),
            _ => prefix,
        };
        let last = children.len() - 1;
        for (index, child) in children.into_iter().enumerate().rev() {
            let connector = if index == last { LAST_BRANCH } else { BRANCH };
            stack.push((child, child_prefix.clone(), connector));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    /// The prerequisite
    pub from: String,
    /// The task waiting on it
    pub to: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Nodes and `depends_on` edges for every live task, ordered by id.
///
/// Edges to deleted or unknown ids are left out.
pub fn dependency_graph(tasks: &TaskMap) -> DependencyGraph {
    let live: BTreeSet<&str> = tasks
        .values()
        .filter(|task| !task.deleted)
        .map(|task| task.id.as_str())
        .collect();

    let mut graph = DependencyGraph::default();
    for task in tasks.values().filter(|task| !task.deleted) {
        graph.nodes.push(GraphNode {
            id: task.id.clone(),
            title: task.title.clone(),
            status: task.status,
        });
        for dep in task.deps.iter().filter(|dep| live.contains(dep.as_str())) {
            graph.edges.push(GraphEdge {
                from: dep.clone(),
                to: task.id.clone(),
                kind: "depends_on",
            });
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::fixtures::{map, task};

    fn ids(tasks: Vec<&Task>) -> Vec<&str> {
        tasks.into_iter().map(|task| task.id.as_str()).collect()
    }

    #[test]
    fn ready_requires_done_dependencies() {
        let mut tasks = map(vec![
            task("a", TaskStatus::Open, &[], 0),
            task("b", TaskStatus::Open, &["a"], 1),
        ]);
        assert_eq!(ids(ready_tasks(&tasks)), vec!["a"]);

        tasks.get_mut("a").unwrap().status = TaskStatus::Done;
        assert_eq!(ids(ready_tasks(&tasks)), vec!["b"]);
    }

    #[test]
    fn ready_skips_backlog_deleted_and_claimed() {
        let mut backlog = task("backlog", TaskStatus::Open, &[], 0);
        backlog.priority = Priority::Backlog;
        let mut deleted = task("deleted", TaskStatus::Open, &[], 1);
        deleted.deleted = true;
        let tasks = map(vec![
            backlog,
            deleted,
            task("claimed", TaskStatus::InProgress, &[], 2),
            task("free", TaskStatus::Open, &[], 3),
        ]);

        assert_eq!(ids(ready_tasks(&tasks)), vec!["free"]);
    }

    #[test]
    fn dangling_dependency_is_satisfied() {
        let tasks = map(vec![task("a", TaskStatus::Open, &["gone"], 0)]);
        assert_eq!(ids(ready_tasks(&tasks)), vec!["a"]);
    }

    #[test]
    fn ready_sorts_by_priority_then_age() {
        let mut urgent = task("urgent", TaskStatus::Open, &[], 5);
        urgent.priority = Priority::Critical;
        let tasks = map(vec![
            task("newer", TaskStatus::Open, &[], 2),
            task("older", TaskStatus::Open, &[], 1),
            urgent,
        ]);

        assert_eq!(ids(ready_tasks(&tasks)), vec!["urgent", "older", "newer"]);
    }

    #[test]
    fn blocked_lists_unfinished_dependencies() {
        let mut parked = task("p", TaskStatus::Open, &["a"], 4);
        parked.priority = Priority::Backlog;
        let tasks = map(vec![
            task("a", TaskStatus::Open, &[], 0),
            task("b", TaskStatus::Done, &[], 1),
            task("c", TaskStatus::Open, &["a", "b", "gone"], 2),
            task("d", TaskStatus::Open, &["b"], 3),
            parked,
            task("w", TaskStatus::InProgress, &["a"], 5),
        ]);

        let blocked = blocked_tasks(&tasks);
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].0.id, "c");
        assert_eq!(blocked[0].1, vec!["a"]);
        assert_eq!(ids(ready_tasks(&tasks)), vec!["a", "d"]);
    }

    #[test]
    fn cycle_guard_detects_direct_and_transitive() {
        let tasks = map(vec![
            task("a", TaskStatus::Open, &["b"], 0),
            task("b", TaskStatus::Open, &["c"], 1),
            task("c", TaskStatus::Open, &[], 2),
            task("x", TaskStatus::Open, &[], 3),
        ]);

        assert!(would_create_cycle(&tasks, "b", "a"));
        assert!(would_create_cycle(&tasks, "c", "a"));
        assert!(would_create_cycle(&tasks, "x", "x"));
        assert!(!would_create_cycle(&tasks, "x", "a"));
        assert!(!would_create_cycle(&tasks, "a", "c"));
    }

    #[test]
    fn cycle_guard_terminates_on_existing_cycle() {
        let tasks = map(vec![
            task("a", TaskStatus::Open, &["b"], 0),
            task("b", TaskStatus::Open, &["a"], 1),
            task("x", TaskStatus::Open, &[], 2),
        ]);
        assert!(!would_create_cycle(&tasks, "x", "a"));
    }

    #[test]
    fn tree_nests_dependencies_under_goal() {
        let mut working = task("tl-c", TaskStatus::InProgress, &[], 2);
        working.title = "Child two".to_string();
        let mut first = task("tl-b", TaskStatus::Open, &[], 1);
        first.title = "Child one".to_string();
        let mut leaf = task("tl-d", TaskStatus::Open, &[], 3);
        leaf.title = "Leaf".to_string();
        first.deps = vec!["tl-d".to_string()];
        let mut goal = task("tl-a", TaskStatus::Open, &["tl-b", "tl-c"], 0);
        goal.title = "Goal".to_string();

        let tree = dependency_tree(&map(vec![goal, first, working, leaf]));
        let expected = "\
○ tl-a  Goal
├─ ○ tl-b  Child one
│  └─ ○ tl-d  Leaf
└─ ◐ tl-c  Child two
";
        assert_eq!(tree, expected);
    }

    #[test]
    fn tree_orders_roots_and_hides_inactive() {
        let mut done = task("done", TaskStatus::Done, &[], 0);
        done.title = "Done".to_string();
        let mut gone = task("gone", TaskStatus::Open, &[], 0);
        gone.deleted = true;
        let tasks = map(vec![
            done,
            gone,
            task("open", TaskStatus::Open, &["done"], 1),
            task("busy", TaskStatus::InProgress, &[], 2),
        ]);

        let tree = dependency_tree(&tasks);
        assert_eq!(tree, "◐ busy  Task busy\n\n○ open  Task open\n");
    }

    #[test]
    fn tree_survives_cycles() {
        let tasks = map(vec![
            task("a", TaskStatus::Open, &["b"], 0),
            task("b", TaskStatus::Open, &["a"], 1),
            task("root", TaskStatus::Open, &["c"], 2),
            task("c", TaskStatus::Open, &["root"], 3),
            task("top", TaskStatus::Open, &["c"], 4),
        ]);

        let tree = dependency_tree(&tasks);
        for id in ["a", "b", "c", "root", "top"] {
            assert!(tree.contains(&format!(" {id}  ")), "missing {id}:\n{tree}");
        }
        assert!(tree.starts_with("○ top  Task top\n"));
    }

    #[test]
    fn empty_tree_message() {
        let tasks = map(vec![task("a", TaskStatus::Done, &[], 0)]);
        assert_eq!(dependency_tree(&tasks), "No active tasks");
    }

    #[test]
    fn graph_lists_live_nodes_and_edges() {
        let mut deleted = task("z", TaskStatus::Open, &[], 9);
        deleted.deleted = true;
        let tasks = map(vec![
            task("a", TaskStatus::Done, &[], 0),
            task("b", TaskStatus::Open, &["a", "z", "missing"], 1),
            deleted,
        ]);

        let graph = dependency_graph(&tasks);
        let node_ids: Vec<_> = graph.nodes.iter().map(|node| node.id.as_str()).collect();
        assert_eq!(node_ids, vec!["a", "b"]);
        assert_eq!(
            graph.edges,
            vec![GraphEdge {
                from: "a".to_string(),
                to: "b".to_string(),
                kind: "depends_on",
            }]
        );

        let value = serde_json::to_value(&graph).unwrap();
        assert_eq!(value["edges"][0]["type"], "depends_on");
    }
}
