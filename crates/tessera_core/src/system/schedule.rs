//! # Work Order Scheduling
//!
//! Turns the dependency matrix and system priorities into the flat order in
//! which systems run each frame.
//!
//! ## Algorithm
//!
//! 1. Partition systems into groups connected by dependency edges in either
//!    direction (stack flood fill, seeds taken from the highest index down).
//! 2. A group's priority is the maximum priority of its members.
//! 3. Groups run by descending priority; ties keep discovery order.
//! 4. Inside a group, a depth-first search from each member visits the
//!    systems that must run after it and records a postorder; the reversed
//!    postorder puts every system after the systems it depends on.
//! 5. The groups are concatenated into the work order.
//!
//! Cycles do not stop the search. [`find_cycle`] reports one when the
//! caller cares.

use std::cmp::Reverse;

use super::dependency::DependencyMatrix;
use super::interface::{SystemPriority, SystemTypeId};

/// Systems connected by dependency edges, in run order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemGroup {
    /// Highest priority among the members.
    pub priority: SystemPriority,
    /// Members in topological order.
    pub members: Vec<SystemTypeId>,
}

/// Result of a scheduling pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Groups in run order.
    pub groups: Vec<SystemGroup>,
    /// Flat work order, the concatenation of the groups.
    pub order: Vec<SystemTypeId>,
}

/// Computes the work order for `matrix`.
///
/// # Arguments
///
/// * `matrix` - Dependency edges between systems
/// * `priorities` - Priority of each system, indexed like the matrix
///
/// # Panics
///
/// Panics if `priorities` does not have one entry per system.
#[must_use]
pub fn compute_schedule(matrix: &DependencyMatrix, priorities: &[SystemPriority]) -> Schedule {
    assert_eq!(
        matrix.len(),
        priorities.len(),
        "one priority per system required"
    );

    let mut visited = vec![false; matrix.len()];
    let mut groups: Vec<SystemGroup> = partition(matrix)
        .into_iter()
        .map(|members| {
            let priority = members
                .iter()
                .map(|&m| priorities[m])
                .fold(SystemPriority::LOWEST, Ord::max);

            let mut postorder = Vec::with_capacity(members.len());
            for &root in &members {
                if !visited[root] {
                    visit(matrix, root, &mut visited, &mut postorder);
                }
            }
            postorder.reverse();

            SystemGroup {
                priority,
                members: postorder.into_iter().map(to_id).collect(),
            }
        })
        .collect();

    // Stable: equal priorities keep discovery order
    groups.sort_by_key(|g| Reverse(g.priority));

    let order = groups.iter().flat_map(|g| g.members.iter().copied()).collect();
    Schedule { groups, order }
}

/// Finds a dependency cycle, if any.
///
/// # Returns
///
/// The systems on the cycle, starting and ending with the same system, in
/// run-after direction (each system must run after the previous one).
#[must_use]
pub fn find_cycle(matrix: &DependencyMatrix) -> Option<Vec<SystemTypeId>> {
    let mut visited = vec![false; matrix.len()];
    let mut on_stack = vec![false; matrix.len()];
    let mut path = Vec::new();

    for start in 0..matrix.len() {
        if !visited[start] {
            if let Some(cycle) = search_cycle(matrix, start, &mut visited, &mut on_stack, &mut path) {
                return Some(cycle.into_iter().map(to_id).collect());
            }
        }
    }
    None
}

/// Splits systems into weakly connected groups, in discovery order.
///
/// Members are listed seed first, then in the order they leave the stack.
fn partition(matrix: &DependencyMatrix) -> Vec<Vec<usize>> {
    let count = matrix.len();
    let mut assigned = vec![false; count];
    let mut groups = Vec::new();

    for seed in (0..count).rev() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;

        let mut group = Vec::new();
        let mut stack = vec![seed];
        while let Some(vertex) = stack.pop() {
            for i in 0..count {
                if !assigned[i] && matrix.linked(i, vertex) {
                    assigned[i] = true;
                    stack.push(i);
                }
            }
            group.push(vertex);
        }
        groups.push(group);
    }

    groups
}

/// Depth-first visit of the systems that run after `vertex`.
fn visit(matrix: &DependencyMatrix, vertex: usize, visited: &mut [bool], postorder: &mut Vec<usize>) {
    visited[vertex] = true;
    for dependent in 0..matrix.len() {
        if matrix.get(dependent, vertex) && !visited[dependent] {
            visit(matrix, dependent, visited, postorder);
        }
    }
    postorder.push(vertex);
}

fn search_cycle(
    matrix: &DependencyMatrix,
    vertex: usize,
    visited: &mut [bool],
    on_stack: &mut [bool],
    path: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    visited[vertex] = true;
    on_stack[vertex] = true;
    path.push(vertex);

    for dependent in 0..matrix.len() {
        if !matrix.get(dependent, vertex) {
            continue;
        }
        if on_stack[dependent] {
            let start = path.iter().position(|&v| v == dependent).unwrap_or(0);
            let mut cycle = path[start..].to_vec();
            cycle.push(dependent);
            return Some(cycle);
        }
        if !visited[dependent] {
            if let Some(cycle) = search_cycle(matrix, dependent, visited, on_stack, path) {
                return Some(cycle);
            }
        }
    }

    on_stack[vertex] = false;
    path.pop();
    None
}

fn to_id(index: usize) -> SystemTypeId {
    SystemTypeId::new(index as u32)
}
