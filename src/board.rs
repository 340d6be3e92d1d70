//! Board grouping.
//!
//! Partitions a project's tasks into the five status columns of the kanban
//! board. Grouping is a pure function of its input: every status has a
//! column (possibly empty), each task lands in exactly the column matching
//! its status, and tasks keep their relative input order within a column.

use crate::fields::Status;
use crate::task::TaskSummary;

/// Tasks partitioned by status, one column per [`Status`] in board order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    columns: [Vec<TaskSummary>; 5],
}

/// Per-status task counts, as shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    counts: [usize; 5],
}

impl StatusCounts {
    pub fn get(&self, status: Status) -> usize {
        self.counts[status.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Group tasks into status columns, preserving input order within each column.
pub fn group_by_status(tasks: &[TaskSummary]) -> Board {
    let mut board = Board::default();
    for task in tasks {
        board.columns[task.status.index()].push(task.clone());
    }
    board
}

impl Board {
    /// The column for one status.
    pub fn bucket(&self, status: Status) -> &[TaskSummary] {
        &self.columns[status.index()]
    }

    /// Columns in board order.
    pub fn iter(&self) -> impl Iterator<Item = (Status, &[TaskSummary])> + '_ {
        Status::ALL.iter().map(move |s| (*s, self.bucket(*s)))
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for (i, column) in self.columns.iter().enumerate() {
            counts.counts[i] = column.len();
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.columns.iter().map(|c| c.len()).sum()
    }

    /// Find which column holds a task, and its position there.
    pub fn locate(&self, task_id: &str) -> Option<(Status, usize)> {
        self.iter().find_map(|(status, column)| {
            column.iter().position(|t| t.id == task_id).map(|pos| (status, pos))
        })
    }

    /// Narrow every column to tasks whose name or description contains
    /// `text` (case-insensitive). An empty filter keeps everything.
    pub fn filter(&self, text: &str) -> Board {
        if text.is_empty() {
            return self.clone();
        }
        let needle = text.to_lowercase();
        let mut board = Board::default();
        for (i, column) in self.columns.iter().enumerate() {
            board.columns[i] = column
                .iter()
                .filter(|t| {
                    t.name.to_lowercase().contains(&needle)
                        || t.description.to_lowercase().contains(&needle)
                })
                .cloned()
                .collect();
        }
        board
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn task(id: &str, status: Status) -> TaskSummary {
        TaskSummary {
            id: id.to_string(),
            name: format!("Task {id}"),
            description: String::new(),
            status,
        }
    }

    #[test]
    fn test_empty_input_has_every_column() {
        let board = group_by_status(&[]);
        assert_eq!(board.iter().count(), 5);
        for (_, column) in board.iter() {
            assert!(column.is_empty());
        }
        assert_eq!(board.total(), 0);
    }

    #[test]
    fn test_groups_preserve_order() {
        let tasks = vec![
            task("a", Status::Pending),
            task("b", Status::Completed),
            task("c", Status::Pending),
            task("d", Status::OnHold),
        ];
        let board = group_by_status(&tasks);
        let pending: Vec<&str> = board.bucket(Status::Pending).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(pending, vec!["a", "c"]);
        assert_eq!(board.bucket(Status::Completed).len(), 1);
        assert_eq!(board.bucket(Status::InProgress).len(), 0);
        assert_eq!(board.locate("c"), Some((Status::Pending, 1)));
        assert_eq!(board.locate("zzz"), None);
    }

    #[test]
    fn test_counts_report_each_status_under_its_own_label() {
        let tasks = vec![
            task("a", Status::Pending),
            task("b", Status::Pending),
            task("c", Status::InProgress),
        ];
        let counts = group_by_status(&tasks).counts();
        assert_eq!(counts.get(Status::Pending), 2);
        assert_eq!(counts.get(Status::InProgress), 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_filter_matches_name_and_description() {
        let mut described = task("b", Status::Completed);
        described.description = "Ship the LOGIN flow".into();
        let board = group_by_status(&[task("a", Status::Pending), described]);
        let filtered = board.filter("login");
        assert_eq!(filtered.total(), 1);
        assert_eq!(filtered.bucket(Status::Completed)[0].id, "b");
        assert_eq!(board.filter(""), board);
    }

    fn arb_status() -> impl Strategy<Value = Status> {
        prop::sample::select(Status::ALL.to_vec())
    }

    fn arb_tasks() -> impl Strategy<Value = Vec<TaskSummary>> {
        prop::collection::vec(arb_status(), 0..40).prop_map(|statuses| {
            statuses
                .into_iter()
                .enumerate()
                .map(|(i, s)| task(&format!("t{i}"), s))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_grouping_loses_and_duplicates_nothing(tasks in arb_tasks()) {
            let board = group_by_status(&tasks);
            prop_assert_eq!(board.total(), tasks.len());
            for t in &tasks {
                let hits = board.iter().filter(|(_, col)| col.iter().any(|c| c.id == t.id)).count();
                prop_assert_eq!(hits, 1);
                prop_assert!(board.bucket(t.status).iter().any(|c| c.id == t.id));
            }
        }

        #[test]
        fn prop_grouping_preserves_relative_order(tasks in arb_tasks()) {
            let board = group_by_status(&tasks);
            for status in Status::ALL {
                let expected: Vec<&TaskSummary> = tasks.iter().filter(|t| t.status == status).collect();
                let actual: Vec<&TaskSummary> = board.bucket(status).iter().collect();
                prop_assert_eq!(actual, expected);
            }
        }

        #[test]
        fn prop_grouping_is_idempotent(tasks in arb_tasks()) {
            prop_assert_eq!(group_by_status(&tasks), group_by_status(&tasks));
        }
    }
}
