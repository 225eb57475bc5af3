// src/engine/tasks.rs
//
// Row-range tasks and the partitioning that produces them.
//
// The output buffer has no internal synchronization: workers write to it in
// parallel only because the ranges produced here never overlap. Every
// partitioner in this file must cover [0, height) exactly once.

use crate::error::{GrayPoolError, Result};
use std::ops::Range;

/// Half-open span of image rows `[row_start, row_end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Task {
    pub row_start: usize,
    pub row_end: usize,
}

impl Task {
    pub fn new(row_start: usize, row_end: usize) -> Self {
        Self { row_start, row_end }
    }

    pub fn rows(&self) -> Range<usize> {
        self.row_start..self.row_end
    }

    pub fn row_count(&self) -> usize {
        self.row_end.saturating_sub(self.row_start)
    }

    /// Reject empty, inverted, or out-of-range tasks. A failure here is an
    /// internal defect of the partitioner, never a user error.
    pub fn validate(&self, height: usize) -> Result<()> {
        if self.row_start >= self.row_end || self.row_end > height {
            return Err(GrayPoolError::invalid_task(
                self.row_start,
                self.row_end,
                height,
            ));
        }
        Ok(())
    }
}

/// Split `height` rows into at most `workers` tasks of `ceil(height / workers)`
/// rows each. Slots whose start would fall past the last row produce no task,
/// so `height = 3, workers = 8` yields three one-row tasks.
pub fn partition_rows(height: usize, workers: usize) -> Vec<Task> {
    if height == 0 || workers == 0 {
        return Vec::new();
    }
    let block = height.div_ceil(workers);
    (0..workers)
        .map(|k| k * block)
        .take_while(|&start| start < height)
        .map(|start| Task::new(start, (start + block).min(height)))
        .collect()
}

/// Split `height` rows into consecutive tasks of `rows_per_task` rows; the
/// last task takes the remainder.
pub fn split_rows(height: usize, rows_per_task: usize) -> Vec<Task> {
    if height == 0 || rows_per_task == 0 {
        return Vec::new();
    }
    (0..height)
        .step_by(rows_per_task)
        .map(|start| Task::new(start, (start + rows_per_task).min(height)))
        .collect()
}

/// Check that `tasks` are ordered, non-empty, and tile `[0, height)` with no
/// gap and no overlap.
pub fn verify_partition(tasks: &[Task], height: usize) -> Result<()> {
    let mut next = 0;
    for task in tasks {
        task.validate(height)?;
        if task.row_start != next {
            return Err(GrayPoolError::invalid_task(
                task.row_start,
                task.row_end,
                height,
            ));
        }
        next = task.row_end;
    }
    if next != height {
        return Err(GrayPoolError::internal(format!(
            "partition covers rows [0, {next}) of {height}"
        )));
    }
    Ok(())
}
