// src/engine/dispatch.rs
//
// Frame dispatcher: partitions the input into row-range tasks, hands each
// task its own slice of the output buffer, and runs them on a WorkerPool.
//
// The output is carved with `split_at_mut` in task order, so every job owns a
// disjoint `&mut [u8]` and workers write without any locking.

use crate::engine::config::EngineConfig;
use crate::engine::frame::Frame;
use crate::engine::pipeline::apply_block;
use crate::engine::pool::{PoolStats, WorkerPool};
use crate::engine::tasks::{partition_rows, split_rows, verify_partition, Task};
use crate::error::{GrayPoolError, Result};
use crate::ops::TransformRequest;
use std::time::Duration;
use tracing::{debug, info};

/// One queued unit of work: a task plus the rows it reads and writes.
#[derive(Debug)]
pub struct RowJob<'a> {
    pub task: Task,
    pub input: &'a [u8],
    pub output: &'a mut [u8],
}

/// Summary of a finished dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchReport {
    pub tasks: Vec<Task>,
    pub pool: PoolStats,
}

impl DispatchReport {
    pub fn elapsed(&self) -> Duration {
        self.pool.elapsed
    }
}

/// Plan the row ranges for a frame of `height` rows.
pub fn plan_tasks(height: usize, config: &EngineConfig) -> Result<Vec<Task>> {
    let tasks = match config.rows_per_task {
        Some(rows) => split_rows(height, rows),
        None => partition_rows(height, config.threads),
    };
    verify_partition(&tasks, height)?;
    Ok(tasks)
}

/// Pair each task with its input rows and a disjoint slice of `output`.
///
/// `tasks` must tile the frame in order (see [`verify_partition`]).
pub fn carve_jobs<'a>(
    tasks: &[Task],
    input: &'a Frame,
    output: &'a mut [u8],
) -> Result<Vec<RowJob<'a>>> {
    if output.len() != input.len() {
        return Err(GrayPoolError::buffer_size_mismatch(input.len(), output.len()));
    }
    let width = input.width();
    let mut rest = output;
    let mut jobs = Vec::with_capacity(tasks.len());
    for task in tasks {
        task.validate(input.height())?;
        let (block, tail) = std::mem::take(&mut rest).split_at_mut(task.row_count() * width);
        rest = tail;
        jobs.push(RowJob {
            task: *task,
            input: input.rows(task.rows()),
            output: block,
        });
    }
    if !rest.is_empty() {
        return Err(GrayPoolError::internal(format!(
            "{} output bytes not assigned to any task",
            rest.len()
        )));
    }
    Ok(jobs)
}

/// Transform `input` on a worker pool configured by `config`.
pub fn dispatch(
    input: &Frame,
    request: &TransformRequest,
    config: &EngineConfig,
) -> Result<(Frame, DispatchReport)> {
    request.validate()?;
    let pool = WorkerPool::from_config(config)?;
    let tasks = plan_tasks(input.height(), config)?;
    let mut output = input.blank_like()?;

    info!(
        width = input.width(),
        height = input.height(),
        mode = %request.mode,
        tasks = tasks.len(),
        "dispatching transform"
    );

    let jobs = carve_jobs(&tasks, input, output.as_bytes_mut())?;
    let pool_stats = pool.execute(jobs, |worker, job| {
        debug!(
            worker,
            row_start = job.task.row_start,
            row_end = job.task.row_end,
            "processing rows"
        );
        apply_block(request, job.input, job.output);
    })?;

    Ok((
        output,
        DispatchReport {
            tasks,
            pool: pool_stats,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::pipeline::apply_serial;

    #[test]
    fn test_end_to_end_two_by_two_negative() {
        let input = Frame::new(2, 2, 255, vec![10, 20, 230, 255]).unwrap();
        let config = EngineConfig::default().with_threads(2);
        let (output, report) = dispatch(&input, &TransformRequest::negative(), &config).unwrap();
        assert_eq!(output.as_bytes(), &[245, 235, 25, 0]);
        assert_eq!(output.max_value(), 255);
        assert_eq!(report.tasks.len(), 2);
        assert_eq!(report.pool.processed(), 2);
    }

    #[test]
    fn test_degenerate_partition_completes() {
        let input = Frame::from_fn(5, 3, 255, |x, y| (x + y * 5) as u8).unwrap();
        let config = EngineConfig::default().with_threads(8);
        let (output, report) = dispatch(&input, &TransformRequest::negative(), &config).unwrap();
        assert_eq!(report.tasks.len(), 3);
        assert_eq!(report.pool.threads, 8);
        let expected = apply_serial(&TransformRequest::negative(), &input).unwrap();
        assert_eq!(output, expected);
    }

    #[test]
    fn test_rows_per_task_with_small_queue() {
        let input = Frame::from_fn(7, 50, 255, |x, y| ((x * 31 + y * 7) % 256) as u8).unwrap();
        let config = EngineConfig::default()
            .with_threads(3)
            .with_queue_capacity(1)
            .with_rows_per_task(Some(2));
        let request = TransformRequest::slice(40, 180);
        let (output, report) = dispatch(&input, &request, &config).unwrap();
        assert_eq!(report.tasks.len(), 25);
        assert_eq!(output, apply_serial(&request, &input).unwrap());
    }

    #[test]
    fn test_dispatch_rejects_invalid_slice_window() {
        let input = Frame::new(1, 1, 255, vec![1]).unwrap();
        let err = dispatch(
            &input,
            &TransformRequest::slice(9, 3),
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.phase(), crate::error::Phase::Config);
    }

    #[test]
    fn test_carve_jobs_slices_are_disjoint_and_complete() {
        let input = Frame::from_fn(4, 10, 255, |_, y| y as u8).unwrap();
        let tasks = partition_rows(10, 3);
        let mut out = vec![0u8; input.len()];
        let jobs = carve_jobs(&tasks, &input, &mut out).unwrap();
        let total: usize = jobs.iter().map(|j| j.output.len()).sum();
        assert_eq!(total, input.len());
        for job in &jobs {
            assert_eq!(job.input.len(), job.task.row_count() * 4);
            assert_eq!(job.input[0] as usize, job.task.row_start);
        }
    }

    #[test]
    fn test_carve_jobs_rejects_size_mismatch() {
        let input = Frame::new(2, 2, 255, vec![0; 4]).unwrap();
        let mut out = vec![0u8; 3];
        assert!(carve_jobs(&[Task::new(0, 2)], &input, &mut out).is_err());
    }
}
