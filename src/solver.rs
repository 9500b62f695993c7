//! Task orchestration: stock selection waves, work-unit fan-out over the
//! worker pool, and the shared best-solutions list.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::config::{CalculationRequest, Configuration, EngineConfig};
use crate::error::{RequestError, ScheduleError};
use crate::permutation;
use crate::pool::compute_solutions;
use crate::scheduler::{Job, WaveLatch, WorkerPool};
use crate::solution::{Solution, rank};
use crate::stock::{PickCriteria, StockPanelPicker};
use crate::tasks::{RunningTask, TaskRegistry, TaskTicket};
use crate::types::{StockSolution, TileDimensions, expand_specs};

/// Stock combinations computed together in one wave.
pub const MAX_WAVE_CANDIDATES: usize = 10;

/// A further candidate joins the wave while the previous candidate's area
/// is at least this fraction of its own.
pub const WAVE_AREA_RATIO: f64 = 0.8;

/// Size of the shared best-solutions list.
pub const BEST_SOLUTIONS_RETAINED: usize = 100;

/// Most panels a wave must start with when more panels are being explored.
pub const MAX_START_WITH: usize = 4;

/// Entry point of the engine. Owns the worker pool and the task registry.
pub struct CutListOptimizer {
    pool: Arc<WorkerPool>,
    registry: Arc<TaskRegistry>,
    config: EngineConfig,
    next_task_id: AtomicU64,
}

impl CutListOptimizer {
    pub fn new(config: EngineConfig) -> Self {
        let pool = WorkerPool::new(config.worker_threads, config.queue_capacity);
        tracing::info!(
            threads = pool.threads(),
            queue = config.queue_capacity,
            "cut list optimizer ready"
        );
        Self {
            pool: Arc::new(pool),
            registry: Arc::new(TaskRegistry::new()),
            config,
            next_task_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs `request` to completion on the calling thread.
    pub fn compute(&self, request: CalculationRequest) -> Result<Solution, RequestError> {
        let run = self.prepare(request)?;
        let _deregister = Deregister::new(&run.registry, &run.ticket);
        Ok(run.execute())
    }

    /// Registers `request` and runs it on a dedicated thread.
    pub fn submit(&self, request: CalculationRequest) -> Result<TaskHandle, RequestError> {
        let run = self.prepare(request)?;
        let task_id = run.ticket.task_id().to_string();
        let handle = thread::spawn(move || {
            let _deregister = Deregister::new(&run.registry, &run.ticket);
            run.execute()
        });
        Ok(TaskHandle { task_id, handle })
    }

    pub fn task_status(&self, task_id: &str) -> Option<RunningTask> {
        self.registry.get(task_id)
    }

    /// Asks a task to stop. Returns whether it was still running.
    pub fn stop_task(&self, task_id: &str) -> bool {
        let stopped = self.registry.remove(task_id);
        if stopped {
            tracing::info!(task_id, "task stop requested");
        }
        stopped
    }

    fn prepare(&self, request: CalculationRequest) -> Result<TaskRun, RequestError> {
        request.validate()?;

        let task_id = request.task_id.clone().unwrap_or_else(|| {
            format!("task-{}", self.next_task_id.fetch_add(1, Ordering::Relaxed))
        });
        let Some(ticket) = self.registry.register(RunningTask::new(task_id.clone())) else {
            return Err(RequestError::TaskAlreadyRunning(task_id));
        };

        let pieces = expand_specs(&request.pieces);
        let stock = expand_specs(&request.stock);
        tracing::info!(
            task_id = %task_id,
            pieces = pieces.len(),
            stock = stock.len(),
            "task accepted"
        );

        Ok(TaskRun {
            task_id,
            ticket,
            pieces,
            picker: StockPanelPicker::new(stock),
            cfg: Arc::new(request.configuration),
            engine: self.config.clone(),
            pool: Arc::clone(&self.pool),
            registry: Arc::clone(&self.registry),
            best: Arc::new(Mutex::new(Vec::new())),
        })
    }
}

impl Default for CutListOptimizer {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// A task running in the background.
pub struct TaskHandle {
    task_id: String,
    handle: JoinHandle<Solution>,
}

impl TaskHandle {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Waits for the task. `None` if the orchestrator thread panicked.
    pub fn join(self) -> Option<Solution> {
        self.handle.join().ok()
    }
}

/// Removes the run's own registration when the run ends, however it ends.
struct Deregister<'a> {
    registry: &'a TaskRegistry,
    ticket: &'a TaskTicket,
}

impl<'a> Deregister<'a> {
    fn new(registry: &'a TaskRegistry, ticket: &'a TaskTicket) -> Self {
        Self { registry, ticket }
    }
}

impl Drop for Deregister<'_> {
    fn drop(&mut self) {
        self.registry.release(self.ticket);
    }
}

/// Progress line published while a wave runs.
fn wave_status(wave_number: usize, permutations: usize, wave: &[StockSolution]) -> String {
    let stock: Vec<String> = wave.iter().map(StockSolution::to_string).collect();
    format!(
        "Wave {}: trying {} permutation(s) on stock {}",
        wave_number,
        permutations,
        stock.join(" ")
    )
}

type BestSolutions = Arc<Mutex<Vec<Solution>>>;

fn lock_best(best: &Mutex<Vec<Solution>>) -> MutexGuard<'_, Vec<Solution>> {
    best.lock().unwrap_or_else(|e| e.into_inner())
}

struct TaskRun {
    task_id: String,
    ticket: TaskTicket,
    pieces: Vec<TileDimensions>,
    picker: StockPanelPicker,
    cfg: Arc<Configuration>,
    engine: EngineConfig,
    pool: Arc<WorkerPool>,
    registry: Arc<TaskRegistry>,
    best: BestSolutions,
}

impl TaskRun {
    fn execute(&self) -> Solution {
        let started = Instant::now();
        let task_id = self.task_id.as_str();

        let permutations: Vec<Arc<Vec<TileDimensions>>> =
            permutation::generate(&self.pieces, self.engine.max_permutations)
                .into_iter()
                .map(Arc::new)
                .collect();
        self.registry.update_live(&self.ticket, |t| {
            t.total_iterations = permutations.len();
            t.status_message = "Computing...".to_string();
        });

        let max_panels = if self.cfg.force_one_base_tile {
            1
        } else {
            self.engine.max_stock_panels
        };

        let mut exclusions = Vec::new();
        let mut start_with = 1;
        let mut computed = false;
        let mut wave_number = 0;

        loop {
            if !self.registry.is_live(&self.ticket) {
                tracing::info!(task_id, "task stopped");
                break;
            }

            let mut wave = self.build_wave(start_with, max_panels, &mut exclusions);
            if wave.is_empty() {
                if computed {
                    tracing::info!(task_id, "no more stock combinations");
                    break;
                }
                let largest = self.picker.largest(max_panels);
                tracing::warn!(
                    task_id,
                    stock = %largest,
                    "no stock combination holds every piece, laying out on the largest panels"
                );
                wave.push(largest);
            }
            computed = true;
            wave_number += 1;

            let status = wave_status(wave_number, permutations.len(), &wave);
            tracing::debug!(task_id, "{}", status);
            self.registry.update_live(&self.ticket, |t| t.status_message = status);

            self.run_wave(&permutations, &wave);

            let best_is_complete = lock_best(&self.best)
                .first()
                .is_some_and(Solution::is_complete);
            if best_is_complete {
                if self.cfg.use_minimum_panels
                    || self.cfg.force_one_base_tile
                    || start_with >= MAX_START_WITH
                {
                    break;
                }
                start_with += 1;
            }
        }

        let mut result = lock_best(&self.best)
            .first()
            .cloned()
            .unwrap_or_else(|| Solution::unplaced(&self.pieces));
        result.set_elapsed(started.elapsed());

        self.registry.update_live(&self.ticket, |t| {
            t.status_message = "Finished".to_string();
            t.current_best = Some(result.report());
        });
        tracing::info!(
            task_id,
            stock = %result.bases_as_string(),
            cuts = result.nbr_cuts(),
            no_fit = result.no_fit_tiles().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "task finished"
        );
        result
    }

    /// Next group of stock combinations of similar area. Every returned
    /// combination is excluded from later waves.
    fn build_wave(
        &self,
        start_with: usize,
        max_panels: usize,
        exclusions: &mut Vec<StockSolution>,
    ) -> Vec<StockSolution> {
        let criteria = PickCriteria::for_tiles(&self.pieces, 0.0).panels(start_with, max_panels);
        let mut wave: Vec<StockSolution> = Vec::new();

        while wave.len() < MAX_WAVE_CANDIDATES {
            let Some(candidate) = self.picker.pick(&criteria, exclusions) else {
                break;
            };
            if let Some(previous) = wave.last() {
                let ratio = previous.area() as f64 / candidate.area().max(1) as f64;
                if ratio < WAVE_AREA_RATIO {
                    break;
                }
            }
            tracing::debug!(task_id = %self.task_id, stock = %candidate, "stock candidate");
            exclusions.push(candidate.clone());
            wave.push(candidate);
        }
        wave
    }

    /// Runs every ordering against every candidate and waits for all units.
    fn run_wave(&self, permutations: &[Arc<Vec<TileDimensions>>], wave: &[StockSolution]) {
        let required_area: u64 = self.pieces.iter().map(TileDimensions::area).sum();
        let latch = Arc::new(WaveLatch::new());

        tracing::debug!(
            task_id = %self.task_id,
            candidates = wave.len(),
            permutations = permutations.len(),
            "starting wave"
        );

        for pieces in permutations {
            for stock in wave {
                let beam_width =
                    self.engine
                        .accuracy
                        .beam_width(required_area, stock.area(), self.cfg.accuracy_factor);
                let unit = WorkUnit {
                    ticket: self.ticket.clone(),
                    pieces: Arc::clone(pieces),
                    stock: stock.clone(),
                    cfg: Arc::clone(&self.cfg),
                    beam_width,
                    registry: Arc::clone(&self.registry),
                    best: Arc::clone(&self.best),
                };

                latch.add(1);
                self.registry.update_live(&self.ticket, |t| {
                    t.running_threads += 1;
                    t.total_threads += 1;
                });
                let guard = latch.guard();
                let job: Job = Box::new(move || {
                    let _guard = guard;
                    unit.run();
                });
                self.schedule(job);
            }
        }

        latch.wait();
    }

    fn schedule(&self, job: Job) {
        let rejected = match self.pool.try_execute(job) {
            Ok(()) => return,
            Err(ScheduleError::QueueFull(job)) => {
                tracing::warn!(task_id = %self.task_id, "work queue full, waiting for space");
                match self.pool.execute(job) {
                    Ok(()) => return,
                    Err(e) => e,
                }
            }
            Err(e) => e,
        };

        tracing::error!(task_id = %self.task_id, error = %rejected, "work unit not scheduled");
        self.registry.update_live(&self.ticket, |t| {
            t.running_threads = t.running_threads.saturating_sub(1);
            t.failed_threads += 1;
        });
        // Dropping the job releases its latch guard.
        drop(rejected);
    }
}

/// One ordering of the pieces laid out on one stock combination.
struct WorkUnit {
    ticket: TaskTicket,
    pieces: Arc<Vec<TileDimensions>>,
    stock: StockSolution,
    cfg: Arc<Configuration>,
    beam_width: usize,
    registry: Arc<TaskRegistry>,
    best: BestSolutions,
}

impl WorkUnit {
    fn run(self) {
        if !self.registry.is_live(&self.ticket) {
            return;
        }
        let mut outcome = UnitOutcome::new(&self.registry, &self.ticket);

        let mut solutions = vec![Solution::from_stock(&self.stock)];
        compute_solutions(&self.pieces, &mut solutions, &self.cfg, self.beam_width);

        let top = {
            let mut best = lock_best(&self.best);
            best.extend(solutions);
            rank(&mut best, &self.cfg.priorities);
            best.truncate(BEST_SOLUTIONS_RETAINED);
            best.first().map(Solution::report)
        };

        self.registry.update_live(&self.ticket, |t| t.current_best = top);
        outcome.completed = true;
    }
}

/// Counts the unit as completed or failed once it ends.
struct UnitOutcome<'a> {
    registry: &'a TaskRegistry,
    ticket: &'a TaskTicket,
    completed: bool,
}

impl<'a> UnitOutcome<'a> {
    fn new(registry: &'a TaskRegistry, ticket: &'a TaskTicket) -> Self {
        Self {
            registry,
            ticket,
            completed: false,
        }
    }
}

impl Drop for UnitOutcome<'_> {
    fn drop(&mut self) {
        let completed = self.completed;
        self.registry.update_live(self.ticket, |t| {
            t.running_threads = t.running_threads.saturating_sub(1);
            if completed {
                t.completed_threads += 1;
            } else {
                t.failed_threads += 1;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Priority;
    use crate::types::PanelSpec;

    fn optimizer() -> CutListOptimizer {
        CutListOptimizer::new(EngineConfig {
            worker_threads: 2,
            queue_capacity: 4,
            ..EngineConfig::default()
        })
    }

    fn request(pieces: &[(u32, u32, u32)], stock: &[(u32, u32, u32)], cfg: Configuration) -> CalculationRequest {
        let specs = |list: &[(u32, u32, u32)]| {
            list.iter()
                .enumerate()
                .map(|(i, &(w, h, q))| PanelSpec::new(i as u32 + 1, w, h, q))
                .collect()
        };
        CalculationRequest::new(specs(pieces), specs(stock), cfg)
    }

    #[test]
    fn test_compute_four_squares() {
        let solution = optimizer()
            .compute(request(&[(100, 100, 4)], &[(200, 200, 1)], Configuration::default()))
            .unwrap();
        assert!(solution.is_complete());
        assert_eq!(solution.nbr_used_mosaics(), 1);
        assert_eq!(solution.nbr_final_tiles(), 4);
        assert!(solution.elapsed().is_some());
    }

    #[test]
    fn test_compute_prefers_smallest_sufficient_stock() {
        let solution = optimizer()
            .compute(request(
                &[(50, 50, 2)],
                &[(100, 100, 1), (100, 50, 1)],
                Configuration::default(),
            ))
            .unwrap();
        assert!(solution.is_complete());
        assert_eq!(solution.mosaics().len(), 1);
        assert_eq!(solution.mosaics()[0].stock().dimensions(), (100, 50));
        assert_eq!(solution.wasted_area(), 0);
    }

    #[test]
    fn test_validation_errors_create_no_task() {
        let optimizer = optimizer();
        let err = optimizer
            .compute(request(&[], &[(100, 100, 1)], Configuration::default()))
            .unwrap_err();
        assert_eq!(err.code(), 1);

        let err = optimizer
            .compute(request(&[(10, 10, 1)], &[], Configuration::default()))
            .unwrap_err();
        assert_eq!(err.code(), 2);
        assert!(optimizer.registry.is_empty());
    }

    #[test]
    fn test_duplicate_task_id_is_rejected() {
        let optimizer = optimizer();
        optimizer.registry.register(RunningTask::new("busy"));

        let mut req = request(&[(10, 10, 1)], &[(100, 100, 1)], Configuration::default());
        req.task_id = Some("busy".to_string());
        let err = optimizer.compute(req).unwrap_err();
        assert!(matches!(err, RequestError::TaskAlreadyRunning(ref id) if id == "busy"));
        assert_eq!(err.code(), 3);
    }

    #[test]
    fn test_force_one_panel_reports_leftovers() {
        let cfg = Configuration {
            force_one_base_tile: true,
            ..Configuration::default()
        };
        let solution = optimizer()
            .compute(request(&[(100, 100, 2)], &[(100, 100, 2)], cfg))
            .unwrap();
        assert_eq!(solution.mosaics().len(), 1);
        assert_eq!(solution.nbr_final_tiles(), 1);
        assert_eq!(solution.no_fit_tiles().len(), 1);
    }

    #[test]
    fn test_exploring_more_panels_still_finds_full_fit() {
        let cfg = Configuration {
            use_minimum_panels: false,
            priorities: vec![Priority::LeastNbrMosaics, Priority::LeastWastedArea],
            ..Configuration::default()
        };
        let solution = optimizer()
            .compute(request(&[(100, 100, 4)], &[(200, 200, 4)], cfg))
            .unwrap();
        assert!(solution.is_complete());
        assert_eq!(solution.nbr_final_tiles(), 4);
        assert_eq!(solution.nbr_used_mosaics(), 1);
    }

    #[test]
    fn test_finished_task_leaves_registry() {
        let optimizer = optimizer();
        let mut req = request(&[(10, 10, 1)], &[(100, 100, 1)], Configuration::default());
        req.task_id = Some("once".to_string());
        optimizer.compute(req.clone()).unwrap();
        assert!(optimizer.task_status("once").is_none());
        // The id is free again.
        assert!(optimizer.compute(req).is_ok());
    }

    #[test]
    fn test_stopped_task_returns_and_deregisters() {
        let optimizer = optimizer();
        let handle = optimizer
            .submit(request(
                &[(37, 23, 12), (51, 19, 9), (29, 29, 7)],
                &[(200, 150, 6)],
                Configuration::default(),
            ))
            .unwrap();
        let task_id = handle.task_id().to_string();

        assert!(optimizer.stop_task(&task_id));
        assert!(!optimizer.stop_task(&task_id));
        assert!(optimizer.task_status(&task_id).is_none());

        let solution = handle.join().unwrap();
        assert!(solution.elapsed().is_some());
        assert!(optimizer.task_status(&task_id).is_none());
    }

    #[test]
    fn test_wave_groups_similar_areas() {
        let optimizer = optimizer();
        let run = optimizer
            .prepare(request(
                &[(50, 50, 1)],
                &[(100, 100, 1), (100, 98, 1), (300, 300, 1)],
                Configuration::default(),
            ))
            .unwrap();

        let mut exclusions = Vec::new();
        let wave = run.build_wave(1, 50, &mut exclusions);
        // 100x98 then 100x100; 300x300 is too large a step.
        assert_eq!(wave.len(), 2);
        assert_eq!(exclusions.len(), 2);

        let next = run.build_wave(1, 50, &mut exclusions);
        assert_eq!(next[0].tiles()[0].dimensions(), (300, 300));
    }

    #[test]
    fn test_stale_run_leaves_reused_id_alone() {
        let optimizer = optimizer();
        let mut req = request(&[(40, 40, 3)], &[(100, 100, 2)], Configuration::default());
        req.task_id = Some("x".to_string());

        let old = optimizer.prepare(req.clone()).unwrap();
        assert!(optimizer.stop_task("x"));
        let new = optimizer.prepare(req).unwrap();

        {
            let _deregister = Deregister::new(&old.registry, &old.ticket);
            let stock = StockSolution::new(vec![TileDimensions::new(1, 100, 100)]);
            old.run_wave(&[Arc::new(old.pieces.clone())], &[stock]);
            old.execute();
        }

        let status = optimizer.task_status("x").unwrap();
        assert_eq!(status.total_threads, 0);
        assert_eq!(status.completed_threads, 0);
        assert!(status.current_best.is_none());
        assert_eq!(status.status_message, "Initializing...");

        let _deregister = Deregister::new(&new.registry, &new.ticket);
        assert!(new.execute().is_complete());
    }

    #[test]
    fn test_unit_counts_add_up_with_full_queue() {
        let optimizer = CutListOptimizer::new(EngineConfig {
            worker_threads: 1,
            queue_capacity: 1,
            ..EngineConfig::default()
        });
        let run = optimizer
            .prepare(request(
                &[(30, 20, 3), (25, 15, 2), (10, 40, 2), (12, 12, 2)],
                &[(100, 100, 2)],
                Configuration::default(),
            ))
            .unwrap();

        let solution = run.execute();
        assert!(solution.is_complete());

        let status = optimizer.task_status(run.ticket.task_id()).unwrap();
        assert!(status.total_threads > 2);
        assert_eq!(status.completed_threads + status.failed_threads, status.total_threads);
        assert_eq!(status.failed_threads, 0);
        assert_eq!(status.running_threads, 0);
        assert_eq!(status.status_message, "Finished");
        assert!(status.current_best.is_some());
    }

    #[test]
    fn test_wave_status_names_stock() {
        let wave = vec![
            StockSolution::new(vec![TileDimensions::new(1, 100, 100)]),
            StockSolution::new(vec![TileDimensions::new(2, 120, 90)]),
        ];
        assert_eq!(
            wave_status(2, 6, &wave),
            "Wave 2: trying 6 permutation(s) on stock [100x100] [120x90]"
        );
    }
}
