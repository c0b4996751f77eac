//! Single-flight path search scheduling.
//!
//! At most one search runs at any time per [`Pathfinder`]. Requests arriving
//! while a search is in flight wait in a FIFO backlog and are started, in
//! order, as soon as the running one delivers its result. Searches either run
//! inline on the caller's thread or on a tokio blocking worker, and both modes
//! share the same gate and backlog.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};
use wayfinder_common::Vector3;

use crate::astar::{self, PathResult};
use crate::config::PathfinderConfig;
use crate::grid::SpatialGrid;

/// A grid shared between the pathfinder and the agents that grow it.
pub type SharedGrid = Arc<Mutex<SpatialGrid>>;

/// Callback receiving the result of a path request.
pub type PathCallback = Box<dyn FnOnce(PathResult) + Send + 'static>;

/// Where a search runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// On the thread that starts it.
    Sync,
    /// On a tokio blocking worker.
    Async,
}

struct PathRequest {
    start: Vector3,
    target: Vector3,
    mode: RequestMode,
    callback: PathCallback,
}

#[derive(Default)]
struct Scheduler {
    in_flight: bool,
    backlog: VecDeque<PathRequest>,
}

struct Inner {
    grid: SharedGrid,
    scheduler: Mutex<Scheduler>,
    runtime: Option<Handle>,
    default_mode: RequestMode,
}

/// Serializes A* searches over a shared grid.
///
/// Cloning is cheap and every clone shares the same gate and backlog.
#[derive(Clone)]
pub struct Pathfinder {
    inner: Arc<Inner>,
}

impl Pathfinder {
    /// Creates a pathfinder over `grid`.
    ///
    /// Async searches use the tokio runtime current at construction, if any.
    pub fn new(grid: SharedGrid, config: &PathfinderConfig) -> Self {
        Self::build(grid, config, Handle::try_current().ok())
    }

    /// Creates a pathfinder that offloads async searches to `runtime`.
    pub fn with_runtime(grid: SharedGrid, config: &PathfinderConfig, runtime: Handle) -> Self {
        Self::build(grid, config, Some(runtime))
    }

    fn build(grid: SharedGrid, config: &PathfinderConfig, runtime: Option<Handle>) -> Self {
        let default_mode = if config.run_async {
            RequestMode::Async
        } else {
            RequestMode::Sync
        };
        if default_mode == RequestMode::Async && runtime.is_none() {
            warn!("Async pathfinding requested without a tokio runtime, searches will run inline");
        }
        Pathfinder {
            inner: Arc::new(Inner {
                grid,
                scheduler: Mutex::new(Scheduler::default()),
                runtime,
                default_mode,
            }),
        }
    }

    /// The grid searches run on.
    pub fn grid(&self) -> &SharedGrid {
        &self.inner.grid
    }

    /// Mode used by [`find_path`](Self::find_path).
    pub fn default_mode(&self) -> RequestMode {
        self.inner.default_mode
    }

    /// Returns true while a search is running.
    pub fn is_busy(&self) -> bool {
        self.inner.scheduler.lock().in_flight
    }

    /// Number of requests waiting behind the running search.
    pub fn backlog_len(&self) -> usize {
        self.inner.scheduler.lock().backlog.len()
    }

    /// Requests a path using the default mode.
    pub fn find_path<F>(&self, start: Vector3, target: Vector3, callback: F)
    where
        F: FnOnce(PathResult) + Send + 'static,
    {
        self.find_path_with(start, target, self.inner.default_mode, callback);
    }

    /// Requests a path.
    ///
    /// `callback` is invoked exactly once: immediately when the gate is free and
    /// `mode` is [`RequestMode::Sync`], otherwise later, from whichever thread
    /// completes the search.
    pub fn find_path_with<F>(&self, start: Vector3, target: Vector3, mode: RequestMode, callback: F)
    where
        F: FnOnce(PathResult) + Send + 'static,
    {
        let request = PathRequest {
            start,
            target,
            mode,
            callback: Box::new(callback),
        };

        let ready = {
            let mut scheduler = self.inner.scheduler.lock();
            if scheduler.in_flight {
                scheduler.backlog.push_back(request);
                debug!(backlog = scheduler.backlog.len(), "Search in flight, request queued");
                None
            } else {
                scheduler.in_flight = true;
                Some(request)
            }
        };

        if let Some(request) = ready {
            self.run(request);
        }
    }

    /// Requests a path and returns a receiver for the result.
    ///
    /// For a sync request on an idle pathfinder the result is already waiting
    /// when this returns.
    pub fn request(&self, start: Vector3, target: Vector3, mode: RequestMode) -> oneshot::Receiver<PathResult> {
        let (tx, rx) = oneshot::channel();
        self.find_path_with(start, target, mode, move |result| {
            // The requester may have given up on the answer
            let _ = tx.send(result);
        });
        rx
    }

    /// Runs `request` and then every queued request, until the backlog is empty
    /// or an async request hands the chain over to a worker.
    fn run(&self, mut request: PathRequest) {
        loop {
            if request.mode == RequestMode::Async {
                if let Some(runtime) = &self.inner.runtime {
                    self.spawn(runtime, request);
                    return;
                }
            }

            let result = self.search(&request.start, &request.target);
            (request.callback)(result);

            match self.complete() {
                Some(next) => request = next,
                None => return,
            }
        }
    }

    /// Runs `request` and the rest of the backlog on `runtime`.
    ///
    /// Once the chain is on the runtime every search, sync or not, goes to a
    /// blocking worker so none of them stalls an async worker.
    fn spawn(&self, runtime: &Handle, request: PathRequest) {
        let mut gate = GateGuard {
            pathfinder: self.clone(),
            held: true,
        };
        runtime.spawn(async move {
            let mut request = request;
            loop {
                let PathRequest {
                    start,
                    target,
                    callback,
                    ..
                } = request;
                let pathfinder = gate.pathfinder.clone();
                let search = tokio::task::spawn_blocking(move || pathfinder.search(&start, &target));
                let result = match search.await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(error = %e, "Background search failed, delivering an empty path");
                        PathResult::empty()
                    }
                };
                callback(result);
                match gate.next() {
                    Some(next) => request = next,
                    None => return,
                }
            }
        });
    }

    fn search(&self, start: &Vector3, target: &Vector3) -> PathResult {
        let mut grid = self.inner.grid.lock();
        let result = astar::find_path(&mut grid, start, target);
        debug!(
            complete = result.is_complete,
            path_length = result.path.len(),
            nodes_explored = result.nodes_explored,
            "Search finished"
        );
        result
    }

    /// Releases the gate, or keeps it and returns the next queued request.
    fn complete(&self) -> Option<PathRequest> {
        let mut scheduler = self.inner.scheduler.lock();
        match scheduler.backlog.pop_front() {
            Some(next) => {
                debug!(backlog = scheduler.backlog.len(), "Starting queued request");
                Some(next)
            }
            None => {
                scheduler.in_flight = false;
                None
            }
        }
    }
}

/// The gate held by a search chain running on the runtime.
///
/// Dropping it while still held, e.g. when the runtime shuts down and cancels
/// the task, releases the gate. Requests still queued then run right after
/// the next one to arrive.
struct GateGuard {
    pathfinder: Pathfinder,
    held: bool,
}

impl GateGuard {
    fn next(&mut self) -> Option<PathRequest> {
        let next = self.pathfinder.complete();
        self.held = next.is_some();
        next
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        if self.held {
            warn!("Search task dropped before finishing, releasing the gate");
            self.pathfinder.inner.scheduler.lock().in_flight = false;
        }
    }
}

impl std::fmt::Debug for Pathfinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheduler = self.inner.scheduler.lock();
        f.debug_struct("Pathfinder")
            .field("in_flight", &scheduler.in_flight)
            .field("backlog", &scheduler.backlog.len())
            .field("default_mode", &self.inner.default_mode)
            .finish()
    }
}
