//! Asynchronous shader compilation jobs for the talus GPU backends.
//!
//! The 3D state translator blocks a draw only when it actually needs a program
//! that is still compiling, so compilation runs on a small worker pool and the
//! consumer holds a [`CompileTask`] wait handle. The backend compiler itself is
//! a collaborator behind [`ShaderCompiler`]; this crate owns job scheduling,
//! completion signalling and the one piece of shared mutable state the
//! underlying compiler has: its option builder, which is not thread-safe
//! around construction and disposal. A single process-wide mutex is held for
//! exactly those two operations; the compile call runs unlocked.

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::JoinHandle;

use thiserror::Error;
use tracing::debug;

/// Target stage for a compile job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileStage {
    Vertex,
    TessControl,
    TessEvaluation,
    Geometry,
    Fragment,
    Compute,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    /// The backend rejected the shader source.
    #[error("shader rejected by backend: {0}")]
    Rejected(String),
    /// The worker pool was shut down before the job ran.
    #[error("compiler pool shut down before the job ran")]
    PoolShutDown,
}

fn option_builder_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Options passed to the backend compiler for one job.
///
/// The underlying option builder is not internally synchronized, so
/// construction and disposal serialize on a process-wide mutex. Everything in
/// between (reading the options during compilation) is safe concurrently.
#[derive(Debug)]
pub struct CompileOptions {
    pub optimize: bool,
    pub debug_info: bool,
}

impl CompileOptions {
    pub fn new(optimize: bool, debug_info: bool) -> Self {
        let _guard = option_builder_lock()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Self {
            optimize,
            debug_info,
        }
    }
}

impl Drop for CompileOptions {
    fn drop(&mut self) {
        let _guard = option_builder_lock()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
    }
}

/// Backend that turns intermediate shader source into a validated host module.
///
/// The source is expected to already be transformed for host-API semantic gaps
/// (`VertexID` lowered to `VertexIndex - BaseVertex`, `InstanceID` to
/// `InstanceIndex - BaseInstance`) by the shader translator that produced it.
pub trait ShaderCompiler: Send + Sync + 'static {
    fn compile(
        &self,
        source: &str,
        stage: CompileStage,
        options: &CompileOptions,
    ) -> Result<Vec<u8>, CompileError>;
}

/// Completion status of a compile job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStatus {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug)]
enum TaskState {
    Pending,
    Done(Result<Arc<[u8]>, CompileError>),
}

#[derive(Debug)]
struct TaskShared {
    state: Mutex<TaskState>,
    done: Condvar,
}

impl TaskShared {
    fn complete(&self, result: Result<Arc<[u8]>, CompileError>) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *state = TaskState::Done(result);
        self.done.notify_all();
    }
}

/// Wait handle for a queued compile job.
///
/// Jobs are not cancellable; a consumer that needs the module blocks on
/// [`CompileTask::wait`]. The absence of a timeout is intentional: a compiling
/// program blocks its first draw and nothing else.
#[derive(Debug, Clone)]
pub struct CompileTask {
    shared: Arc<TaskShared>,
}

impl CompileTask {
    pub fn status(&self) -> CompileStatus {
        let state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match &*state {
            TaskState::Pending => CompileStatus::Pending,
            TaskState::Done(Ok(_)) => CompileStatus::Succeeded,
            TaskState::Done(Err(_)) => CompileStatus::Failed,
        }
    }

    /// Block until the job finishes and return the compiled module.
    pub fn wait(&self) -> Result<Arc<[u8]>, CompileError> {
        let mut state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            match &*state {
                TaskState::Pending => {
                    state = self
                        .shared
                        .done
                        .wait(state)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                }
                TaskState::Done(result) => return result.clone(),
            }
        }
    }
}

struct Job {
    source: String,
    stage: CompileStage,
    options: CompileOptions,
    shared: Arc<TaskShared>,
}

/// Fixed worker pool running compile jobs off the draw thread.
pub struct CompilerPool {
    queue: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl CompilerPool {
    pub fn new(backend: Arc<dyn ShaderCompiler>, workers: usize) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers)
            .map(|index| {
                let rx = Arc::clone(&rx);
                let backend = Arc::clone(&backend);
                std::thread::Builder::new()
                    .name(format!("talus-shader-compile-{index}"))
                    .spawn(move || loop {
                        let job = {
                            let rx = rx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                            rx.recv()
                        };
                        let Ok(job) = job else {
                            break;
                        };
                        let result = backend
                            .compile(&job.source, job.stage, &job.options)
                            .map(Arc::from);
                        if let Err(err) = &result {
                            debug!(stage = ?job.stage, error = %err, "shader compilation failed");
                        }
                        job.shared.complete(result);
                    })
                    .expect("spawning compile worker")
            })
            .collect();

        Self {
            queue: Some(tx),
            workers: handles,
        }
    }

    /// Queue a compile job and return its wait handle.
    pub fn compile(&self, source: String, stage: CompileStage, options: CompileOptions) -> CompileTask {
        let shared = Arc::new(TaskShared {
            state: Mutex::new(TaskState::Pending),
            done: Condvar::new(),
        });
        let task = CompileTask {
            shared: Arc::clone(&shared),
        };
        let job = Job {
            source,
            stage,
            options,
            shared,
        };
        if let Some(queue) = &self.queue {
            if queue.send(job).is_err() {
                task.shared.complete(Err(CompileError::PoolShutDown));
            }
        }
        task
    }
}

impl Drop for CompilerPool {
    fn drop(&mut self) {
        // Closing the channel lets each worker drain and exit.
        self.queue = None;
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
