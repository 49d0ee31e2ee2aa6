//! Parameter-sweep benchmarking of a locally served Ollama model.
//!
//! For each `(num_ctx, num_batch)` point in a two-dimensional grid the sweep
//! rebuilds the model from a rendered modelfile, runs a fixed prompt under a
//! timeout, extracts the `prompt eval rate` metric from the verbose output,
//! and appends the outcome to a durable JSON store. Every point is persisted
//! as soon as it completes, so an interrupted sweep can be restarted and will
//! skip the points it already recorded.

pub mod classify;
pub mod error;
pub mod exec;
pub mod extract;
pub mod grid;
pub mod modelfile;
pub mod store;
pub mod sweep;

pub use classify::{classify, FailureCategory};
pub use error::SweepError;
pub use exec::{
    ConfigureOutcome, OllamaExecutor, RunOutcome, TrialExecutor, CONFIGURE_TIMEOUT, RUN_TIMEOUT,
};
pub use extract::prompt_eval_rate;
pub use grid::{GridAxis, GridPoint, GridSpec, TraversalOrder};
pub use store::{ResultCollection, ResultStore, SweepMetadata, TrialOutcome};
pub use sweep::{run_sweep, SweepReport};
