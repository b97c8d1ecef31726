use clap::ValueEnum;
use rayon::prelude::*;

/// How independent units of work are run.
///
/// Per-pair image comparison and per-URL downloading are pure and share no
/// mutable state, so the strategy is interchangeable: `Threaded` fans out
/// over the rayon pool, `Serial` stays on the calling thread. Both return
/// results in input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExecMode {
    #[default]
    Threaded,
    Serial,
}

impl ExecMode {
    pub fn run<T, R, F>(self, items: Vec<T>, work: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        match self {
            ExecMode::Threaded => items.into_par_iter().map(work).collect(),
            ExecMode::Serial => items.into_iter().map(work).collect(),
        }
    }
}
