use std::collections::BTreeMap;

pub type Scalars = BTreeMap<&'static str, f32>;

/// Experiment-tracking sink.
pub trait MetricsLogger {
    fn log(&mut self, step: usize, scalars: &Scalars);
}

/// Discards everything.
#[derive(Default)]
pub struct NoopLogger;

impl MetricsLogger for NoopLogger {
    fn log(&mut self, _step: usize, _scalars: &Scalars) {}
}

/// Emits each record as a `tracing` event under the `metrics` target.
pub struct TracingLogger {
    run_name: String,
}

impl TracingLogger {
    pub fn new(run_name: impl Into<String>) -> Self {
        Self { run_name: run_name.into() }
    }
}

impl MetricsLogger for TracingLogger {
    fn log(&mut self, step: usize, scalars: &Scalars) {
        tracing::info!(target: "metrics", run = %self.run_name, step, ?scalars);
    }
}

/// Keeps every record in memory.
#[derive(Default)]
pub struct MemoryLogger {
    pub records: Vec<(usize, Scalars)>,
}

impl MetricsLogger for MemoryLogger {
    fn log(&mut self, step: usize, scalars: &Scalars) {
        self.records.push((step, scalars.clone()));
    }
}
