//! Joint-trajectory recording.

use nalgebra::DVector;

/// Per-step (t, q, q̇, τ) histories of one simulation run.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    pub time: Vec<f64>,
    pub q: Vec<DVector<f64>>,
    pub qd: Vec<DVector<f64>>,
    pub tau: Vec<DVector<f64>>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one step.
    pub fn record(&mut self, t: f64, q: DVector<f64>, qd: DVector<f64>, tau: DVector<f64>) {
        self.time.push(t);
        self.q.push(q);
        self.qd.push(qd);
        self.tau.push(tau);
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn clear(&mut self) {
        self.time.clear();
        self.q.clear();
        self.qd.clear();
        self.tau.clear();
    }

    /// Total recorded duration (seconds); zero when empty.
    pub fn duration(&self) -> f64 {
        match (self.time.first(), self.time.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }
}
