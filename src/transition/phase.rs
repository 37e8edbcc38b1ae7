use std::time::Duration;

use tracing::{debug, warn};

use crate::grid::Surface;

/// A host-side animation with a fixed length.
///
/// `run` applies the change, presents it, and returns only after the
/// duration has passed, so awaiting phases one after another never lets
/// two of them overlap.
#[derive(Debug, Clone, Copy)]
pub struct Phase {
    pub name: &'static str,
    pub duration: Duration,
}

impl Phase {
    pub const fn new(name: &'static str, duration: Duration) -> Self {
        Phase { name, duration }
    }

    pub async fn run<S: Surface>(&self, surface: &S, apply: impl FnOnce()) {
        debug!(phase = self.name, duration_ms = self.duration.as_millis() as u64, "phase");
        apply();
        present(surface);
        tokio::time::sleep(self.duration).await;
    }
}

pub(crate) fn present<S: Surface>(surface: &S) {
    if let Err(e) = surface.present() {
        warn!("present failed: {e}");
    }
}
