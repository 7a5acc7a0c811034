//! Process-wide inference runtime setup.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize the ONNX Runtime environment.
///
/// Runs once per process; later calls return immediately. Called by
/// [`ScrfdLocator::load`](crate::detector::ScrfdLocator::load), and may be
/// called earlier to surface runtime problems at startup.
pub fn init() {
    INIT.call_once(|| {
        let committed = ort::init().with_name("facerec").commit();
        tracing::info!(?committed, "ONNX Runtime environment initialized");
    });
}

pub fn is_initialized() -> bool {
    INIT.is_completed()
}
