//! Maps `Box<dyn Error>` from trait boundaries to typed `NavError`.
//!
//! The traits in `tracer_traits` return `Box<dyn Error + Send + Sync>`; this
//! module converts those to the core error enum, downcasting
//! `tracer_hardware::HwError` first when the `hardware-errors` feature is on.

use crate::error::NavError;

/// Map a trait-boundary error to a typed `NavError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> NavError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<tracer_hardware::error::HwError>() {
            return match hw {
                tracer_hardware::error::HwError::Script(msg) => NavError::Hardware(msg.clone()),
                other => NavError::HardwareFault(other.to_string()),
            };
        }
    }

    NavError::Hardware(e.to_string())
}

/// Convert a boxed trait-boundary error into an `eyre::Report` carrying `NavError`.
pub(crate) fn report(e: &(dyn std::error::Error + Send + Sync + 'static)) -> eyre::Report {
    eyre::Report::new(map_hw_error(e))
}
