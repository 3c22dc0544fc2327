//! Structured diagnostics for kernel dispatch decisions.
//!
//! The `log_metric!` macro is the primary tool. Its body is wrapped in
//! `#[cfg(debug_assertions)]`, so the macro and every call to it are compiled
//! out of release builds.

/// Logs a structured key-value metric line through `log::debug!`, only in debug builds.
///
/// # Example
/// ```
/// use fastloops::log_metric;
/// let chunks = 4;
/// log_metric!("event" = "plan", "chunks" = &chunks);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        #[cfg(debug_assertions)]
        {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            log::debug!("FASTLOOPS_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}
