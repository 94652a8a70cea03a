//! Logging shims. With `telemetry` the events go to `tracing`; without it
//! warnings fall back to `eprintln!` and debug output is dropped.
//!
//! `warn_event!` is exported for the other lieferlern crates.

#[cfg(feature = "telemetry")]
#[doc(hidden)]
#[macro_export]
macro_rules! warn_event {
    ($($arg:tt)*) => { $crate::__tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "telemetry"))]
#[doc(hidden)]
#[macro_export]
macro_rules! warn_event {
    ($($arg:tt)*) => { ::std::eprintln!("warn: {}", ::std::format!($($arg)*)) };
}

#[cfg(feature = "telemetry")]
macro_rules! debug_event {
    ($($arg:tt)*) => { ::tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "telemetry"))]
macro_rules! debug_event {
    ($($arg:tt)*) => {
        if false {
            let _ = ::std::format!($($arg)*);
        }
    };
}

pub(crate) use debug_event;
