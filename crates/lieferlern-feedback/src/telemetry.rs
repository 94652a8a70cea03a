pub(crate) use lieferlern_qlearn::warn_event;

#[cfg(feature = "telemetry")]
macro_rules! info_event {
    ($($arg:tt)*) => { ::tracing::info!($($arg)*) };
}

#[cfg(not(feature = "telemetry"))]
macro_rules! info_event {
    ($($arg:tt)*) => {
        if false {
            let _ = ::std::format!($($arg)*);
        }
    };
}

pub(crate) use info_event;
