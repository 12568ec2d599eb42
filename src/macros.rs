/// Increment a stats counter by 1.
///
/// Compiles to nothing when the `stats` feature is disabled.
#[macro_export]
macro_rules! stat_inc {
    ($counter:ident) => {
        #[cfg(feature = "stats")]
        {
            $crate::stats::STATS
                .$counter
                .fetch_add(1, ::core::sync::atomic::Ordering::Relaxed);
        }
    };
}

/// Add a value to a stats counter.
///
/// Compiles to nothing (including the value expression) when the `stats`
/// feature is disabled.
#[macro_export]
macro_rules! stat_add {
    ($counter:ident, $val:expr) => {
        #[cfg(feature = "stats")]
        {
            $crate::stats::STATS
                .$counter
                .fetch_add($val as u64, ::core::sync::atomic::Ordering::Relaxed);
        }
    };
}

/// Record an allocation size in the histogram.
///
/// Compiles to nothing when the `stats` feature is disabled.
#[macro_export]
macro_rules! hist_record {
    ($size:expr) => {
        #[cfg(feature = "stats")]
        {
            $crate::stats::histogram::record($size);
        }
    };
}

/// Abort the process with a message when a runtime contract is violated.
///
/// Unlike `assert!`, this never unwinds: the message is written to stderr
/// and the process aborts. Use for contract violations that have no error
/// channel (out-of-bounds access, poisoned locks, size overflow).
#[macro_export]
macro_rules! rt_assert {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::panic::fatal(&::std::format!($($arg)+));
        }
    };
}
