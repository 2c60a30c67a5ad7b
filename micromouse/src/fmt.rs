//! Micromouse core - Logging shim
//!
//! Forwards to `tracing` on hosts and to `defmt` on embedded targets.
//! With neither feature the arguments are still evaluated by reference so
//! call sites compile identically. Only foreground code logs; the control
//! tick never does.
#![macro_use]
#![allow(unused_macros)]

macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "std")]
            ::tracing::trace!($s $(, $x)*);
            #[cfg(all(feature = "defmt-log", not(feature = "std")))]
            ::defmt::trace!($s $(, $x)*);
            #[cfg(not(any(feature = "std", feature = "defmt-log")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "std")]
            ::tracing::debug!($s $(, $x)*);
            #[cfg(all(feature = "defmt-log", not(feature = "std")))]
            ::defmt::debug!($s $(, $x)*);
            #[cfg(not(any(feature = "std", feature = "defmt-log")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "std")]
            ::tracing::info!($s $(, $x)*);
            #[cfg(all(feature = "defmt-log", not(feature = "std")))]
            ::defmt::info!($s $(, $x)*);
            #[cfg(not(any(feature = "std", feature = "defmt-log")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "std")]
            ::tracing::warn!($s $(, $x)*);
            #[cfg(all(feature = "defmt-log", not(feature = "std")))]
            ::defmt::warn!($s $(, $x)*);
            #[cfg(not(any(feature = "std", feature = "defmt-log")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "std")]
            ::tracing::error!($s $(, $x)*);
            #[cfg(all(feature = "defmt-log", not(feature = "std")))]
            ::defmt::error!($s $(, $x)*);
            #[cfg(not(any(feature = "std", feature = "defmt-log")))]
            let _ = ($( & $x ),*);
        }
    };
}
