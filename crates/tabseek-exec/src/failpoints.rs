//! Chaos/failpoint hooks (feature: `failpoints`).
//!
//! The macro expands to nothing unless the feature is enabled. When enabled,
//! a search task whose table name starts with `panic_` panics, and one
//! starting with `stall_` sleeps for the given duration first.

#[cfg(feature = "failpoints")]
#[macro_export]
macro_rules! fail_point {
    ($name:expr, $stall:expr) => {{
        let name: &str = $name;
        if name.starts_with("panic_") {
            panic!("failpoint triggered: {}", name);
        }
        if name.starts_with("stall_") {
            std::thread::sleep($stall);
        }
    }};
}

#[cfg(not(feature = "failpoints"))]
#[macro_export]
macro_rules! fail_point {
    ($name:expr, $stall:expr) => {{
        let _ = (&$name, &$stall);
    }};
}
