//! Macro for building [`crate::error::DapError`] values.

/// Creates a [`crate::error::DapError`] from a kind, a static description and an optional detail.
#[macro_export]
macro_rules! dap_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::DapError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::DapError::from(($kind, $desc, $detail.to_string()))
    };
}
