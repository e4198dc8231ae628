#![deny(unsafe_op_in_unsafe_fn)]
#![doc = include_str!("./lib.md")]
#![doc = ""] // `common.md` breaks without this
#![doc = include_str!("./common.md")]
#![cfg_attr(
    feature = "_full",
    doc = r#"<style type="text/css">.disabled-feature-warning { display: none; }</style>"#
)]
#![cfg_attr(not(test), no_std)] // Link `std` under `cfg(test)` so the libtest harness builds

pub mod alloc;
pub mod awaitable;
pub mod fail;
pub mod future;
pub mod hooks;
pub mod signal;
pub mod time;
pub mod utils;

#[cfg(doc)]
#[doc = include_str!("../CHANGELOG.md")]
pub mod _changelog_ {}

/// The prelude module.
pub mod prelude {
    pub use crate::awaitable::Awaitable;
    pub use crate::future::{Channel, Future, Promise};
    pub use crate::signal::CoSignal;
    pub use crate::time::{Duration, Tick, TimePoint};
}
