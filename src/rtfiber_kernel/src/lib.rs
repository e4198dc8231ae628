#![deny(unsafe_op_in_unsafe_fn)]
#![doc = include_str!("./lib.md")]
#![doc = ""] // `common.md` breaks without this
#![doc = include_str!("./common.md")]
#![cfg_attr(
    feature = "_full",
    doc = r#"<style type="text/css">.disabled-feature-warning { display: none; }</style>"#
)]
#![cfg_attr(not(any(test, feature = "std")), no_std)] // Link `std` under `cfg(test)` or the `std` feature

pub mod coroutine;
pub mod error;
pub mod logger;
pub mod scheduler;
pub mod task;
pub mod utils;

/// The prelude module.
pub mod prelude {
    pub use crate::coroutine::{ChildHandle, CoCx, CoPoll, CoroutineBody};
    pub use crate::error::Exit;
    pub use crate::logger::{Logger, NullLogger, OutputLogger};
    pub use crate::scheduler::Scheduler;
    pub use crate::task::{Task, TaskBase, PRIORITY_MAX};
}
