//! Task controls: ordered cross-cutting wrappers around a module's execute
//! step. Fixed order (lower runs first): `environment (10)`, `when (20)`,
//! `register (30)`, `until (50)`, with `loop` wrapping the whole stack from
//! the outside and `become` rewriting the executor before the module runs.
//! [`crate::executor::TaskExecutor`] applies these in that order.

pub mod become_control;
pub mod environment;
pub mod loop_control;
pub mod register;
pub mod until;
pub mod when;
