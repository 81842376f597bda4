//! Child process plumbing for the sidecar supervisor
//!
//! Launches a command with an environment overlay, keeps its merged output
//! drained into a bounded buffer, observes real process exit and force-kills
//! the child together with anything it forked.
//!
//! # Security Model
//!
//! All process execution goes through [`CommandSpec`] to ensure argv-style invocation.
//! Arguments are passed as discrete elements rather than shell strings.

pub mod command_spec;
pub mod error;
pub mod handle;
pub mod launcher;
mod platform;
pub mod ring_buffer;

pub use command_spec::CommandSpec;
pub use error::{LaunchError, RunnerError};
pub use handle::{OutputTail, ProcessHandle, Stream};
pub use launcher::{NativeLauncher, ProcessLauncher};
pub use ring_buffer::RingBuffer;
