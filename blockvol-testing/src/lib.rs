// SPDX-License-Identifier: GPL-3.0-only

//! Scriptable fakes for the blockvol contracts
//!
//! Each fake records the calls it receives so tests can assert on cloud
//! round trips and tool invocations without touching a cloud or a disk.

pub mod cloud;
pub mod host;
pub mod tool;

pub use cloud::{CloudCall, FakeCloud};
pub use host::FakeHost;
pub use tool::{FakePartitionTool, ToolCall};
