//! Core CAS-free SPSC linked task chain.
//!
//! This module contains the shared algorithm behind [`crate::pending`]:
//! - [`task`] - Task records and the preallocated arena that backs them
//! - [`list`] - The singly linked queue threaded through the arena
//! - [`cell`] - Role-tagged interior-mutable cells for role-owned fields

pub(crate) mod cell;
pub(crate) mod list;
pub(crate) mod task;
