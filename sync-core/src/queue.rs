//! Command queue for setpoint-sync.
//!
//! This module provides the queue of commands not yet acknowledged by the
//! remote authority, with:
//! - Insertion ordering for delivery
//! - Coalescing: a new command of a coalescing kind replaces the queued one
//! - Per-command attempt tracking for the retry policy
//!
//! Commands stay queued while they are in flight. They leave the queue
//! only when acknowledged or abandoned, so a failed delivery needs no
//! "put it back" step.

use serde::{Deserialize, Serialize};
use setpoint_sync_types::{Command, CommandId};
use std::collections::VecDeque;

/// Insertion-ordered queue of unacknowledged commands.
///
/// Commands flow through the queue in this order:
/// 1. `enqueue()` - add to the back, dropping any queued command of the same coalescing kind
/// 2. `record_attempt()` - bump the retry counter after a failed delivery
/// 3. `remove()` - delete once acknowledged (or abandoned)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandQueue {
    commands: VecDeque<Command>,
}

impl CommandQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command to the back of the queue.
    ///
    /// If the command's kind coalesces, every queued command of that kind
    /// is removed first, so only the latest intent is ever transmitted.
    pub fn enqueue(&mut self, command: Command) {
        if command.kind.coalesces() {
            self.commands.retain(|queued| queued.kind != command.kind);
        }
        self.commands.push_back(command);
    }

    /// Remove a command by id, returning it if it was queued.
    pub fn remove(&mut self, id: &CommandId) -> Option<Command> {
        let index = self.commands.iter().position(|c| c.id == *id)?;
        self.commands.remove(index)
    }

    /// Increment the attempt counter of a queued command.
    ///
    /// Returns the new count, or `None` if the command is no longer queued.
    pub fn record_attempt(&mut self, id: &CommandId) -> Option<u32> {
        let command = self.commands.iter_mut().find(|c| c.id == *id)?;
        command.attempts = command.attempts.saturating_add(1);
        Some(command.attempts)
    }

    /// Look up a queued command.
    pub fn get(&self, id: &CommandId) -> Option<&Command> {
        self.commands.iter().find(|c| c.id == *id)
    }

    /// Check whether a command is still queued.
    pub fn contains(&self, id: &CommandId) -> bool {
        self.get(id).is_some()
    }

    /// Iterate queued commands in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// Ids of all queued commands, in insertion order.
    pub fn ids(&self) -> Vec<CommandId> {
        self.commands.iter().map(|c| c.id).collect()
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drop every queued command.
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}
