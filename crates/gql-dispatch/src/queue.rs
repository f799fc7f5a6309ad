use std::collections::VecDeque;

use crate::action::Action;

/// FIFO of actions waiting for the scheduler, in arrival order.
#[derive(Debug, Default)]
pub struct ActionQueue {
    queue: VecDeque<Action>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) {
        self.queue.push_back(action);
    }

    /// The head of the queue, without removing it.
    pub fn peek(&self) -> Option<&Action> {
        self.queue.front()
    }

    pub fn pop(&mut self) -> Option<Action> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
