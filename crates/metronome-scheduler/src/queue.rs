// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The submission queue: a multi-producer, single-consumer linked list.
//!
//! Producers publish a node by swapping it into `tail` and then linking the
//! previous tail to it. Between those two steps the chain has a gap, so a
//! reader walking `next` links only ever sees a prefix of what was appended.
//! The main thread drains that prefix and leaves the rest for the next drain.
//!
//! `head` always points at the last node the main thread has drained (or the
//! initial stub). Other threads may take a stale snapshot of it and walk
//! forward; everything they can reach stays alive for as long as they hold it.

use crate::control::ControlOp;
use crate::task::Task;
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Arc, OnceLock};

/// What a queue node carries.
pub(crate) enum Entry {
    /// The initial head. Never visited.
    Stub,
    /// A user task.
    Task(Arc<Task>),
    /// A main-thread mutation, applied inline during drain.
    Control(ControlOp),
}

pub(crate) struct Node {
    entry: Entry,
    next: OnceLock<Arc<Node>>,
}

impl Node {
    fn new(entry: Entry) -> Self {
        Self {
            entry,
            next: OnceLock::new(),
        }
    }
}

impl Drop for Node {
    // Unlink iteratively so a long drained chain cannot overflow the stack.
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.take(),
                Err(_) => break,
            }
        }
    }
}

pub(crate) struct SubmissionQueue {
    head: Mutex<Arc<Node>>,
    // Owns one strong count of the node it points at.
    tail: AtomicPtr<Node>,
}

impl SubmissionQueue {
    pub(crate) fn new() -> Self {
        let stub = Arc::new(Node::new(Entry::Stub));
        let tail = Arc::into_raw(Arc::clone(&stub)).cast_mut();
        Self {
            head: Mutex::new(stub),
            tail: AtomicPtr::new(tail),
        }
    }

    /// Appends an entry. Wait-free: one swap, one link.
    ///
    /// The returned node can be used as a fence for [`scan`](Self::scan).
    pub(crate) fn append(&self, entry: Entry) -> Arc<Node> {
        let node = Arc::new(Node::new(entry));
        let raw = Arc::into_raw(Arc::clone(&node)).cast_mut();
        let previous = self.tail.swap(raw, Ordering::AcqRel);
        // SAFETY: every pointer stored in `tail` comes from `Arc::into_raw`
        // and carries one strong count. The swap hands that count to exactly
        // one caller, which is us.
        let previous = unsafe { Arc::from_raw(previous) };
        let linked = previous.next.set(Arc::clone(&node));
        debug_assert!(linked.is_ok(), "a queue node was linked twice");
        node
    }

    /// Visits every fully linked entry after the head, then advances the head
    /// to the last one visited. Main thread only.
    pub(crate) fn drain(&self, mut visit: impl FnMut(&Entry)) {
        let start = Arc::clone(&self.head.lock());
        let mut last = Arc::clone(&start);
        while let Some(next) = last.next.get().cloned() {
            visit(&next.entry);
            last = next;
        }
        if Arc::ptr_eq(&start, &last) {
            return;
        }
        let previous = std::mem::replace(&mut *self.head.lock(), last);
        drop(start);
        // Frees the drained prefix outside the lock.
        drop(previous);
    }

    /// Walks the linked portion of the queue from a snapshot of the head,
    /// stopping at `fence` (exclusive), at the end of the chain, or when
    /// `visit` breaks. Safe from any thread.
    pub(crate) fn scan<B>(
        &self,
        fence: Option<&Arc<Node>>,
        mut visit: impl FnMut(&Entry) -> ControlFlow<B>,
    ) -> Option<B> {
        let mut cursor = Arc::clone(&self.head.lock());
        while let Some(next) = cursor.next.get().cloned() {
            if fence.is_some_and(|fence| Arc::ptr_eq(fence, &next)) {
                return None;
            }
            if let ControlFlow::Break(found) = visit(&next.entry) {
                return Some(found);
            }
            cursor = next;
        }
        None
    }
}

impl Drop for SubmissionQueue {
    fn drop(&mut self) {
        let tail = *self.tail.get_mut();
        // SAFETY: `tail` owns one strong count taken with `Arc::into_raw`.
        drop(unsafe { Arc::from_raw(tail) });
    }
}
