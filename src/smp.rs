//! Execution-context identity
//!
//! Each OS thread that touches a stack is given a small, stable id on first
//! use. A stack records the id of the context that owns it and checks it in
//! debug builds.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_CPU: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static CPU_ID: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Id of the calling execution context
pub fn current_cpu() -> usize {
    CPU_ID.with(|id| match id.get() {
        Some(cpu) => cpu,
        None => {
            let cpu = NEXT_CPU.fetch_add(1, Ordering::Relaxed);
            id.set(Some(cpu));
            cpu
        }
    })
}
