//! Thread dumps attached to deadlock outcomes.
//!
//! Capturing the state of every live thread is platform work done by a
//! [`ThreadDumpProvider`].  The outcome model only stores the result,
//! once, and never refreshes it.

use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;
use std::fmt;

/// State of one thread at capture time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadState {
    /// Thread name, or its id if unnamed.
    pub name: String,
    /// Free-form state ("running", "parked", "blocked on X", ...).
    pub state: String,
    /// Stack frames, innermost first.
    pub frames: Vec<String>,
}

impl ThreadState {
    pub fn new(name: impl Into<String>, state: impl Into<String>, frames: Vec<String>) -> Self {
        Self {
            name: name.into(),
            state: state.into(),
            frames,
        }
    }

    /// Capture the calling thread.
    pub fn current() -> Self {
        let thread = std::thread::current();
        let name = thread
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{:?}", thread.id()));
        let frames = Backtrace::force_capture()
            .to_string()
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Self::new(name, "running", frames)
    }
}

/// Point-in-time snapshot of all live threads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadDump {
    threads: Vec<ThreadState>,
}

impl ThreadDump {
    pub fn new(threads: Vec<ThreadState>) -> Self {
        Self { threads }
    }

    pub fn threads(&self) -> &[ThreadState] {
        &self.threads
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Look up a thread by name.
    pub fn find(&self, name: &str) -> Option<&ThreadState> {
        self.threads.iter().find(|t| t.name == name)
    }
}

impl fmt::Display for ThreadDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for thread in &self.threads {
            writeln!(f, "Thread \"{}\" ({}):", thread.name, thread.state)?;
            for frame in &thread.frames {
                writeln!(f, "    {frame}")?;
            }
        }
        Ok(())
    }
}

/// Captures a [`ThreadDump`] on demand.
pub trait ThreadDumpProvider {
    fn capture(&self) -> ThreadDump;
}

impl<F> ThreadDumpProvider for F
where
    F: Fn() -> ThreadDump,
{
    fn capture(&self) -> ThreadDump {
        self()
    }
}

/// Provider that only sees the calling thread.
///
/// Rust has no portable way to walk other threads' stacks; harnesses
/// that need more plug in their own provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentThreadProvider;

impl ThreadDumpProvider for CurrentThreadProvider {
    fn capture(&self) -> ThreadDump {
        ThreadDump::new(vec![ThreadState::current()])
    }
}
