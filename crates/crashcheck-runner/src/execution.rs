//! Execution scenarios and the results an invocation produces.
//!
//! A scenario has three parts: an initial sequential part, a parallel
//! part with one actor list per thread, and a final sequential part.
//! Results mirror that shape one-to-one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One operation invocation of the data structure under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Operation name.
    pub method: String,
    /// Rendered arguments.
    pub arguments: Vec<String>,
}

impl Actor {
    pub fn new(method: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.method, self.arguments.join(", "))
    }
}

/// The operations one invocation executes, by part and thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionScenario {
    /// Sequential part executed before the parallel part.
    pub init: Vec<Actor>,
    /// One actor list per thread.
    pub parallel: Vec<Vec<Actor>>,
    /// Sequential part executed after the parallel part.
    pub post: Vec<Actor>,
}

impl ExecutionScenario {
    pub fn new(init: Vec<Actor>, parallel: Vec<Vec<Actor>>, post: Vec<Actor>) -> Self {
        Self {
            init,
            parallel,
            post,
        }
    }

    /// Number of threads in the parallel part.
    pub fn threads(&self) -> usize {
        self.parallel.len()
    }

    /// Actors in the parallel part.
    pub fn parallel_actors(&self) -> usize {
        self.parallel.iter().map(Vec::len).sum()
    }

    /// Actors across all three parts.
    pub fn total_actors(&self) -> usize {
        self.init.len() + self.parallel_actors() + self.post.len()
    }
}

impl fmt::Display for ExecutionScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.init.is_empty() {
            writeln!(f, "Init part:")?;
            writeln!(f, "[{}]", join(&self.init))?;
        }
        if !self.parallel.is_empty() {
            writeln!(f, "Parallel part:")?;
            let rows = self.parallel.iter().map(Vec::len).max().unwrap_or(0);
            for row in 0..rows {
                let cells: Vec<String> = self
                    .parallel
                    .iter()
                    .map(|thread| thread.get(row).map(ToString::to_string).unwrap_or_default())
                    .collect();
                writeln!(f, "| {} |", cells.join(" | "))?;
            }
        }
        if !self.post.is_empty() {
            writeln!(f, "Post part:")?;
            writeln!(f, "[{}]", join(&self.post))?;
        }
        Ok(())
    }
}

/// The observable result of one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum OperationResult {
    /// Returned a value, rendered.
    Value(String),
    /// Returned without a value.
    Void,
    /// Failed with a declared exception, by type name.
    Exception(String),
    /// Never ran (the invocation stopped first).
    NoResult,
    /// Suspended and never resumed.
    Suspended,
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationResult::Value(v) => write!(f, "{v}"),
            OperationResult::Void => write!(f, "void"),
            OperationResult::Exception(name) => write!(f, "{name}"),
            OperationResult::NoResult => write!(f, "-"),
            OperationResult::Suspended => write!(f, "S"),
        }
    }
}

/// Results of a completed invocation, in thread/actor order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub init: Vec<OperationResult>,
    pub parallel: Vec<Vec<OperationResult>>,
    pub post: Vec<OperationResult>,
}

impl ExecutionResult {
    pub fn new(
        init: Vec<OperationResult>,
        parallel: Vec<Vec<OperationResult>>,
        post: Vec<OperationResult>,
    ) -> Self {
        Self {
            init,
            parallel,
            post,
        }
    }

    /// A result with no threads and no actors.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn threads(&self) -> usize {
        self.parallel.len()
    }

    /// Number of results across all three parts.
    pub fn len(&self) -> usize {
        self.init.len() + self.parallel.iter().map(Vec::len).sum::<usize>() + self.post.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the result's shape matches `scenario`.
    pub fn matches_shape(&self, scenario: &ExecutionScenario) -> bool {
        self.init.len() == scenario.init.len()
            && self.post.len() == scenario.post.len()
            && self.parallel.len() == scenario.parallel.len()
            && self
                .parallel
                .iter()
                .zip(&scenario.parallel)
                .all(|(results, actors)| results.len() == actors.len())
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.init.is_empty() {
            writeln!(f, "Init results: [{}]", join(&self.init))?;
        }
        for (thread, results) in self.parallel.iter().enumerate() {
            writeln!(f, "Thread {}: [{}]", thread + 1, join(results))?;
        }
        if !self.post.is_empty() {
            writeln!(f, "Post results: [{}]", join(&self.post))?;
        }
        Ok(())
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
