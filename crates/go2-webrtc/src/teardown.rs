// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Best-effort multi-resource teardown.

use std::fmt;
use std::future::Future;
use tracing::{debug, warn};

/// One resource that failed to close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFailure {
    pub resource: &'static str,
    pub error: String,
}

/// Closes resources one after another and records every failure.
///
/// A failing close never prevents the following attempts.
#[derive(Debug)]
pub struct Teardown {
    owner: String,
    attempted: usize,
    failures: Vec<CloseFailure>,
}

impl Teardown {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            attempted: 0,
            failures: Vec::new(),
        }
    }

    /// Await `close` and record its outcome under `resource`.
    pub async fn attempt<F, E>(&mut self, resource: &'static str, close: F)
    where
        F: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        self.attempted += 1;
        match close.await {
            Ok(()) => debug!("{}: closed {}", self.owner, resource),
            Err(e) => {
                warn!("{}: failed to close {}: {}", self.owner, resource, e);
                self.failures.push(CloseFailure {
                    resource,
                    error: e.to_string(),
                });
            }
        }
    }

    /// Number of close attempts made.
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    pub fn failures(&self) -> &[CloseFailure] {
        &self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold another teardown's record into this one.
    pub fn merge(&mut self, other: Teardown) {
        self.attempted += other.attempted;
        self.failures.extend(other.failures);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failures_do_not_stop_later_attempts() {
        let mut closed = Vec::new();
        let mut teardown = Teardown::new("test");

        teardown
            .attempt("a", async {
                closed.push("a");
                Err::<(), _>("boom")
            })
            .await;
        teardown
            .attempt("b", async {
                closed.push("b");
                Ok::<(), &str>(())
            })
            .await;
        teardown
            .attempt("c", async {
                closed.push("c");
                Err::<(), _>("bang")
            })
            .await;

        assert_eq!(closed, vec!["a", "b", "c"]);
        assert_eq!(teardown.attempted(), 3);
        assert_eq!(
            teardown.failures(),
            &[
                CloseFailure { resource: "a", error: "boom".into() },
                CloseFailure { resource: "c", error: "bang".into() },
            ]
        );
        assert!(!teardown.is_clean());
    }

    #[tokio::test]
    async fn test_merge() {
        let mut outer = Teardown::new("outer");
        outer.attempt("x", async { Ok::<(), &str>(()) }).await;
        let mut inner = Teardown::new("inner");
        inner.attempt("y", async { Err::<(), _>("no") }).await;

        outer.merge(inner);
        assert_eq!(outer.attempted(), 2);
        assert_eq!(outer.failures().len(), 1);
    }
}
