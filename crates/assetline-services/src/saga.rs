//! Ordered multi-store sequences
//!
//! A [`Saga`] runs named steps in order and logs each one, so an interrupted run
//! can be picked up from the last completed step. Every step must be safe to
//! repeat. A `Required` failure stops the saga; a `ContinueOnError` failure is
//! remembered, later steps still run, and [`Saga::finish`] reports it.

use std::fmt::Display;
use std::future::Future;

use assetline_core::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    Required,
    ContinueOnError,
}

#[derive(Debug)]
pub struct Saga {
    name: &'static str,
    subject: String,
    completed: Vec<&'static str>,
    deferred: Vec<(&'static str, AppError)>,
}

impl Saga {
    pub fn new(name: &'static str, subject: impl Display) -> Self {
        Self {
            name,
            subject: subject.to_string(),
            completed: Vec::new(),
            deferred: Vec::new(),
        }
    }

    /// Run one step. `Ok(None)` means a `ContinueOnError` step failed.
    pub async fn step<T, F>(
        &mut self,
        step: &'static str,
        policy: StepPolicy,
        fut: F,
    ) -> Result<Option<T>, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        tracing::debug!(saga = self.name, subject = %self.subject, step, "Saga step started");

        match fut.await {
            Ok(value) => {
                tracing::debug!(saga = self.name, subject = %self.subject, step, "Saga step completed");
                self.completed.push(step);
                Ok(Some(value))
            }
            Err(e) if policy == StepPolicy::ContinueOnError => {
                tracing::warn!(
                    saga = self.name,
                    subject = %self.subject,
                    step,
                    error = %e,
                    "Saga step failed, continuing"
                );
                self.deferred.push((step, e));
                Ok(None)
            }
            Err(e) => {
                tracing::error!(
                    saga = self.name,
                    subject = %self.subject,
                    step,
                    completed = ?self.completed,
                    error = %e,
                    "Saga step failed, stopping"
                );
                Err(e)
            }
        }
    }

    /// A `Required` step that hands back its value.
    pub async fn required<T, F>(&mut self, step: &'static str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        self.step(step, StepPolicy::Required, fut)
            .await?
            .ok_or_else(|| AppError::Internal(format!("saga step '{}' produced no value", step)))
    }

    pub fn completed_steps(&self) -> &[&'static str] {
        &self.completed
    }

    /// First deferred failure, if any step was allowed to fail.
    pub fn finish(self) -> Result<(), AppError> {
        let mut deferred = self.deferred.into_iter();
        match deferred.next() {
            None => {
                tracing::info!(saga = self.name, subject = %self.subject, steps = ?self.completed, "Saga finished");
                Ok(())
            }
            Some((step, err)) => {
                for (other, e) in deferred {
                    tracing::warn!(saga = self.name, step = other, error = %e, "Additional deferred saga failure");
                }
                tracing::warn!(saga = self.name, subject = %self.subject, step, "Saga finished with a deferred failure");
                Err(err)
            }
        }
    }
}
