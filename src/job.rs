// src/job.rs

//! Notifications toward the host runtime
//!
//! Every operation reports through a `Job`: zero or more package events, at
//! most one error, then exactly one "finished" signal. The finished signal is
//! sent when the job is finished explicitly or dropped, whichever comes first.

use crate::error::JobError;
use crate::query::PackageEvent;
use tracing::{debug, warn};

/// Receiver of job notifications, implemented by the host
pub trait JobSink {
    fn package(&mut self, event: &PackageEvent);
    fn error(&mut self, error: &JobError);
    fn finished(&mut self);
}

/// One running operation bound to a sink
pub struct Job<'a, S: JobSink + ?Sized> {
    sink: &'a mut S,
    error_reported: bool,
    finished: bool,
}

impl<'a, S: JobSink + ?Sized> Job<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self {
            sink,
            error_reported: false,
            finished: false,
        }
    }

    /// Forward a package event; ignored once an error was reported
    pub fn package(&mut self, event: &PackageEvent) {
        if self.error_reported {
            debug!("Dropping package {} after error", event.id);
            return;
        }
        self.sink.package(event);
    }

    /// Forward every event of a sequence, returning how many were sent
    pub fn packages<I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = PackageEvent>,
    {
        let mut count = 0;
        for event in events {
            self.package(&event);
            count += 1;
        }
        count
    }

    /// Report a failure; only the first one reaches the sink
    pub fn error(&mut self, error: &JobError) {
        if self.error_reported {
            warn!("Suppressing additional error: {}", error);
            return;
        }
        self.error_reported = true;
        self.sink.error(error);
    }

    pub fn has_error(&self) -> bool {
        self.error_reported
    }

    /// Signal completion and consume the job
    pub fn finish(mut self) {
        self.signal_finished();
    }

    fn signal_finished(&mut self) {
        if !self.finished {
            self.finished = true;
            self.sink.finished();
        }
    }
}

impl<S: JobSink + ?Sized> Drop for Job<'_, S> {
    fn drop(&mut self) {
        self.signal_finished();
    }
}

/// Sink that keeps every notification in memory
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub packages: Vec<PackageEvent>,
    pub errors: Vec<JobError>,
    pub finished: usize,
}

impl JobSink for RecordingSink {
    fn package(&mut self, event: &PackageEvent) {
        self.packages.push(event.clone());
    }

    fn error(&mut self, error: &JobError) {
        self.errors.push(error.clone());
    }

    fn finished(&mut self) {
        self.finished += 1;
    }
}
