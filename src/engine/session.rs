// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Line-oriented driver around the coordinator.

use std::io::BufRead;

use tracing::warn;

use crate::command::{parse_line, ParseError};

use super::coordinator::Coordinator;
use super::error::EngineError;

/// Feeds raw input lines to a [`Coordinator`] and collects printable
/// output.
///
/// Bad input never poisons the engine: an unparseable or semantically
/// invalid line is turned into a diagnostic output line and the session
/// keeps going, which lets scripted runs report every problem instead of
/// dying on the first one.
#[derive(Debug, Default)]
pub struct Session {
    coordinator: Coordinator,
}

impl Session {
    /// Creates a session over a default-topology coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session over an existing coordinator.
    pub fn with_coordinator(coordinator: Coordinator) -> Self {
        Self { coordinator }
    }

    /// Returns the underlying coordinator.
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Processes one input line and returns the lines to print for it.
    pub fn feed_line(&mut self, line: &str) -> Vec<String> {
        let cmd = match parse_line(line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => return Vec::new(),
            Err(ParseError::Unrecognized(l)) => {
                warn!(line = %l, "unrecognized command");
                return vec![format!("Operation not recognized: {l}")];
            }
            Err(e @ ParseError::Malformed(_)) => {
                warn!(error = %e, "bad input line");
                return vec![format!("error: {e}")];
            }
        };
        match self.coordinator.execute(&cmd) {
            Ok(()) => self.coordinator.drain_output(),
            Err(e) => {
                warn!(error = %e, command = %cmd, "command rejected");
                let mut out = self.coordinator.drain_output();
                out.push(format!("error: {e}"));
                out
            }
        }
    }

    /// Drives the session from a buffered reader until EOF, returning
    /// every output line in order.
    pub fn run<R: BufRead>(&mut self, reader: R) -> Result<Vec<String>, EngineError> {
        let mut out = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(EngineError::from)?;
            out.extend(self.feed_line(&line));
        }
        Ok(out)
    }
}
