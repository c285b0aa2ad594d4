// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Command-line entry point.
//!
//! With a file argument, runs the script and prints its output. Without
//! one, reads commands interactively from stdin, printing results after
//! each line.

use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use repcrec::engine::Session;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let result = match args.get(1) {
        Some(path) => run_file(path),
        None => run_interactive(),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_file(path: &str) -> io::Result<()> {
    let file = File::open(path)?;
    let mut session = Session::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in BufReader::new(file).lines() {
        for printed in session.feed_line(&line?) {
            writeln!(out, "{printed}")?;
        }
    }
    Ok(())
}

fn run_interactive() -> io::Result<()> {
    let stdin = io::stdin();
    let mut session = Session::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in stdin.lock().lines() {
        for printed in session.feed_line(&line?) {
            writeln!(out, "{printed}")?;
        }
        out.flush()?;
    }
    Ok(())
}
