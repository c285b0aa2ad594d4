// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Command vocabulary and line parser.
//!
//! Thin I/O glue in front of the engine: each input line becomes one
//! [`Command`] value. Malformed lines are reported by the caller and
//! skipped without touching engine state; blank lines and `//` comments
//! are skipped silently.

use std::fmt;

use crate::site::SiteId;
use crate::storage::VariableId;
use crate::txn::TxnId;

/// One parsed input command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `begin(Tn)` — start a read-write transaction.
    Begin(TxnId),
    /// `beginRO(Tn)` — start a read-only transaction.
    BeginRo(TxnId),
    /// `R(Tn,xk)` — read variable `k` for transaction `n`.
    Read { txn: TxnId, variable: VariableId },
    /// `W(Tn,xk,v)` — write `v` to variable `k` for transaction `n`.
    Write {
        txn: TxnId,
        variable: VariableId,
        value: i64,
    },
    /// `end(Tn)` — request termination.
    End(TxnId),
    /// `fail(k)` — site `k` fails.
    Fail(SiteId),
    /// `recover(k)` — site `k` recovers.
    Recover(SiteId),
    /// `dump()` — print every site.
    DumpAll,
    /// `dump(xk)` — print one variable across sites.
    DumpVariable(VariableId),
    /// `dump(k)` — print one site.
    DumpSite(SiteId),
}

/// Errors produced while parsing an input line.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unrecognized command: {0}")]
    Unrecognized(String),
    #[error("malformed arguments: {0}")]
    Malformed(String),
}

/// Parses one input line.
///
/// Returns `Ok(None)` for blank lines and comments.
pub fn parse_line(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("//") {
        return Ok(None);
    }

    let (name, rest) = line
        .split_once('(')
        .ok_or_else(|| ParseError::Unrecognized(line.to_string()))?;
    let args = rest
        .strip_suffix(')')
        .ok_or_else(|| ParseError::Malformed(line.to_string()))?;
    let args: Vec<&str> = if args.trim().is_empty() {
        Vec::new()
    } else {
        args.split(',').map(str::trim).collect()
    };

    let malformed = || ParseError::Malformed(line.to_string());
    match name.trim() {
        "begin" => Ok(Some(Command::Begin(one_txn(&args).ok_or_else(malformed)?))),
        "beginRO" => Ok(Some(Command::BeginRo(one_txn(&args).ok_or_else(malformed)?))),
        "end" => Ok(Some(Command::End(one_txn(&args).ok_or_else(malformed)?))),
        "R" => match args.as_slice() {
            [t, x] => Ok(Some(Command::Read {
                txn: txn_id(t).ok_or_else(malformed)?,
                variable: variable_id(x).ok_or_else(malformed)?,
            })),
            _ => Err(malformed()),
        },
        "W" => match args.as_slice() {
            [t, x, v] => Ok(Some(Command::Write {
                txn: txn_id(t).ok_or_else(malformed)?,
                variable: variable_id(x).ok_or_else(malformed)?,
                value: v.parse().map_err(|_| malformed())?,
            })),
            _ => Err(malformed()),
        },
        "fail" => Ok(Some(Command::Fail(one_site(&args).ok_or_else(malformed)?))),
        "recover" => Ok(Some(Command::Recover(
            one_site(&args).ok_or_else(malformed)?,
        ))),
        "dump" => match args.as_slice() {
            [] => Ok(Some(Command::DumpAll)),
            [arg] if arg.starts_with('x') => Ok(Some(Command::DumpVariable(
                variable_id(arg).ok_or_else(malformed)?,
            ))),
            [arg] => Ok(Some(Command::DumpSite(site_id(arg).ok_or_else(malformed)?))),
            _ => Err(malformed()),
        },
        _ => Err(ParseError::Unrecognized(line.to_string())),
    }
}

fn one_txn(args: &[&str]) -> Option<TxnId> {
    match args {
        [t] => txn_id(t),
        _ => None,
    }
}

fn one_site(args: &[&str]) -> Option<SiteId> {
    match args {
        [s] => site_id(s),
        _ => None,
    }
}

fn txn_id(arg: &str) -> Option<TxnId> {
    arg.strip_prefix('T')
        .unwrap_or(arg)
        .parse()
        .ok()
        .map(TxnId)
}

fn variable_id(arg: &str) -> Option<VariableId> {
    arg.strip_prefix('x')?.parse().ok().map(VariableId)
}

fn site_id(arg: &str) -> Option<SiteId> {
    arg.parse().ok().map(SiteId)
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Begin(t) => write!(f, "begin({t})"),
            Command::BeginRo(t) => write!(f, "beginRO({t})"),
            Command::Read { txn, variable } => write!(f, "R({txn},{variable})"),
            Command::Write {
                txn,
                variable,
                value,
            } => write!(f, "W({txn},{variable},{value})"),
            Command::End(t) => write!(f, "end({t})"),
            Command::Fail(s) => write!(f, "fail({s})"),
            Command::Recover(s) => write!(f, "recover({s})"),
            Command::DumpAll => write!(f, "dump()"),
            Command::DumpVariable(v) => write!(f, "dump({v})"),
            Command::DumpSite(s) => write!(f, "dump({s})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lifecycle_commands() {
        assert_eq!(
            parse_line("begin(T1)").unwrap(),
            Some(Command::Begin(TxnId(1)))
        );
        assert_eq!(
            parse_line("beginRO(T7)").unwrap(),
            Some(Command::BeginRo(TxnId(7)))
        );
        assert_eq!(parse_line("end(T1)").unwrap(), Some(Command::End(TxnId(1))));
    }

    #[test]
    fn test_parse_read_write() {
        assert_eq!(
            parse_line("R(T2,x4)").unwrap(),
            Some(Command::Read {
                txn: TxnId(2),
                variable: VariableId(4),
            })
        );
        assert_eq!(
            parse_line("W(T1, x6, 101)").unwrap(),
            Some(Command::Write {
                txn: TxnId(1),
                variable: VariableId(6),
                value: 101,
            })
        );
        assert_eq!(
            parse_line("W(T1,x6,-5)").unwrap(),
            Some(Command::Write {
                txn: TxnId(1),
                variable: VariableId(6),
                value: -5,
            })
        );
    }

    #[test]
    fn test_parse_site_commands() {
        assert_eq!(parse_line("fail(3)").unwrap(), Some(Command::Fail(SiteId(3))));
        assert_eq!(
            parse_line("recover(10)").unwrap(),
            Some(Command::Recover(SiteId(10)))
        );
    }

    #[test]
    fn test_parse_dump_forms() {
        assert_eq!(parse_line("dump()").unwrap(), Some(Command::DumpAll));
        assert_eq!(
            parse_line("dump(x12)").unwrap(),
            Some(Command::DumpVariable(VariableId(12)))
        );
        assert_eq!(
            parse_line("dump(5)").unwrap(),
            Some(Command::DumpSite(SiteId(5)))
        );
    }

    #[test]
    fn test_blank_and_comment_lines_skipped() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("// a comment").unwrap(), None);
    }

    #[test]
    fn test_unrecognized_and_malformed() {
        assert!(matches!(
            parse_line("frobnicate(T1)"),
            Err(ParseError::Unrecognized(_))
        ));
        assert!(matches!(parse_line("hello"), Err(ParseError::Unrecognized(_))));
        assert!(matches!(
            parse_line("R(T1)"),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_line("W(T1,x2)"),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_line("begin(T1"),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_line("W(T1,x2,abc)"),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_display_roundtrip() {
        for line in ["begin(T1)", "R(T2,x4)", "W(T1,x6,101)", "dump()", "dump(x3)"] {
            let cmd = parse_line(line).unwrap().unwrap();
            assert_eq!(parse_line(&cmd.to_string()).unwrap(), Some(cmd));
        }
    }
}
