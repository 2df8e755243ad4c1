//! Replay of recorded events through the classifiers of one workload.
//!
//! An event file has one event per line:
//!
//! ```text
//! # comment
//! pkt <ifindex> <frame as hex>
//! sys <pid>
//! exit <pid>
//! ```

use std::str::FromStr;

use anyhow::{Context, Result};
use guard_common::Pid;
use l4_firewall::{Packet, Verdict};
use serde::Serialize;
use syscall_counter::TraceOutcome;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::manager::GuardManager;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Packet { ifindex: u32, frame: Vec<u8> },
    SysEnter(Pid),
    Exit(Pid),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventParseError {
    #[error("unknown event {0:?}")]
    UnknownEvent(String),
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid {field} {value:?}")]
    Invalid { field: &'static str, value: String },
    #[error("invalid frame: {0}")]
    Frame(#[from] hex::FromHexError),
    #[error("unexpected {0:?} after the event")]
    Trailing(String),
}

impl Event {
    /// Parse one line. Blank lines and comments are `None`.
    pub fn parse_line(line: &str) -> Result<Option<Event>, EventParseError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let mut fields = line.split_whitespace();
        let kind = fields.next().unwrap_or_default();
        let event = match kind {
            "pkt" => {
                let ifindex = field(&mut fields, "ifindex")?;
                let frame = fields.next().ok_or(EventParseError::Missing("frame"))?;
                Event::Packet {
                    ifindex,
                    frame: hex::decode(frame)?,
                }
            }
            "sys" => Event::SysEnter(pid(&mut fields)?),
            "exit" => Event::Exit(pid(&mut fields)?),
            other => return Err(EventParseError::UnknownEvent(other.to_string())),
        };
        match fields.next() {
            Some(extra) => Err(EventParseError::Trailing(extra.to_string())),
            None => Ok(Some(event)),
        }
    }
}

fn field<'a, T: FromStr>(
    fields: &mut impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<T, EventParseError> {
    let value = fields.next().ok_or(EventParseError::Missing(name))?;
    value.parse().map_err(|_| EventParseError::Invalid {
        field: name,
        value: value.to_string(),
    })
}

fn pid<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Result<Pid, EventParseError> {
    let raw: i32 = field(fields, "pid")?;
    if raw <= 0 {
        return Err(EventParseError::Invalid {
            field: "pid",
            value: raw.to_string(),
        });
    }
    Ok(Pid::from_raw(raw))
}

/// What a replay did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub packets: u64,
    pub forwarded: u64,
    pub dropped: u64,
    pub syscalls: u64,
    pub counted_syscalls: u64,
    pub exits: u64,
    /// Line numbers (1-based) and errors of the lines that were skipped.
    pub bad_lines: Vec<(usize, String)>,
}

/// Deliver one event to the classifiers of `workload`.
pub fn deliver(manager: &GuardManager, workload: &str, event: &Event, summary: &mut ReplaySummary) {
    match event {
        Event::Packet { ifindex, frame } => {
            summary.packets += 1;
            // without a firewall every packet goes through
            let verdict = manager
                .firewall(workload)
                .map_or(Verdict::Forward, |firewall| {
                    firewall.classify(&Packet::new(*ifindex, frame)).verdict()
                });
            match verdict {
                Verdict::Forward => summary.forwarded += 1,
                Verdict::Drop => summary.dropped += 1,
            }
        }
        Event::SysEnter(pid) => {
            summary.syscalls += 1;
            let outcome = manager
                .syscall_counter(workload)
                .map_or(TraceOutcome::Untracked, |counter| counter.on_sys_enter(*pid));
            if let TraceOutcome::Counted(_) = outcome {
                summary.counted_syscalls += 1;
            }
        }
        Event::Exit(pid) => {
            summary.exits += 1;
            manager.process_exited(*pid);
        }
    }
}

/// Replay every event read from `reader`. Bad lines are logged and skipped.
pub async fn replay<R>(manager: &GuardManager, workload: &str, reader: R) -> Result<ReplaySummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = ReplaySummary::default();
    let mut lines = reader.lines();
    let mut line_number = 0;
    while let Some(line) = lines.next_line().await.context("Error reading events")? {
        line_number += 1;
        match Event::parse_line(&line) {
            Ok(Some(event)) => deliver(manager, workload, &event, &mut summary),
            Ok(None) => {}
            Err(err) => {
                log::warn!("line {line_number}: {err}");
                summary.bad_lines.push((line_number, err.to_string()));
            }
        }
    }
    Ok(summary)
}
