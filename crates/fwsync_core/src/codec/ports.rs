//! Port set text codec.
//!
//! Canonical form: ascending, comma-joined; maximal runs of three or more
//! consecutive ports collapse to `start-end`, shorter runs stay as single
//! numbers. Decoding drops tokens that are neither a port nor a range.

use std::collections::BTreeSet;

const MIN_RANGE_RUN: usize = 3;

/// Encodes a port set into its canonical text form.
pub fn encode_ports<I>(ports: I) -> String
where
    I: IntoIterator<Item = u16>,
{
    let sorted: BTreeSet<u16> = ports.into_iter().collect();
    let mut tokens = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return String::new();
    };

    let mut run_start = first;
    let mut run_end = first;
    for port in iter {
        if u32::from(port) == u32::from(run_end) + 1 {
            run_end = port;
            continue;
        }
        push_run(&mut tokens, run_start, run_end);
        run_start = port;
        run_end = port;
    }
    push_run(&mut tokens, run_start, run_end);

    tokens.join(",")
}

fn push_run(tokens: &mut Vec<String>, start: u16, end: u16) {
    let len = usize::from(end - start) + 1;
    if len >= MIN_RANGE_RUN {
        tokens.push(format!("{start}-{end}"));
    } else {
        tokens.extend((start..=end).map(|port| port.to_string()));
    }
}

/// Decodes canonical (or loosely formatted) port text into a sorted set.
///
/// Never fails: malformed tokens and reversed ranges are skipped.
pub fn decode_ports(value: &str) -> BTreeSet<u16> {
    let mut ports = BTreeSet::new();
    for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once('-') {
            Some((start, end)) => {
                let (Ok(start), Ok(end)) = (start.trim().parse::<u16>(), end.trim().parse::<u16>())
                else {
                    continue;
                };
                if start <= end {
                    ports.extend(start..=end);
                }
            }
            None => {
                if let Ok(port) = token.parse::<u16>() {
                    ports.insert(port);
                }
            }
        }
    }
    ports
}
