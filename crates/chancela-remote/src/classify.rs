// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport failure classification.
//
// Structured data first: reqwest's timeout/connect flags and any
// `std::io::Error` in the source chain. Only when those say nothing is the
// rendered error text matched, and anything unrecognised lands in
// `TransportFailure::Unexpected` with the raw text kept as detail.

use std::error::Error as StdError;
use std::io;

use chancela_core::error::{ChancelaError, TransportFailure};
use tracing::error;

/// Classify a failed request and log it with full detail.
pub fn transport_error(err: &reqwest::Error) -> ChancelaError {
    let detail = render_chain(err);
    let kind = classify_transport(err, &detail);
    error!(kind = %kind, detail = %detail, "request failed");
    ChancelaError::transport(kind, detail)
}

fn classify_transport(err: &reqwest::Error, detail: &str) -> TransportFailure {
    if err.is_timeout() {
        return TransportFailure::TimedOut;
    }
    if let Some(kind) = io_kind(err).and_then(classify_io_kind) {
        return kind;
    }
    match classify_transport_text(detail) {
        TransportFailure::Unexpected if err.is_connect() => TransportFailure::ConnectionRefused,
        kind => kind,
    }
}

fn io_kind(err: &reqwest::Error) -> Option<io::ErrorKind> {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(current) = source {
        if let Some(io_err) = current.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = current.source();
    }
    None
}

fn classify_io_kind(kind: io::ErrorKind) -> Option<TransportFailure> {
    match kind {
        io::ErrorKind::TimedOut => Some(TransportFailure::TimedOut),
        io::ErrorKind::ConnectionRefused => Some(TransportFailure::ConnectionRefused),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
            Some(TransportFailure::ConnectionReset)
        }
        io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
            Some(TransportFailure::NoRoute)
        }
        _ => None,
    }
}

/// Best-effort classification of failure text from a library that exposes
/// nothing structured.
pub fn classify_transport_text(detail: &str) -> TransportFailure {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("o route to host")
        || lower.contains("network is unreachable")
        || lower.contains("host is unreachable")
    {
        TransportFailure::NoRoute
    } else if lower.contains("connection refused")
        || lower.contains("unknownhost")
        || lower.contains("unknown host")
        || lower.contains("dns error")
        || lower.contains("failed to lookup")
        || lower.contains("name or service not known")
    {
        TransportFailure::ConnectionRefused
    } else if lower.contains("timed out") || lower.contains("timeout") {
        TransportFailure::TimedOut
    } else if lower.contains("connection reset") || lower.contains("broken pipe") {
        TransportFailure::ConnectionReset
    } else {
        TransportFailure::Unexpected
    }
}

/// `outer: inner: innermost`, the way the failure reads end to end.
fn render_chain(err: &reqwest::Error) -> String {
    let mut rendered = err.to_string();
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(current) = source {
        let text = current.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = current.source();
    }
    rendered
}
