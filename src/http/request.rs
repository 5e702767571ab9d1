//! Request-line parsing and header draining.
//!
//! Only the first line of a request matters. Headers are read and discarded
//! until a blank line, bounded by a line count and a byte budget so a client
//! that never terminates its request cannot hold the loop.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::debug;

use crate::errors::ConnectionFault;

// ---

/// Header lines drained after the request line before giving up.
pub const MAX_HEADER_LINES: usize = 64;

/// Total bytes read for one request, request line included.
pub const MAX_REQUEST_BYTES: usize = 8 * 1024;

/// One parsed inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    // ---
    /// Target path without the query string.
    pub path: String,

    /// Portion of the target after `?`, if any.
    pub query: Option<String>,

    /// `false` for the root dashboard, `true` for every other path.
    pub is_resource_request: bool,
}

impl Request {
    // ---
    pub fn dashboard() -> Self {
        // ---
        Request {
            path: String::from("/"),
            query: None,
            is_resource_request: false,
        }
    }

    /// Parse a raw request line such as `GET /favicon.ico HTTP/1.1\r\n`.
    ///
    /// Lines of at most one byte, lines without a target token, non-ASCII
    /// targets and the bare root `/` all select the dashboard. The method and
    /// version tokens are ignored.
    pub fn parse(first_line: &[u8]) -> Self {
        // ---
        if first_line.len() <= 1 {
            return Request::dashboard();
        }

        let target = first_line
            .split(|b| b.is_ascii_whitespace())
            .filter(|token| !token.is_empty())
            .nth(1);
        let Some(target) = target else {
            return Request::dashboard();
        };
        let Ok(target) = std::str::from_utf8(target) else {
            debug!("Request target is not ASCII, serving dashboard");
            return Request::dashboard();
        };
        if !target.is_ascii() {
            debug!("Request target is not ASCII, serving dashboard");
            return Request::dashboard();
        }

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };

        Request {
            path: path.to_string(),
            query,
            is_resource_request: path != "/",
        }
    }
}

/// Read the request line, then drain headers until a blank line, EOF, or a limit.
pub async fn read_request<R>(reader: &mut R) -> Result<Request, ConnectionFault>
where
    R: AsyncBufRead + Unpin,
{
    // ---
    let mut budget = MAX_REQUEST_BYTES;
    let first_line = read_line(reader, &mut budget).await?;
    let request = Request::parse(&first_line);

    let mut drained = 0;
    loop {
        if budget == 0 {
            debug!(drained, "Request byte budget spent, ignoring remaining headers");
            break;
        }
        if drained == MAX_HEADER_LINES {
            debug!(drained, "Header line limit reached, ignoring remaining headers");
            break;
        }

        let line = read_line(reader, &mut budget).await?;
        if line.is_empty() || line == b"\r\n" || line == b"\n" {
            break;
        }
        drained += 1;
    }

    Ok(request)
}

async fn read_line<R>(reader: &mut R, budget: &mut usize) -> Result<Vec<u8>, ConnectionFault>
where
    R: AsyncBufRead + Unpin,
{
    // ---
    let mut line = Vec::new();
    let mut limited = (&mut *reader).take(*budget as u64);
    let n = limited
        .read_until(b'\n', &mut line)
        .await
        .map_err(ConnectionFault::Read)?;
    *budget = budget.saturating_sub(n);
    Ok(line)
}
