use std::io;
use std::process::ExitStatus;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Split};
use tokio::process::Child;

/// Which pipe a line of tool output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

type Lines<R> = Option<Split<BufReader<R>>>;

async fn next_line<R: AsyncRead + Unpin>(lines: &mut Lines<R>) -> Option<String> {
    let segment = lines.as_mut()?.next_segment().await.ok().flatten()?;
    let text = String::from_utf8_lossy(&segment);
    Some(text.trim_end_matches('\r').to_owned())
}

/// Feeds every line the child writes on its piped stdout/stderr to `on_line`
/// as it arrives, then waits for the child to exit.
///
/// Both pipes are drained concurrently so a chatty tool never blocks on a
/// full pipe buffer. Invalid UTF-8 is replaced rather than treated as an error.
pub async fn drain_output(
    child: &mut Child,
    mut on_line: impl FnMut(Stream, &str),
) -> io::Result<ExitStatus> {
    let mut stdout = child.stdout.take().map(|s| BufReader::new(s).split(b'\n'));
    let mut stderr = child.stderr.take().map(|s| BufReader::new(s).split(b'\n'));

    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            line = next_line(&mut stdout), if stdout.is_some() => match line {
                Some(line) => on_line(Stream::Stdout, &line),
                None => stdout = None,
            },
            line = next_line(&mut stderr), if stderr.is_some() => match line {
                Some(line) => on_line(Stream::Stderr, &line),
                None => stderr = None,
            },
        }
    }

    child.wait().await
}

/// Picks the most useful diagnostic from a tool's stderr: the last line
/// starting with `ERROR`, else the last non-empty line.
#[derive(Debug, Default)]
pub struct LastError {
    error: Option<String>,
    last: Option<String>,
}

impl LastError {
    pub fn push(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if line.starts_with("ERROR") {
            self.error = Some(line.to_owned());
        }
        self.last = Some(line.to_owned());
    }

    pub fn into_message(self) -> Option<String> {
        self.error.or(self.last)
    }
}
