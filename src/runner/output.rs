//! Writing command output to stdout.

use std::io::{self, Write};

use anyhow::{Context, Result};

fn is_broken_pipe(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::BrokenPipe
}

fn write_all_ignoring_broken_pipe(writer: &mut impl Write, buf: &[u8]) -> io::Result<()> {
    match writer.write_all(buf) {
        Err(err) if !is_broken_pipe(&err) => Err(err),
        _ => Ok(()),
    }
}

fn flush_ignoring_broken_pipe(writer: &mut impl Write) -> io::Result<()> {
    match writer.flush() {
        Err(err) if !is_broken_pipe(&err) => Err(err),
        _ => Ok(()),
    }
}

/// Write `content` to stdout, treating a closed pipe as success.
///
/// # Errors
///
/// Returns an error when writing or flushing stdout fails for another reason.
pub(super) fn write_stdout(content: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    write_all_ignoring_broken_pipe(&mut stdout, content.as_bytes()).context("writing to stdout")?;
    flush_ignoring_broken_pipe(&mut stdout).context("flushing stdout")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        }
    }

    #[test]
    fn broken_pipes_are_not_errors() {
        assert!(write_all_ignoring_broken_pipe(&mut ClosedPipe, b"x").is_ok());
        assert!(flush_ignoring_broken_pipe(&mut ClosedPipe).is_err());
    }
}
