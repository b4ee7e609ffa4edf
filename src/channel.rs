//! The one-byte pipe that carries the container program's exit status from
//! the in-namespace init back to the waiting launcher parent.

use std::io::{self, Read, Write};

use anyhow::{Context, Result};
use mio::unix::pipe::{self, Receiver, Sender};

pub struct ExitPipe {
    sender: Option<Sender>,
    receiver: Option<Receiver>,
}

impl ExitPipe {
    pub fn new() -> Result<Self> {
        let (sender, receiver) = pipe::new().context("failed to create the exit status pipe")?;
        // The launcher blocks until the status arrives, so the read side
        // must not be nonblocking (the mio default).
        receiver
            .set_nonblocking(false)
            .context("failed to set the exit pipe to blocking")?;
        Ok(Self {
            sender: Some(sender),
            receiver: Some(receiver),
        })
    }

    /// Drops the write end. The reading process calls this after the fork
    /// so a dead writer shows up as end of file instead of a hang.
    pub fn close_sender(&mut self) {
        self.sender.take();
    }

    pub fn close_receiver(&mut self) {
        self.receiver.take();
    }

    pub fn send_exit_code(&mut self, code: u8) -> Result<()> {
        let sender = self
            .sender
            .as_mut()
            .context("exit pipe write end already closed")?;
        sender
            .write_all(&[code])
            .context("failed to write the exit status")?;
        Ok(())
    }

    /// Blocks for the single status byte. read_exact retries EINTR on its
    /// own. A writer that died without reporting reads as 0, matching an
    /// init that left because its namespace emptied out.
    pub fn wait_exit_code(&mut self) -> Result<u8> {
        let receiver = self
            .receiver
            .as_mut()
            .context("exit pipe read end already closed")?;
        let mut buf = [0u8; 1];
        match receiver.read_exact(&mut buf) {
            Ok(()) => Ok(buf[0]),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
            Err(e) => Err(e).context("failed to read the exit status"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_one_byte() -> Result<()> {
        let mut pipe = ExitPipe::new()?;
        pipe.send_exit_code(7)?;
        assert_eq!(pipe.wait_exit_code()?, 7);
        Ok(())
    }

    #[test]
    fn closed_writer_reads_as_zero() -> Result<()> {
        let mut pipe = ExitPipe::new()?;
        pipe.close_sender();
        assert_eq!(pipe.wait_exit_code()?, 0);
        Ok(())
    }

    #[test]
    fn sending_after_close_is_an_error() -> Result<()> {
        let mut pipe = ExitPipe::new()?;
        pipe.close_sender();
        assert!(pipe.send_exit_code(1).is_err());
        Ok(())
    }
}
