use std::io::{self, Read};
use std::thread::{self, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Cooperative stop request shared by the scheduler and its signal sources.
///
/// Polling never blocks. Any number of sources may trigger it; the first
/// one wins and later triggers are no-ops.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token for async signal sources such as a Ctrl+C task.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Reads `input` byte by byte and cancels on the first line break
    /// (`\n` or a bare `\r`).
    ///
    /// Returns without cancelling on end of input or a read error.
    pub fn listen<R: Read>(&self, input: R) {
        for byte in input.bytes() {
            match byte {
                Ok(b'\n' | b'\r') => {
                    log::info!("stop requested from control input");
                    self.cancel();
                    return;
                }
                Ok(_) => {}
                Err(err) => {
                    log::debug!("control input closed: {err}");
                    return;
                }
            }
        }
    }

    /// Starts a detached thread listening on stdin.
    pub fn spawn_stdin_listener(&self) -> io::Result<JoinHandle<()>> {
        let signal = self.clone();
        thread::Builder::new()
            .name("radcore-stdin".into())
            .spawn(move || signal.listen(io::stdin().lock()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn newline_cancels() {
        let signal = CancelSignal::new();
        signal.listen(Cursor::new(b"abc\nmore".to_vec()));
        assert!(signal.is_cancelled());
    }

    #[test]
    fn bare_carriage_return_cancels() {
        let signal = CancelSignal::new();
        signal.listen(Cursor::new(b"\r".to_vec()));
        assert!(signal.is_cancelled());
    }

    #[test]
    fn eof_without_newline_does_not_cancel() {
        let signal = CancelSignal::new();
        signal.listen(Cursor::new(b"abc".to_vec()));
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let signal = CancelSignal::new();
        let other = signal.clone();
        other.token().cancel();
        assert!(signal.is_cancelled());
    }
}
