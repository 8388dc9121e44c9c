use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::ReadAt;

/// Shared flag used to abandon a running extraction from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Marker carried inside the I/O error returned after cancellation.
#[derive(Debug)]
struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("read cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Build the error every read returns once its token is cancelled.
///
/// Not `Interrupted`: std read loops retry that kind forever.
pub fn cancelled_error() -> io::Error {
    io::Error::other(Cancelled)
}

/// Whether an I/O error originated from a cancelled read.
pub fn is_cancelled(err: &io::Error) -> bool {
    err.get_ref().is_some_and(|inner| inner.is::<Cancelled>())
}

/// [`ReadAt`] wrapper that fails every read after its token is cancelled.
pub struct CancellableReader<R: ReadAt> {
    inner: R,
    token: CancelToken,
}

impl<R: ReadAt> CancellableReader<R> {
    pub fn new(inner: R, token: CancelToken) -> Self {
        Self { inner, token }
    }
}

impl<R: ReadAt> ReadAt for CancellableReader<R> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if self.token.is_cancelled() {
            return Err(cancelled_error());
        }
        self.inner.read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_pass_through_until_cancelled() {
        let token = CancelToken::new();
        let reader = CancellableReader::new(b"abc".to_vec(), token.clone());
        let mut buf = [0u8; 3];
        assert_eq!(reader.read_at(0, &mut buf).unwrap(), 3);

        token.cancel();
        let err = reader.read_at(0, &mut buf).unwrap_err();
        assert!(is_cancelled(&err));
    }

    #[test]
    fn plain_errors_are_not_cancellation() {
        let err = io::Error::other("boom");
        assert!(!is_cancelled(&err));
    }
}
