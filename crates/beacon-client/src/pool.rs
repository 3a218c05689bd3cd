//! A pool of reusable datagram buffers.  Sends and receives are
//! frequent and fixed-size, so buffers are recycled rather than
//! allocated per datagram.  Returning a buffer is handled by the
//! guard's `Drop`, which runs on every exit path.

use bytes::BytesMut;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

/// Buffer length for outgoing multicast datagrams.
pub const SEND_BUFFER_LEN: usize = 4096;

/// Shared pool of equally-sized `BytesMut` buffers.
///
/// Cloning the pool gives another handle to the same buffers.
#[derive(Debug, Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    buffer_len: usize,
    free: Mutex<Vec<BytesMut>>,
}

impl BufferPool {
    pub fn new(buffer_len: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                buffer_len,
                free: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Take a zeroed buffer of the pool's length.  The buffer goes
    /// back to the pool when the guard is dropped.
    ///
    /// # Panics
    ///
    /// If the pool mutex has been poisoned.
    pub fn acquire(&self) -> PooledBuffer {
        let mut buffer = self
            .inner
            .free
            .lock()
            .expect("buffer pool mutex poisoned")
            .pop()
            .unwrap_or_else(|| BytesMut::with_capacity(self.inner.buffer_len));
        buffer.clear();
        buffer.resize(self.inner.buffer_len, 0);

        PooledBuffer {
            buffer: Some(buffer),
            pool: Arc::clone(&self.inner),
        }
    }
}

/// A buffer on loan from a `BufferPool`.
#[derive(Debug)]
pub struct PooledBuffer {
    buffer: Option<BytesMut>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        self.buffer.as_ref().expect("buffer taken")
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut BytesMut {
        self.buffer.as_mut().expect("buffer taken")
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            if let Ok(mut free) = self.pool.free.lock() {
                free.push(buffer);
            }
        }
    }
}
