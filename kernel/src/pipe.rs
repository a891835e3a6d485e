//! Anonymous pipes (C10): a fixed-capacity ring buffer with separate
//! reader/writer wait queues and SIGPIPE-on-write-to-closed-read-end
//! semantics.

use spin::Mutex;

use crate::config::{MAX_PIPES, PIPE_BUFFER_SIZE};
use crate::error::{KernelError, KernelResult};
use crate::process::signal::SIGPIPE;
use crate::process::wait::WaitQueue;

pub type PipeId = usize;

struct Ring {
    buf: [u8; PIPE_BUFFER_SIZE],
    head: usize,
    len: usize,
}

impl Ring {
    const fn new() -> Self {
        Self { buf: [0; PIPE_BUFFER_SIZE], head: 0, len: 0 }
    }

    fn is_full(&self) -> bool {
        self.len == PIPE_BUFFER_SIZE
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn push(&mut self, byte: u8) {
        let tail = (self.head + self.len) % PIPE_BUFFER_SIZE;
        self.buf[tail] = byte;
        self.len += 1;
    }

    fn pop(&mut self) -> u8 {
        let byte = self.buf[self.head];
        self.head = (self.head + 1) % PIPE_BUFFER_SIZE;
        self.len -= 1;
        byte
    }
}

struct Pipe {
    ring: Ring,
    readers: u32,
    writers: u32,
    /// Stable once allocated; used only to check liveness of `in_use`.
    in_use: bool,
    read_wait: WaitQueue,
    write_wait: WaitQueue,
}

impl Pipe {
    const fn new() -> Self {
        Self {
            ring: Ring::new(),
            readers: 0,
            writers: 0,
            in_use: false,
            read_wait: WaitQueue::new(),
            write_wait: WaitQueue::new(),
        }
    }
}

static PIPES: Mutex<[Pipe; MAX_PIPES]> = Mutex::new([const { Pipe::new() }; MAX_PIPES]);

/// Allocate a fresh pipe with one reader and one writer. Callers install
/// the returned id into two fds via [`crate::fd::install_pipe`].
pub fn create() -> KernelResult<PipeId> {
    let mut pipes = PIPES.lock();
    let id = pipes
        .iter()
        .position(|p| !p.in_use)
        .ok_or(KernelError::ResourceExhausted { resource: "pipe table" })?;
    pipes[id] = Pipe::new();
    pipes[id].in_use = true;
    pipes[id].readers = 1;
    pipes[id].writers = 1;
    Ok(id)
}

/// Read up to `buf.len()` bytes. Blocks on an empty pipe with a live
/// writer; returns `Ok(0)` (EOF) once all writers have closed.
pub fn read(id: PipeId, buf: &mut [u8]) -> KernelResult<usize> {
    loop {
        {
            let mut pipes = PIPES.lock();
            let pipe = &mut pipes[id];
            if !pipe.ring.is_empty() {
                let mut n = 0;
                while n < buf.len() && !pipe.ring.is_empty() {
                    buf[n] = pipe.ring.pop();
                    n += 1;
                }
                drop(pipes);
                PIPES.lock()[id].write_wait.wake_up_all();
                return Ok(n);
            }
            if pipe.writers == 0 {
                return Ok(0);
            }
        }
        PIPES.lock()[id].read_wait.sleep_on();
    }
}

/// Write up to `buf.len()` bytes, blocking on a full pipe with a live
/// reader. Raises SIGPIPE and returns `Err(BrokenPipe)` if no reader
/// remains.
pub fn write(id: PipeId, buf: &[u8]) -> KernelResult<usize> {
    let mut written = 0;
    while written < buf.len() {
        {
            let mut pipes = PIPES.lock();
            let pipe = &mut pipes[id];
            if pipe.readers == 0 {
                drop(pipes);
                crate::process::signal::raise_on_current(SIGPIPE);
                return Err(KernelError::BrokenPipe);
            }
            while written < buf.len() && !pipe.ring.is_full() {
                pipe.ring.push(buf[written]);
                written += 1;
            }
            if written == buf.len() {
                drop(pipes);
                PIPES.lock()[id].read_wait.wake_up_all();
                return Ok(written);
            }
        }
        PIPES.lock()[id].read_wait.wake_up_all();
        PIPES.lock()[id].write_wait.sleep_on();
    }
    Ok(written)
}

/// Decrement the reader count; wake any writers blocked on a full buffer
/// so they observe `readers == 0` and fail with `BrokenPipe`.
pub fn close_reader(id: PipeId) {
    let mut pipes = PIPES.lock();
    if pipes[id].readers > 0 {
        pipes[id].readers -= 1;
    }
    let done = pipes[id].readers == 0 && pipes[id].writers == 0;
    drop(pipes);
    PIPES.lock()[id].write_wait.wake_up_all();
    if done {
        reclaim(id);
    }
}

/// Decrement the writer count; wake any readers blocked on an empty
/// buffer so they observe EOF.
pub fn close_writer(id: PipeId) {
    let mut pipes = PIPES.lock();
    if pipes[id].writers > 0 {
        pipes[id].writers -= 1;
    }
    let done = pipes[id].readers == 0 && pipes[id].writers == 0;
    drop(pipes);
    PIPES.lock()[id].read_wait.wake_up_all();
    if done {
        reclaim(id);
    }
}

fn reclaim(id: PipeId) {
    PIPES.lock()[id].in_use = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn pipe_round_trips_bytes() {
        let id = create().unwrap();
        let n = write(id, b"hi").unwrap();
        assert_eq!(n, 2);
        let mut out = [0u8; 8];
        let n = read(id, &mut out).unwrap();
        assert_eq!(&out[..n], b"hi");
        close_writer(id);
        close_reader(id);
    }

    #[test_case]
    fn read_returns_eof_after_writer_closes() {
        let id = create().unwrap();
        close_writer(id);
        let mut out = [0u8; 4];
        assert_eq!(read(id, &mut out).unwrap(), 0);
        close_reader(id);
    }
}
