//! File-descriptor table (C9): per-process small-integer handles over a
//! global pool of shared open-file objects.

use spin::Mutex;

use crate::config::{MAX_FDS, MAX_OPEN_FILES};
use crate::error::{FsError, KernelError, KernelResult, SyscallError};
use crate::pipe::PipeId;
use crate::process::pcb::FD_EMPTY;
use crate::process::table::PROCESS_TABLE;
use crate::vfs;

#[derive(Clone, Copy)]
pub enum OpenFileKind {
    File { inode: u32, offset: usize },
    Pipe { id: PipeId, writing: bool },
    /// Console stdio (fd 0/1/2), backed by the serial collaborator.
    Console,
}

pub struct OpenFile {
    pub kind: OpenFileKind,
    pub refcount: u32,
}

struct Pool {
    slots: [Option<OpenFile>; MAX_OPEN_FILES],
}

impl Pool {
    const fn new() -> Self {
        Self { slots: [const { None }; MAX_OPEN_FILES] }
    }
}

static POOL: Mutex<Pool> = Mutex::new(Pool::new());

fn pool_alloc(file: OpenFile) -> KernelResult<usize> {
    let mut pool = POOL.lock();
    let index = pool
        .slots
        .iter()
        .position(|s| s.is_none())
        .ok_or(KernelError::SyscallError(SyscallError::TooManyOpenFiles))?;
    pool.slots[index] = Some(file);
    Ok(index)
}

/// Allocate the lowest unused fd in `process_index`'s table, bound to a
/// fresh pool entry of `kind`.
pub fn alloc_fd(process_index: usize, kind: OpenFileKind) -> KernelResult<i32> {
    let pool_index = pool_alloc(OpenFile { kind, refcount: 1 })?;
    let mut table = PROCESS_TABLE.lock();
    let slot = table.slots[process_index]
        .alloc_fd()
        .ok_or(KernelError::SyscallError(SyscallError::TooManyOpenFiles))?;
    table.slots[process_index].fds[slot] = pool_index as i32;
    Ok(slot as i32)
}

/// Bind fd 0/1/2 to the console for a newly created process.
pub fn bind_console_stdio(pid: u32) {
    let index = match PROCESS_TABLE.lock().find_index(pid) {
        Some(i) => i,
        None => return,
    };
    for _ in 0..3 {
        let _ = alloc_fd(index, OpenFileKind::Console);
    }
}

fn pool_index_for(process_index: usize, fd: i32) -> KernelResult<usize> {
    if fd < 0 || fd as usize >= MAX_FDS {
        return Err(KernelError::SyscallError(SyscallError::BadFileDescriptor));
    }
    let table = PROCESS_TABLE.lock();
    let entry = table.slots[process_index].fds[fd as usize];
    if entry == FD_EMPTY {
        return Err(KernelError::SyscallError(SyscallError::BadFileDescriptor));
    }
    Ok(entry as usize)
}

/// Duplicate `fd`, returning the new fd number (lowest free slot) aliasing
/// the same pool entry with an incremented refcount.
pub fn dup(process_index: usize, fd: i32) -> KernelResult<i32> {
    let pool_index = pool_index_for(process_index, fd)?;
    POOL.lock().slots[pool_index].as_mut().unwrap().refcount += 1;
    let mut table = PROCESS_TABLE.lock();
    let slot = table.slots[process_index]
        .alloc_fd()
        .ok_or(KernelError::SyscallError(SyscallError::TooManyOpenFiles))?;
    table.slots[process_index].fds[slot] = pool_index as i32;
    Ok(slot as i32)
}

/// Close `fd`: decrement the pool entry's refcount, tearing down its
/// backend at zero (pipes get their reader/writer-count decremented so
/// EOF/SIGPIPE semantics trigger).
pub fn close(process_index: usize, fd: i32) -> KernelResult<()> {
    let pool_index = pool_index_for(process_index, fd)?;
    PROCESS_TABLE.lock().slots[process_index].fds[fd as usize] = FD_EMPTY;

    let mut pool = POOL.lock();
    let refcount = {
        let entry = pool.slots[pool_index].as_mut().unwrap();
        entry.refcount -= 1;
        entry.refcount
    };
    if refcount == 0 {
        let kind = pool.slots[pool_index].take().unwrap().kind;
        drop(pool);
        match kind {
            OpenFileKind::Pipe { id, writing } => {
                if writing {
                    crate::pipe::close_writer(id);
                } else {
                    crate::pipe::close_reader(id);
                }
            }
            OpenFileKind::File { .. } | OpenFileKind::Console => {}
        }
    }
    Ok(())
}

/// Close every fd a process still holds. Called from `proc_kill`.
pub fn close_all(process_index: usize) {
    for fd in 0..MAX_FDS as i32 {
        let has_fd = PROCESS_TABLE.lock().slots[process_index].fds[fd as usize] != FD_EMPTY;
        if has_fd {
            let _ = close(process_index, fd);
        }
    }
}

pub fn read(process_index: usize, fd: i32, buf: &mut [u8]) -> KernelResult<usize> {
    let pool_index = pool_index_for(process_index, fd)?;
    let kind = POOL.lock().slots[pool_index].as_ref().unwrap().kind;
    match kind {
        OpenFileKind::Console => Ok(crate::drivers::console::read(buf)),
        OpenFileKind::Pipe { id, .. } => crate::pipe::read(id, buf),
        OpenFileKind::File { inode, offset } => {
            let n = vfs::read(inode, offset, buf)?;
            if let Some(entry) = POOL.lock().slots[pool_index].as_mut() {
                if let OpenFileKind::File { offset, .. } = &mut entry.kind {
                    *offset += n;
                }
            }
            Ok(n)
        }
    }
}

pub fn write(process_index: usize, fd: i32, buf: &[u8]) -> KernelResult<usize> {
    let pool_index = pool_index_for(process_index, fd)?;
    let kind = POOL.lock().slots[pool_index].as_ref().unwrap().kind;
    match kind {
        OpenFileKind::Console => Ok(crate::drivers::console::write(buf)),
        OpenFileKind::Pipe { id, .. } => crate::pipe::write(id, buf),
        OpenFileKind::File { inode, offset } => {
            let n = vfs::write(inode, offset, buf)?;
            if let Some(entry) = POOL.lock().slots[pool_index].as_mut() {
                if let OpenFileKind::File { offset, .. } = &mut entry.kind {
                    *offset += n;
                }
            }
            Ok(n)
        }
    }
}

pub fn open_file(process_index: usize, inode: u32) -> KernelResult<i32> {
    alloc_fd(process_index, OpenFileKind::File { inode, offset: 0 })
}

/// Install a pipe's two endpoints as fresh fds. Returns `(read_fd,
/// write_fd)`.
pub fn install_pipe(process_index: usize, id: PipeId) -> KernelResult<(i32, i32)> {
    let read_fd = alloc_fd(process_index, OpenFileKind::Pipe { id, writing: false })?;
    let write_fd = alloc_fd(process_index, OpenFileKind::Pipe { id, writing: true })?;
    Ok((read_fd, write_fd))
}

pub fn seek(process_index: usize, fd: i32, new_offset: usize) -> KernelResult<()> {
    let pool_index = pool_index_for(process_index, fd)?;
    let mut pool = POOL.lock();
    match &mut pool.slots[pool_index].as_mut().ok_or(KernelError::FsError(FsError::BadFileDescriptor))?.kind {
        OpenFileKind::File { offset, .. } => {
            *offset = new_offset;
            Ok(())
        }
        _ => Err(KernelError::FsError(FsError::NotSupported)),
    }
}
