//! Kernel-wide error types.
//!
//! Each kernel subsystem returns a `KernelResult<T>` built on this single
//! [`KernelError`] enum instead of ad hoc `&str`/`-1` sentinels. The syscall
//! dispatcher is the one place these get collapsed to a negative `i32`
//! returned in `eax` (see [`KernelError::to_errno`]).

use core::fmt;

/// Main kernel error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    /// Physical frame allocation failed (bitmap fully set).
    OutOfFrames,
    /// Kernel heap growth hit `HEAP_MAX` or frame/page-map failure mid-grow.
    OutOfMemory { requested: usize },
    /// A virtual address lies outside the range the caller is allowed to touch.
    InvalidAddress { addr: usize },
    /// A page-table walk hit a not-present entry.
    UnmappedMemory { addr: usize },
    /// Process table has no free slot.
    ProcessTableFull,
    /// No process with this pid exists (or it is already a zombie being reaped).
    ProcessNotFound { pid: u32 },
    InvalidState { expected: &'static str, actual: &'static str },
    /// Syscall dispatch / argument errors.
    SyscallError(SyscallError),
    /// Filesystem errors.
    FsError(FsError),
    HardwareError { device: &'static str, code: u32 },
    InvalidArgument { name: &'static str, value: &'static str },
    ResourceExhausted { resource: &'static str },
    PermissionDenied { operation: &'static str },
    AlreadyExists { resource: &'static str, id: u64 },
    NotFound { resource: &'static str, id: u64 },
    NotImplemented { feature: &'static str },
    /// Operation would block the calling process (caller should `sleep_on`).
    WouldBlock,
    /// Write end has no readers, or read end has no writers and is empty.
    BrokenPipe,
    NotInitialized { subsystem: &'static str },
}

/// Syscall-layer errors, distinct from the filesystem/process errors they
/// may wrap so the dispatcher can report a stable errno regardless of which
/// subsystem produced the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    InvalidSyscall { nr: u32 },
    InvalidArgument { arg: usize },
    InvalidPointer { addr: usize },
    BadFileDescriptor,
    TooManyOpenFiles,
}

/// Filesystem-specific errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    NotFound,
    AlreadyExists,
    NotADirectory,
    NotAFile,
    IsADirectory,
    InvalidPath,
    DirectoryNotEmpty,
    TooManyOpenFiles,
    BadFileDescriptor,
    NotSupported,
    InodeTableFull,
    NameTooLong,
}

/// Result type alias for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Collapse to the negative errno the syscall ABI returns in `eax`.
    ///
    /// The exact magnitude is not part of any POSIX contract SpikeOS honors;
    /// it only needs to be negative, non-zero, and stable for a given error
    /// kind so user-space `libc` stubs can branch on it.
    pub fn to_errno(self) -> i32 {
        let code: i32 = match self {
            Self::OutOfFrames | Self::OutOfMemory { .. } => 12,   // ENOMEM
            Self::InvalidAddress { .. } | Self::UnmappedMemory { .. } => 14, // EFAULT
            Self::ProcessTableFull => 11,                        // EAGAIN
            Self::ProcessNotFound { .. } => 3,                    // ESRCH
            Self::InvalidState { .. } => 22,                      // EINVAL
            Self::SyscallError(SyscallError::InvalidSyscall { .. }) => 38, // ENOSYS
            Self::SyscallError(SyscallError::InvalidArgument { .. }) => 22,
            Self::SyscallError(SyscallError::InvalidPointer { .. }) => 14,
            Self::SyscallError(SyscallError::BadFileDescriptor) => 9, // EBADF
            Self::SyscallError(SyscallError::TooManyOpenFiles) => 24, // EMFILE
            Self::FsError(FsError::NotFound) => 2,                // ENOENT
            Self::FsError(FsError::AlreadyExists) => 17,          // EEXIST
            Self::FsError(FsError::NotADirectory) => 20,          // ENOTDIR
            Self::FsError(FsError::NotAFile) => 21,               // EISDIR (inverse use)
            Self::FsError(FsError::IsADirectory) => 21,           // EISDIR
            Self::FsError(FsError::InvalidPath) => 36,            // ENAMETOOLONG
            Self::FsError(FsError::DirectoryNotEmpty) => 39,      // ENOTEMPTY
            Self::FsError(FsError::TooManyOpenFiles) => 24,
            Self::FsError(FsError::BadFileDescriptor) => 9,
            Self::FsError(FsError::NotSupported) => 95,           // EOPNOTSUPP
            Self::FsError(FsError::InodeTableFull) => 28,         // ENOSPC
            Self::FsError(FsError::NameTooLong) => 36,
            Self::HardwareError { .. } => 5,                      // EIO
            Self::InvalidArgument { .. } => 22,
            Self::ResourceExhausted { .. } => 12,
            Self::PermissionDenied { .. } => 13,                  // EACCES
            Self::AlreadyExists { .. } => 17,
            Self::NotFound { .. } => 2,
            Self::NotImplemented { .. } => 38,
            Self::WouldBlock => 11,                               // EAGAIN
            Self::BrokenPipe => 32,                               // EPIPE
            Self::NotInitialized { .. } => 19,                    // ENODEV
        };
        -code
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfFrames => write!(f, "frame allocator exhausted"),
            Self::OutOfMemory { requested } => {
                write!(f, "heap out of memory: requested {} bytes", requested)
            }
            Self::InvalidAddress { addr } => write!(f, "invalid address: 0x{:x}", addr),
            Self::UnmappedMemory { addr } => write!(f, "unmapped memory at 0x{:x}", addr),
            Self::ProcessTableFull => write!(f, "process table full"),
            Self::ProcessNotFound { pid } => write!(f, "process {} not found", pid),
            Self::InvalidState { expected, actual } => {
                write!(f, "invalid state: expected {}, got {}", expected, actual)
            }
            Self::SyscallError(e) => write!(f, "syscall error: {:?}", e),
            Self::FsError(e) => write!(f, "filesystem error: {:?}", e),
            Self::HardwareError { device, code } => {
                write!(f, "hardware error on {}: code 0x{:x}", device, code)
            }
            Self::InvalidArgument { name, value } => {
                write!(f, "invalid argument '{}': {}", name, value)
            }
            Self::ResourceExhausted { resource } => write!(f, "resource exhausted: {}", resource),
            Self::PermissionDenied { operation } => {
                write!(f, "permission denied for operation: {}", operation)
            }
            Self::AlreadyExists { resource, id } => {
                write!(f, "{} with id {} already exists", resource, id)
            }
            Self::NotFound { resource, id } => write!(f, "{} with id {} not found", resource, id),
            Self::NotImplemented { feature } => write!(f, "feature not implemented: {}", feature),
            Self::WouldBlock => write!(f, "operation would block"),
            Self::BrokenPipe => write!(f, "broken pipe"),
            Self::NotInitialized { subsystem } => {
                write!(f, "subsystem not initialized: {}", subsystem)
            }
        }
    }
}

impl From<SyscallError> for KernelError {
    fn from(err: SyscallError) -> Self {
        Self::SyscallError(err)
    }
}

impl From<FsError> for KernelError {
    fn from(err: FsError) -> Self {
        Self::FsError(err)
    }
}
