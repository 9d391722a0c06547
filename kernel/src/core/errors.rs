/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use crate::core::types::Pid;
use miette::Diagnostic;
use thiserror::Error;

/// Process operation result
///
/// # Must Use
/// Process operations can fail and must be handled to prevent resource leaks
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Process-related errors
///
/// Every variant is recoverable: the caller's own process state is left
/// untouched when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum ProcessError {
    #[error("process table full ({capacity} slots)")]
    #[diagnostic(
        code(process::table_full),
        help("Reap zombie children with wait() to release slots.")
    )]
    TableFull { capacity: usize },

    #[error("kernel stack allocation failed")]
    #[diagnostic(
        code(process::kstack_exhausted),
        help("The stack allocator is out of memory.")
    )]
    KernelStackExhausted,

    #[error("address space allocation failed")]
    #[diagnostic(
        code(process::address_space_exhausted),
        help("The virtual memory collaborator could not create or copy the address space.")
    )]
    AddressSpaceExhausted,

    #[error("process {0} not found")]
    #[diagnostic(
        code(process::not_found),
        help("The process may have been reaped or never existed.")
    )]
    NotFound(Pid),

    #[error("no children to wait for")]
    #[diagnostic(code(process::no_children))]
    NoChildren,

    #[error("process {0} has been killed")]
    #[diagnostic(code(process::killed))]
    Killed(Pid),

    #[error("invalid argument: {0}")]
    #[diagnostic(code(process::invalid_argument))]
    InvalidArgument(String),
}

/// Unified kernel error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum KernelError {
    #[error("invalid configuration: {0}")]
    #[diagnostic(
        code(kernel::config),
        help("Check the KERNEL_* environment variables or the JSON config.")
    )]
    Config(String),

    #[error("config parse error: {0}")]
    #[diagnostic(code(kernel::config_parse))]
    Parse(#[from] serde_json::Error),

    #[error("failed to spawn {what}: {source}")]
    #[diagnostic(code(kernel::spawn))]
    Spawn {
        what: String,
        #[source]
        source: std::io::Error,
    },

    #[error("kernel already booted")]
    #[diagnostic(code(kernel::already_booted))]
    AlreadyBooted,

    #[error("Process error: {0}")]
    #[diagnostic(transparent)]
    Process(#[from] ProcessError),
}

/// Common result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;
