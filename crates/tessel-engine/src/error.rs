//! Error taxonomy.
//!
//! - [`SetupError`]: context, shader, buffer or texture creation failed. Fatal.
//! - [`ShaderError`]: a stage failed to compile or the program failed to link.
//!   Carries the compiler/linker text verbatim. Fatal.
//! - [`TransientGraphicsError`]: a GPU error observed at a checkpoint during
//!   steady-state rendering. Logged and returned; rendering continues.

use crate::device::ShaderStage;

/// Failure while building the render core. There is no degraded mode.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// A device-level operation failed.
    #[error("{operation} failed: {message}")]
    Device {
        operation: &'static str,
        message: String,
    },

    #[error(transparent)]
    Shader(#[from] ShaderError),

    /// The grid needs more vertices than 16-bit indices can address.
    #[error("a {side}x{side} sprite grid needs {vertices} vertices; 16-bit indices address at most 65535")]
    GridTooLarge { side: u32, vertices: u64 },
}

impl SetupError {
    pub(crate) fn device(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Device {
            operation,
            message: message.into(),
        }
    }

    /// Name of the failing operation, for the fatal-exit banner.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Device { operation, .. } => operation,
            Self::Shader(ShaderError::Compile { .. }) => "compile shader",
            Self::Shader(ShaderError::Link { .. }) => "link shaders",
            Self::GridTooLarge { .. } => "size sprite grid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShaderError {
    #[error("compile {stage} shader failed:\n{log}")]
    Compile { stage: ShaderStage, log: String },

    #[error("link shaders failed:\n{log}")]
    Link { log: String },
}

impl ShaderError {
    /// Compiler or linker text as reported by the device.
    pub fn log(&self) -> &str {
        match self {
            Self::Compile { log, .. } | Self::Link { log } => log,
        }
    }
}

/// GPU error drained at a labeled checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{label}: {message}")]
pub struct TransientGraphicsError {
    pub label: &'static str,
    pub message: String,
}
