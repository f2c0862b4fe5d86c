//! Shader program: compilation, linking and slot resolution.

mod interface;
mod program;
pub mod source;

pub use interface::{LinkedResource, ProgramInterface, Resource, ResourceKind, StageInterface, Varying};
pub use program::{BindingTable, ShaderProgram};
