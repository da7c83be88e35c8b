pub mod action;
pub mod conditional;
pub mod config;
pub mod error;
pub mod ninja;
pub mod path;
pub mod phase;
pub mod product;
pub mod runtime;
pub mod script;
pub mod target;
pub mod workspace;

pub use action::{BuildAction, CompileRegistry, Requirements};
pub use conditional::TargetConditional;
pub use config::{BuildMode, Configuration};
pub use error::{Error, Result};
pub use path::Path;
pub use phase::{Phase, PhaseHandle};
pub use product::{Linkage, Product, ProductKind};
pub use script::{Script, ScriptTarget};
pub use target::{ArchType, OsType, Target};
pub use workspace::Workspace;
