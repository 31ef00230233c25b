//! An SSA-like intermediate representation with explicit use/def links.
//!
//! All nodes live in a single arena owned by the [`Module`]; handles
//! ([`ValueId`]) stay stable across mutation. The [`IrBuilder`] is the only
//! way the front end emits instructions; the [`opt`] passes rewrite the graph
//! in place through the module's privileged mutations
//! ([`Module::replace_all_uses_with`], [`Module::remove_inst`]).

mod builder;
mod instruction;
mod module;
mod printer;
mod ty;
mod value;

pub mod opt;
pub mod validator;

pub use builder::{IrBuilder, LoopTargets};
pub use instruction::*;
pub use module::Module;
pub use printer::print_module;
pub use ty::{Type, DECAYED};
pub use value::*;
