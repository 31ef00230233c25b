//! Function-level optimization passes.
//!
//! Three passes run in a fixed order — constant folding with algebraic
//! simplification, dead-code elimination, CFG simplification — and the whole
//! sequence repeats until none of them changes the function.

mod const_fold;
mod dce;
mod simplify_cfg;

use crate::{Module, ValueId};

pub use const_fold::const_fold;
pub use dce::eliminate_dead_code;
pub use simplify_cfg::simplify_cfg;

/// Runs all passes on every defined function to a fixpoint.
pub fn optimize(module: &mut Module) {
    for func in module.functions().to_vec() {
        if module.function(func).is_builtin {
            continue;
        }
        optimize_function(module, func);
    }
}

pub fn optimize_function(module: &mut Module, func: ValueId) {
    loop {
        let mut changed = false;
        changed |= const_fold(module, func);
        changed |= eliminate_dead_code(module, func);
        changed |= simplify_cfg(module, func);
        if !changed {
            break;
        }
    }
}
