/// Index of an [`crate::avar::AVar`] in a [`crate::avar::Registry`].
/// Avoids a direct reference so identifier nodes in `sdsim-syntax`
/// (which owns `AstNode`) can point back at their binding without a
/// circular crate dependency - the same role `sdsim_syntax::AVarId`
/// plays inside `AstNode::Ident`. This is that very type, re-exported
/// under the engine's own name for readability in engine code.
pub use sdsim_syntax::AVarId;

/// Index of an [`crate::avar::AModule`] in a [`crate::avar::Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AModuleId(pub u32);
