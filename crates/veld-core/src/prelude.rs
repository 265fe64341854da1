//! Convenience re-exports for downstream crates.

pub use crate::cache::{keys, DerivedCache};
pub use crate::error::{Error, Result};
pub use crate::expr::{BinOp, Expr, Scalar, UnaryOp};
pub use crate::graph::{LegacyGraph, Task, TaskGraph, TaskKey};
pub use crate::hash::{token_of, Token};
pub use crate::interner::Interner;
pub use crate::kind::OpKind;
pub use crate::node::{ExprNode, NodeRef};
pub use crate::operand::Operand;
pub use crate::persist::{from_persisted, to_persisted, PersistedNode, PersistedOperand};
