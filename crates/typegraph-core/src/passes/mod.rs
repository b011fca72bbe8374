//! Compilation passes, run in numeric order by [`crate::compile`].
//!
//! Each pass takes the arena by `&mut` and either completes or fails with a
//! located [`crate::error::CompileError`].

pub(crate) mod p0_normalize;
pub(crate) mod p1_composition;
pub(crate) mod p2_polymorphism;
pub(crate) mod p3_recursion;
