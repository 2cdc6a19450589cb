//! Bit-level codecs for the logical types, shared by the binary and JSON
//! builders

pub(crate) mod decimal;
pub(crate) mod duration;
pub(crate) mod temporal;
