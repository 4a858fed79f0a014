//! Compact table-driven Protocol Buffers runtime.
//!
//! This crate contains:
//! - `wire` - wire types, tags, varints, zigzag
//! - `table` - runtime layout tables (the in-memory form of the records the
//!   generator emits as C)
//! - `message` - the dynamic message representation driven by those tables
//! - `encode` - the one-pass reverse encoder
//!
//! Everything here is single-threaded and synchronous; one encode call owns
//! its buffer exclusively.

pub mod encode;
pub mod message;
pub mod table;
pub mod wire;

#[cfg(test)]
mod message_tests;

pub use encode::{encode, max_depth, EncodeError, DETERMINISTIC, SKIP_UNKNOWN};
pub use message::{Array, ExtValue, Map, MapKey, Message, MessageExt, Slot, Value};
pub use table::{
    DescriptorType, ExtId, ExtMode, ExtensionLayout, FieldKind, FieldLayout, LayoutId, LayoutPool,
    MessageLayout, Rep,
};
pub use wire::WireType;
