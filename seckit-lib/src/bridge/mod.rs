//! Native value bridge.
//!
//! The trust store speaks a manually reference-counted object model
//! (dictionaries, strings, byte buffers and opaque key objects). This module
//! translates between that model and Rust values. Ownership is carried in the
//! types: [`Owned`] releases on drop, [`Borrowed`] never does, and raw
//! references can only be turned into either inside this crate.
//!
//! Two runtimes implement [`NativeRuntime`]: [`SimRuntime`], an in-process
//! heap with leak accounting, and on macOS `CfRuntime`, which calls into
//! CoreFoundation.

mod constants;
mod convert;
mod handle;
mod runtime;
mod sim;

#[cfg(target_os = "macos")]
mod cf;

pub use constants::{AttrKey, Constant, Symbol};
pub use convert::Bridge;
pub use handle::{Borrowed, Owned, RawRef};
pub use runtime::{NativeRuntime, NativeType};
pub use sim::{Payload, SimRuntime};

#[cfg(target_os = "macos")]
pub use cf::CfRuntime;
#[cfg(target_os = "macos")]
pub(crate) use cf::cf_string_to_string;
