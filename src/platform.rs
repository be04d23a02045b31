//! Thread-safety bounds that only exist off wasm.
//!
//! Worker futures hold JS values and are never `Send`, while native
//! runtimes need `Send` futures to spawn them. Traits and futures shared by
//! both targets are bounded by these markers instead.

use std::{future::Future, pin::Pin};

#[cfg(not(target_arch = "wasm32"))]
mod bounds {
  pub trait MaybeSend: Send {}
  impl<T: Send + ?Sized> MaybeSend for T {}

  pub trait MaybeSync: Sync {}
  impl<T: Sync + ?Sized> MaybeSync for T {}
}

#[cfg(target_arch = "wasm32")]
mod bounds {
  pub trait MaybeSend {}
  impl<T: ?Sized> MaybeSend for T {}

  pub trait MaybeSync {}
  impl<T: ?Sized> MaybeSync for T {}
}

pub use bounds::{MaybeSend, MaybeSync};

/// Boxed future that is `Send` wherever the target allows it
#[cfg(not(target_arch = "wasm32"))]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
#[cfg(target_arch = "wasm32")]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;
