#![forbid(unsafe_code)]

//! Reactive primitives shared by the tracker, the stores, and the identity
//! manager.

pub mod observable;

pub use observable::{Observable, Subscription};
