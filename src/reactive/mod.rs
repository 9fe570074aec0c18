//! Multicast primitives shared by the device streams.

pub mod registry;
pub mod subscription;

pub use registry::{SubscriberId, SubscriberRegistry};
pub use subscription::Subscription;
