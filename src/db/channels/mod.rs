//! Channel registry: tracked source channels.

pub mod models;
pub mod queries;

pub use models::{Channel, ChannelFilter, Order};
pub use queries::ChannelRepository;
