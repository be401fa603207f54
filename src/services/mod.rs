mod youtube;

pub use youtube::{ChannelRef, YouTubeClient};
