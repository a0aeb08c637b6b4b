pub mod artist;
pub mod release;

pub use artist::{ArtistCache, ArtistSnapshot};
pub use release::{ReleaseCandidates, ReleaseFilter};
