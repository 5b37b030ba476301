pub mod diff;
pub mod engine;
pub mod favourites;
pub mod state;

pub use engine::{EngineTimings, SyncEngine};
pub use favourites::FavouritesStore;
pub use state::SyncState;
