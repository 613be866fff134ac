mod alias;
mod plots;
mod store;

pub use alias::AliasIndex;
pub use plots::{PlotImageInfo, PlotStore};
pub use store::BlobStore;
