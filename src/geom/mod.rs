mod bbox;
mod prepared;
mod union;

pub(crate) use bbox::{IndexedBounds, envelope};
pub use prepared::PreparedArea;
pub use union::{batched_union, dissolve};
