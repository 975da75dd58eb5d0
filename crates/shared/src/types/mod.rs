mod ids;
mod pagination;

pub use ids::*;
pub use pagination::*;
