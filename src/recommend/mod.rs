pub mod lines;
pub mod sections;

pub use sections::{parse_recommendations, ActionItem, Recommendations};
