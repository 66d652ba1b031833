mod csv;

pub use csv::{ranking_to_string, write_ranking};
