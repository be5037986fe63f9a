pub mod prop_cache;
pub mod prop_format;
pub mod prop_row_index;
