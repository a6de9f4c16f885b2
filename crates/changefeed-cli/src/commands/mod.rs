pub mod cursor;
pub mod dump_chunk;
pub mod last_consumable;
pub mod list;
pub mod pages;
