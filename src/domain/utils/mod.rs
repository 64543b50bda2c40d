pub mod id;
pub mod statistics;
pub mod union_find;
