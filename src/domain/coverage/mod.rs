pub mod quartets;
pub mod triplets;
