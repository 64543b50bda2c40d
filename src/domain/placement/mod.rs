pub mod external;
pub mod heuristics;
pub mod set_cover;
