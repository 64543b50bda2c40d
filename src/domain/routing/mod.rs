pub mod control_path;
pub mod path;
pub mod path_index;
