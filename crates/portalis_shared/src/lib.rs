pub mod layout;
pub mod portal;
pub mod solver;
