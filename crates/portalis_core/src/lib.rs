pub mod backend;
pub mod frame;
pub mod pass;
pub mod scheduler;
pub mod tick;

#[cfg(test)]
mod testing;
