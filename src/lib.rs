pub mod config;
pub mod error;
pub mod net;
pub mod proto;
pub mod stack;
pub mod waiter;

#[cfg(test)]
mod test;
