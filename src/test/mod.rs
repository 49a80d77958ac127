mod log;
pub use log::*;

mod consumer;
pub use consumer::*;
