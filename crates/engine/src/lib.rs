pub mod dispatcher;
pub mod locks;
pub mod processor;
pub mod recorder;
pub mod resolver;
pub mod sizer;
pub mod validator;

pub use processor::{SignalOutcome, SignalProcessor};
