pub mod dispatcher;
pub mod lifecycle;
pub mod orders;
pub mod otp;
pub mod queue;
pub mod scoping;
