//! Native-messaging host: frames on stdin/stdout, timers on tokio.

pub mod alarms;
pub mod codec;
pub mod protocol;
pub mod server;
