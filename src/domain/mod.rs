pub mod notification;
pub mod ports;
pub mod round;
