pub mod in_memory;
pub mod lotomania;
pub mod postgres;
pub mod smtp;
