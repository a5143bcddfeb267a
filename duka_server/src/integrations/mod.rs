pub mod paypack;
pub mod realtime;
