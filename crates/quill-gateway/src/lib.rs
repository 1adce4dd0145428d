pub mod connection;
pub mod dispatcher;
pub mod emission;
pub mod gate;
