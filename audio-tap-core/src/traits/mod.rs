pub mod keep_alive;
pub mod stream_provider;
