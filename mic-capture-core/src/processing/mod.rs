pub mod level;
pub mod ring_buffer;
pub mod sample_format;
