pub mod engine;
pub mod ffmpeg;
pub mod hls;
pub mod profile;
pub mod runner;

#[cfg(test)]
pub mod testing;
