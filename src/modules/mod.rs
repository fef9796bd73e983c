pub mod progress;
pub mod transcode;
