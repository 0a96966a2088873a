pub mod audio_session;
pub mod capture_delegate;
pub mod hardware;
