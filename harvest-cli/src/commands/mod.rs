pub mod daemon;
pub mod init;
pub mod pending;
pub mod run;
pub mod status;
