pub mod configure;
pub mod init;
pub mod restart;
pub mod watch;
