mod check;
mod init;
mod run;

pub use check::cmd_check;
pub use init::cmd_init;
pub use run::cmd_run;
