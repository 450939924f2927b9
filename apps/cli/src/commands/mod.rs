//! 命令定义和实现

pub mod drive;
pub mod goto;
pub mod profile;
pub mod xlock;

pub use drive::DriveCommand;
pub use goto::GotoCommand;
pub use profile::ProfileCommand;
pub use xlock::XlockCommand;
