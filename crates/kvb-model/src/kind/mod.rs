mod comm;
pub use comm::CommType;

mod os;
pub use os::OsType;

mod storage;
pub use storage::{AccessMode, VolumeMode};
