mod args;
mod copy;
mod detect;
mod install;

pub(crate) use args::{DeviceArgs, SourceArgs};
pub(crate) use copy::copy_cmd;
pub(crate) use detect::{detect_cmd, generate_cmd};
pub(crate) use install::{apply_uuids_cmd, install_cmd};
