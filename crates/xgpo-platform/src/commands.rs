use std::process::{Command, Stdio};

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Configure a command so the spawned process outlives its parent.
///
/// The child gets its own process group (so a terminal hang-up or Ctrl-C sent
/// to the launcher does not reach it), no console window, and null stdio.
pub trait Detach {
    fn detach(&mut self) -> &mut Self;
}

impl Detach for Command {
    #[cfg(windows)]
    fn detach(&mut self) -> &mut Self {
        self.creation_flags(CREATE_NO_WINDOW | CREATE_NEW_PROCESS_GROUP)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
    }

    #[cfg(unix)]
    fn detach(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;

        self.process_group(0)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
    }
}
