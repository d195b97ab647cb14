use std::io::{self, Write};
use std::thread;
use std::time::Duration;

/// Audible notification for a probe outcome
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Sound {
    Success,
    Failure,
}

/// Something that can make a sound
///
/// Playing an alert must never interrupt the ping session, so implementations swallow their own
/// errors.
pub trait Alert {
    fn play(&mut self, sound: Sound);
}

/// Pause between two rings of the bell
///
/// Terminals merge bell characters that arrive back to back into a single beep.
const BELL_GAP: Duration = Duration::from_millis(200);

/// Rings the terminal bell
///
/// A success rings once, a failure rings twice with a short pause in between. The bell characters
/// go to standard error, so they never end up in piped ping output.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl TerminalBell {
    fn rings(sound: Sound) -> usize {
        match sound {
            Sound::Success => 1,
            Sound::Failure => 2,
        }
    }

    fn ring<W: Write>(out: &mut W, sound: Sound, gap: Duration) -> io::Result<()> {
        for i in 0..Self::rings(sound) {
            if i > 0 {
                thread::sleep(gap);
            }
            out.write_all(b"\x07")?;
            out.flush()?;
        }
        Ok(())
    }
}

impl Alert for TerminalBell {
    fn play(&mut self, sound: Sound) {
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        if let Err(e) = Self::ring(&mut handle, sound, BELL_GAP) {
            debug!("Could not ring terminal bell: {}", e);
        }
    }
}
