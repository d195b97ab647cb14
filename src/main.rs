#[macro_use]
extern crate log;

use pingo::alert::TerminalBell;
use pingo::cli::{App, USAGE};
use pingo::probe::IcmpProber;
use pingo::sender::{InterruptSignal, Sender};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

fn main() {
    let config = match App::parse_args() {
        Ok(Some(config)) => config,
        Ok(None) => {
            println!("{}", USAGE);
            return;
        }
        Err(e) => {
            println!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let signal = InterruptSignal::new(AtomicBool::new(false));
    let set_signal = signal.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        set_signal.store(true, Ordering::SeqCst);

        trace!("Registered signal interrupt -- Winding down ping session")
    }) {
        warn!("Could not register interrupt handler: {}", e);
    }

    trace!("Set up new sender context");

    let prober = IcmpProber::new(config.target());
    let mut sender = Sender::new(config, prober, TerminalBell);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    trace!("Start ping session");

    let summary = match sender.ping(&mut out, &signal) {
        Ok(summary) => summary,
        Err(e) => {
            error!("Could not write ping output: {}", e);
            std::process::exit(1);
        }
    };

    trace!("Successfully ended ping session");

    if let Err(e) = summary.tally(&mut out) {
        error!("Could not write ping statistics: {}", e);
        std::process::exit(1);
    }

    trace!("Shutting down...");
}
