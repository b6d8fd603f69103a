mod config;
mod error;
mod instruction;
mod loader;
mod machine;
mod memory;
mod registers;
mod sign_extend;
mod terminal;
mod trap_vector;

pub use crate::config::Config;
pub use crate::error::{Fault, LoadError, RunError};
pub use crate::machine::{Machine, Stop};
pub use crate::memory::Memory;
pub use crate::terminal::{install_interrupt_handler, interrupted, InputSource, RawModeGuard, Stdin};

use log::info;

/// Loads every image named in `config` into a fresh machine, in order, then
/// runs it with the keyboard hooked up to the real terminal.
///
/// The terminal is switched to raw mode only once every image has loaded
/// successfully, and is restored by [`RawModeGuard`]'s `Drop` no matter how
/// the run ends: normal halt, a host interrupt, or a guest fault.
pub fn run(config: Config) -> Result<Stop, RunError> {
    let mut machine = Machine::new(Memory::new(Box::new(Stdin)));

    for path in &config.paths {
        loader::load(path, &mut machine.memory)?;
    }

    install_interrupt_handler();
    let _raw_mode = RawModeGuard::enable()?;

    info!("starting execution at {:#06x}", machine.pc);
    let stop = machine.run(interrupted)?;
    info!("execution stopped: {:?}", stop);

    Ok(stop)
}
