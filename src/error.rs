use thiserror::Error;

/// Setup-time failures: a missing path, an unreadable file, or an image that
/// doesn't fit in the address space. Surfaced before the terminal is put
/// into raw mode, so no terminal restoration is needed to report them.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read object image: {0}")]
    Io(#[from] std::io::Error),

    #[error("object image at origin {origin:#06x} has {words} words, which overflows the 16-bit address space")]
    ImageTooLarge { origin: u16, words: usize },
}

/// Fatal guest-execution errors. The LC-3 architecture gives the guest no way
/// to observe or recover from these; hitting one terminates the run loop.
#[derive(Debug, Error)]
pub enum Fault {
    #[error("reserved opcode (RES) at pc {pc:#06x}")]
    ReservedOpcode { pc: u16 },

    #[error("RTI executed outside of privileged mode at pc {pc:#06x}")]
    Rti { pc: u16 },

    #[error("unknown TRAP vector {vector:#04x} at pc {pc:#06x}")]
    UnknownTrapVector { pc: u16, vector: u8 },
}

impl Fault {
    /// The program counter of the faulting instruction, for diagnostics.
    pub fn pc(&self) -> u16 {
        match self {
            Fault::ReservedOpcode { pc } => *pc,
            Fault::Rti { pc } => *pc,
            Fault::UnknownTrapVector { pc, .. } => *pc,
        }
    }
}

/// Everything that can keep `run` from completing a guest program, collapsed
/// into one type so `main` can match on it once and pick an exit code.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("failed to prepare the terminal: {0}")]
    Terminal(#[from] std::io::Error),

    #[error(transparent)]
    Fault(#[from] Fault),
}
