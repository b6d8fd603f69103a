use crate::terminal::InputSource;
use log::trace;

pub const MEMORY_SIZE: usize = 1 << 16;

/// Address constants for the memory-mapped device registers in the reserved
/// high page. Only KBSR/KBDR carry real behavior in this core; DSR/DDR/MCR
/// are recognized addresses backed by plain memory so a guest program that
/// polls them reads zero instead of indexing out of range.
mod mmio {
    /// Keyboard status register. Bit 15 set means a byte is ready in KBDR.
    pub const KBSR: u16 = 0xfe00;
    /// Keyboard data register. Low 8 bits hold the most recently polled byte.
    pub const KBDR: u16 = 0xfe02;
    #[allow(unused)]
    pub const DSR: u16 = 0xfe04;
    #[allow(unused)]
    pub const DDR: u16 = 0xfe06;
    #[allow(unused)]
    pub const MCR: u16 = 0xfffe;
}

/// The machine's flat 65,536-word address space, plus the keyboard device
/// fused into reads of `KBSR`.
pub struct Memory {
    cells: Box<[u16; MEMORY_SIZE]>,
    input: Box<dyn InputSource>,
}

impl Memory {
    pub fn new(input: Box<dyn InputSource>) -> Self {
        Self {
            cells: Box::new([0; MEMORY_SIZE]),
            input,
        }
    }

    /// Direct access to the keyboard's input source, for traps (`GETC`, `IN`)
    /// that read a byte without going through the `KBSR`/`KBDR` protocol.
    pub fn input_mut(&mut self) -> &mut dyn InputSource {
        self.input.as_mut()
    }

    /// Reads the value at `address`. Reading `KBSR` first polls the
    /// keyboard: if a byte is ready it is consumed into `KBDR` and `KBSR`'s
    /// high bit is set; otherwise `KBSR` is cleared. The poll's side effect
    /// is only ever observed through this read, never out of band.
    pub fn read(&mut self, address: u16) -> u16 {
        if address == mmio::KBSR {
            if self.input.poll_input() {
                self.cells[mmio::KBSR as usize] = 1 << 15;
                self.cells[mmio::KBDR as usize] = self.input.read_byte();
            } else {
                self.cells[mmio::KBSR as usize] = 0;
            }
        }

        self.cells[address as usize]
    }

    /// Unconditionally stores `value` at `address`. Writes to the
    /// memory-mapped registers are permitted and simply overwrite; guest
    /// programs are not expected to perform them.
    pub fn write(&mut self, address: u16, value: u16) {
        trace!("mem[{:#06x}] <- {:#06x}", address, value);
        self.cells[address as usize] = value;
    }
}
