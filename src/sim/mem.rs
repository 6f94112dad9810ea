//! Memory handling for the LC-3 simulator.
//!
//! This module consists of:
//! - [`Mem`]: The memory (65536 cells, indexed by `u16`).
//! - [`RegFile`]: The register file.
//! - [`MachineInitStrategy`]: How both are filled at power-on.
//!
//! There is no memory protection and no memory-mapped IO:
//! every address reads and writes a plain cell, and all address arithmetic wraps.

use rand::rngs::StdRng;
use rand::Rng;

use crate::ast::Reg;

/// Trait that describes types that can be used to create the power-on data of memory and registers.
pub trait WordFiller {
    /// Generate the data.
    fn generate(&mut self) -> u16;
}
impl WordFiller for () {
    /// This creates unseeded, non-deterministic values.
    fn generate(&mut self) -> u16 {
        rand::random()
    }
}
impl WordFiller for u16 {
    /// Sets each word to the given value.
    fn generate(&mut self) -> u16 {
        *self
    }
}
impl WordFiller for StdRng {
    /// This creates values from the standard random number generator.
    ///
    /// This can be used to create deterministic, seeded values.
    fn generate(&mut self) -> u16 {
        self.gen()
    }
}

/// Strategy used to initialize the `reg_file` and `mem` of the [`Simulator`].
///
/// [`Simulator`]: super::Simulator
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MachineInitStrategy {
    /// Initializes each word randomly and non-deterministically.
    Unseeded,

    /// Initializes each word randomly and deterministically.
    Seeded {
        /// The seed the RNG was initialized with.
        seed: u64
    },

    /// Initializes each word to a known value.
    Known {
        /// The value to initialize each value to.
        value: u16
    }
}
impl Default for MachineInitStrategy {
    /// Memory and registers start zeroed.
    fn default() -> Self {
        MachineInitStrategy::Known { value: 0 }
    }
}

impl MachineInitStrategy {
    pub(super) fn generator(&self) -> impl WordFiller {
        use rand::SeedableRng;

        match self {
            MachineInitStrategy::Unseeded => WCGenerator::Unseeded,
            MachineInitStrategy::Seeded { seed } => WCGenerator::Seeded(Box::new(StdRng::seed_from_u64(*seed))),
            MachineInitStrategy::Known { value } => WCGenerator::Known(*value),
        }
    }
}

enum WCGenerator {
    Unseeded,
    Seeded(Box<StdRng>),
    Known(u16)
}
impl WordFiller for WCGenerator {
    fn generate(&mut self) -> u16 {
        match self {
            WCGenerator::Unseeded  => ().generate(),
            WCGenerator::Seeded(r) => r.generate(),
            WCGenerator::Known(k)  => k.generate(),
        }
    }
}

const MEM_SIZE: usize = 1 << 16;

/// Memory.
///
/// This can be indexed with any `u16` address:
/// ```
/// use lc3_forth::sim::mem::Mem;
///
/// let mut mem = Mem::new(&mut 0u16);
/// mem[0x3000] = 0x5678;
/// assert_eq!(mem[0x3000], 0x5678);
/// assert_eq!(mem[0xFFFF], 0);
/// ```
///
/// Note that this is held in the heap, as it is too large for the stack.
#[derive(Clone)]
pub struct Mem(Box<[u16; MEM_SIZE]>);
impl Mem {
    /// Creates a new memory with the power-on data given by the filler.
    pub fn new(filler: &mut impl WordFiller) -> Self {
        let data: Box<[u16]> = (0..MEM_SIZE).map(|_| filler.generate()).collect();
        let data = data.try_into()
            .unwrap_or_else(|_| unreachable!("memory should have exactly {MEM_SIZE} cells"));
        Self(data)
    }

    /// Copies a block of words into memory, starting at `start` (wrapping past `xFFFF`).
    pub fn copy_block(&mut self, start: u16, data: &[u16]) {
        for (i, &word) in data.iter().enumerate() {
            self[start.wrapping_add(i as u16)] = word;
        }
    }

    /// Reads `len` cells starting at `start` (wrapping past `xFFFF`).
    pub fn read_block(&self, start: u16, len: u16) -> Vec<u16> {
        (0..len).map(|i| self[start.wrapping_add(i)]).collect()
    }

    /// Gets a slice of the whole memory.
    pub fn as_slice(&self) -> &[u16] {
        &*self.0
    }
}
impl std::ops::Index<u16> for Mem {
    type Output = u16;

    fn index(&self, index: u16) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
impl std::ops::IndexMut<u16> for Mem {
    fn index_mut(&mut self, index: u16) -> &mut Self::Output {
        &mut self.0[usize::from(index)]
    }
}
impl std::fmt::Debug for Mem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only nonzero cells, 65536 lines of zeroes are not useful.
        f.debug_map()
            .entries({
                self.0.iter()
                    .enumerate()
                    .filter(|&(_, &w)| w != 0)
                    .map(|(i, w)| (format!("x{i:04X}"), format!("x{w:04X}")))
            })
            .finish()
    }
}

/// The register file.
///
/// This struct can be indexed with a [`Reg`]
/// (which can be constructed using the [`crate::ast::reg_consts`] module or via [`Reg::try_from`]).
///
/// # Example
///
/// ```
/// use lc3_forth::sim::mem::RegFile;
/// use lc3_forth::ast::reg_consts::R0;
///
/// let mut reg = RegFile::new(&mut ()); // never should have to initialize a reg file
/// reg[R0] = 11;
/// assert_eq!(reg[R0], 11);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegFile([u16; 8]);
impl RegFile {
    /// Creates a register file with power-on data given by the filler.
    pub fn new(filler: &mut impl WordFiller) -> Self {
        Self(std::array::from_fn(|_| filler.generate()))
    }

    /// Gets the registers as an array (`R0` first).
    pub fn as_array(&self) -> &[u16; 8] {
        &self.0
    }
}
impl std::ops::Index<Reg> for RegFile {
    type Output = u16;

    fn index(&self, index: Reg) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
impl std::ops::IndexMut<Reg> for RegFile {
    fn index_mut(&mut self, index: Reg) -> &mut Self::Output {
        &mut self.0[usize::from(index)]
    }
}

#[cfg(test)]
mod tests {
    use super::{MachineInitStrategy, Mem, RegFile};

    #[test]
    fn test_known_fill() {
        let mut gen = MachineInitStrategy::Known { value: 0xBEEF }.generator();
        let mem = Mem::new(&mut gen);
        assert!(mem.as_slice().iter().all(|&w| w == 0xBEEF));

        let mem = Mem::new(&mut MachineInitStrategy::default().generator());
        assert_eq!(mem[0x3000], 0);
    }

    #[test]
    fn test_seeded_fill_is_deterministic() {
        let strat = MachineInitStrategy::Seeded { seed: 0x3000 };
        let a = RegFile::new(&mut strat.generator());
        let b = RegFile::new(&mut strat.generator());
        assert_eq!(a, b);

        let ma = Mem::new(&mut strat.generator());
        let mb = Mem::new(&mut strat.generator());
        assert_eq!(ma.as_slice(), mb.as_slice());
    }

    #[test]
    fn test_block_wraps() {
        let mut mem = Mem::new(&mut 0u16);
        mem.copy_block(0xFFFE, &[1, 2, 3, 4]);
        assert_eq!(mem.read_block(0xFFFE, 4), [1, 2, 3, 4]);
        assert_eq!(mem[0x0001], 4);
    }
}
