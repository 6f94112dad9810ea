//! Simulating and execution for LC-3 code.
//!
//! This module is focused on executing fully assembled code (i.e., [`ObjectFile`]).
//!
//! This module consists of:
//! - [`Simulator`]: The struct that simulates assembled code.
//! - [`step`]: The bare execution contract (one instruction against a memory and register file).
//! - [`mem`]: The module handling memory and the register file.
//! - [`io`]: The module handling the console devices behind `GETC` and `OUT`.
//! - [`debug`]: The module handling types of breakpoints for the simulator.
//!
//! # Usage
//!
//! To simulate some code, you need to instantiate a Simulator and load an object file to it:
//!
//! ```
//! use lc3_forth::asm::assemble;
//! use lc3_forth::ast::reg_consts::R0;
//! use lc3_forth::sim::{PauseCondition, Simulator};
//!
//! let obj_file = assemble(0x3000, |a| {
//!     a.and(R0, R0, 0);
//!     a.add(R0, R0, 1);
//!     a.add(R0, R0, 1);
//!     a.add(R0, R0, 1);
//!     a.halt();
//! }).unwrap();
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_obj_file(&obj_file);
//!
//! // Running step by step:
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 0);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 1);
//!
//! // Running to completion:
//! assert_eq!(sim.run().unwrap(), PauseCondition::Halt);
//! assert_eq!(sim.reg_file[R0], 3);
//! assert_eq!(sim.pc, 0x3004); // the HALT
//! ```
//!
//! ## Flags
//!
//! The simulator is configured with [`SimFlags`]:
//! - `machine_init` decides the power-on contents of memory and registers,
//! - `eof` decides what `GETC` does once the input is exhausted (see [`EofBehavior`]).
//!
//! ## Execution
//!
//! Beyond the basic [`Simulator::run`] (which runs until a pause),
//! there are also:
//! - [`Simulator::step_in`]: manual step-by-step simulation
//! - [`Simulator::run_while`], [`Simulator::run_with_limit`]: more advanced programmatic execution
//!
//! Every run reports why it stopped with a [`PauseCondition`].
//!
//! ## Debugging with breakpoints
//!
//! Breakpoints are accessible through the `breakpoints` field on [`Simulator`].
//!
//! To add a `breakpoint`, simply insert a [`Breakpoint`] and
//! it will break if its condition is met during all execution functions (except [`Simulator::step_in`]).
//!
//! ```
//! use lc3_forth::asm::assemble;
//! use lc3_forth::ast::reg_consts::R0;
//! use lc3_forth::sim::{PauseCondition, Simulator};
//! use lc3_forth::sim::debug::Breakpoint;
//!
//! let obj_file = assemble(0x3000, |a| {
//!     a.add(R0, R0, 0);
//!     a.add(R0, R0, 1);
//!     a.add(R0, R0, 2);
//!     a.add(R0, R0, 3);
//!     a.halt();
//! }).unwrap();
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_obj_file(&obj_file);
//! sim.breakpoints.insert(Breakpoint::PC(0x3002));
//! assert_eq!(sim.run().unwrap(), PauseCondition::Breakpoint);
//! assert_eq!(sim.pc, 0x3002);
//! ```
//!
//! ## IO
//!
//! `GETC` and `OUT` go through the simulator's IO device (see [`io`]).
//! The best IO for programmatic uses is [`io::BufferedIO`],
//! which exposes the IO to memory buffers that can be modified.
//!
//! ```
//! use lc3_forth::asm::assemble;
//! use lc3_forth::ast::reg_consts::R0;
//! use lc3_forth::sim::{PauseCondition, Simulator};
//! use lc3_forth::sim::io::BufferedIO;
//!
//! let obj_file = assemble(0x3000, |a| {
//!     a.mark("loop");
//!     a.getc();
//!     a.putc();
//!     a.add(R0, R0, 0);
//!     a.brnp("loop");
//!     a.halt();
//! }).unwrap();
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_obj_file(&obj_file);
//!
//! let io = BufferedIO::new();
//! sim.open_io(io.clone());
//!
//! io.push_input(b"Hello, World!\0");
//! assert_eq!(sim.run().unwrap(), PauseCondition::Halt);
//! assert_eq!(io.take_output(), b"Hello, World!\0");
//! ```
//!
//! [`Breakpoint`]: self::debug::Breakpoint
pub mod mem;
pub mod io;
pub mod debug;

use std::collections::HashSet;

use crate::asm::ObjectFile;
use crate::ast::reg_consts::{R0, R7};
use crate::ast::sim::SimInstr;
use crate::ast::{CondCode, ImmOrReg};
use debug::Breakpoint;

use self::io::{IODevice, SimIO};
use self::mem::{MachineInitStrategy, Mem, RegFile};

/// Errors that can occur during simulation.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum SimErr {
    /// Word was decoded, but the opcode was invalid (reserved).
    IllegalOpcode(u16),
}
impl std::fmt::Display for SimErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimErr::IllegalOpcode(word) => write!(f, "simulator executed illegal opcode (x{word:04X})"),
        }
    }
}
impl std::error::Error for SimErr {}
impl crate::err::Error for SimErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            SimErr::IllegalOpcode(_) => Some("opcodes 8 (RTI) and 13 are reserved, this may be a data word reached by a stray jump".into()),
        }
    }
}

/// What `GETC` does once the IO device has no more input.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy)]
pub enum EofBehavior {
    /// Pause the run with [`PauseCondition::InputExhausted`].
    ///
    /// The PC is left on the `GETC` and no register changes,
    /// so supplying more input and resuming re-executes the read.
    #[default]
    Pause,
    /// Write the given value to `R0` (e.g., `xFFFF`, which is -1) and continue.
    Sentinel(u16),
}

/// Reason for why execution paused if it wasn't due to an error.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PauseCondition {
    /// Program reached a halt.
    Halt,
    /// Program tried to read input, but there was none left.
    InputExhausted,
    /// Program hit a breakpoint.
    Breakpoint,
    /// Program hit a tripwire condition.
    Tripwire,
}

/// Configuration flags for [`Simulator`].
///
/// These can be modified after the `Simulator` is created with [`Simulator::new`]
/// and their effects should still apply.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct SimFlags {
    /// The creation strategy for the initial state of memory and registers.
    ///
    /// This flag only goes into effect after a `Simulator::new` or `Simulator::reset` call.
    ///
    /// By default, this flag is [`MachineInitStrategy::default`] (all zeroes).
    pub machine_init: MachineInitStrategy,

    /// What to do when `GETC` runs out of input.
    ///
    /// By default, this flag is [`EofBehavior::Pause`].
    pub eof: EofBehavior,
}

/// The result of executing a single instruction with [`step`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Step {
    /// The instruction finished, execution continues at the given PC.
    Next(u16),
    /// The instruction was `HALT`.
    Halt,
    /// The instruction was `GETC`, but there was no input (and [`EofBehavior::Pause`] is active).
    ///
    /// No state was changed.
    InputExhausted,
}

/// Computes the condition code of a result (`n`, `z`, or `p`).
pub fn cc_of(result: u16) -> CondCode {
    match (result as i16).cmp(&0) {
        std::cmp::Ordering::Less    => 0b100,
        std::cmp::Ordering::Equal   => 0b010,
        std::cmp::Ordering::Greater => 0b001,
    }
}

/// Executes the instruction at `pc`.
///
/// The PC is incremented before the instruction takes effect,
/// so PC-relative addresses are relative to the next instruction.
/// Memory accesses never fault and all address arithmetic wraps.
///
/// On [`Step::Halt`] and [`Step::InputExhausted`], nothing is modified.
/// ```
/// use lc3_forth::sim::{step, EofBehavior, Step};
/// use lc3_forth::sim::io::EmptyIO;
/// use lc3_forth::sim::mem::{Mem, RegFile};
/// use lc3_forth::ast::reg_consts::R1;
///
/// let mut mem = Mem::new(&mut 0u16);
/// let mut regs = RegFile::new(&mut 0u16);
/// let mut cc = 0b010;
///
/// mem[0x3000] = 0x127F; // ADD R1, R1, #-1
/// let result = step(&mut mem, &mut regs, &mut cc, 0x3000, &mut EmptyIO, EofBehavior::Pause);
///
/// assert_eq!(result, Ok(Step::Next(0x3001)));
/// assert_eq!(regs[R1], 0xFFFF);
/// assert_eq!(cc, 0b100);
/// ```
pub fn step(
    mem: &mut Mem,
    regs: &mut RegFile,
    cc: &mut CondCode,
    pc: u16,
    io: &mut (impl IODevice + ?Sized),
    eof: EofBehavior
) -> Result<Step, SimErr> {
    let instr = SimInstr::decode(mem[pc])?;
    let mut pc = pc.wrapping_add(1);

    match instr {
        SimInstr::BR(mask, off) => {
            if mask & *cc != 0 {
                pc = pc.wrapping_add_signed(off.get());
            }
        },
        SimInstr::ADD(dr, sr1, sr2) => {
            let val2 = match sr2 {
                ImmOrReg::Imm(i2) => i2.get() as u16,
                ImmOrReg::Reg(r2) => regs[r2],
            };
            regs[dr] = regs[sr1].wrapping_add(val2);
            *cc = cc_of(regs[dr]);
        },
        SimInstr::LD(dr, off) => {
            regs[dr] = mem[pc.wrapping_add_signed(off.get())];
            *cc = cc_of(regs[dr]);
        },
        SimInstr::ST(sr, off) => {
            mem[pc.wrapping_add_signed(off.get())] = regs[sr];
        },
        SimInstr::JSR(off) => {
            regs[R7] = pc;
            pc = pc.wrapping_add_signed(off.get());
        },
        SimInstr::AND(dr, sr1, sr2) => {
            let val2 = match sr2 {
                ImmOrReg::Imm(i2) => i2.get() as u16,
                ImmOrReg::Reg(r2) => regs[r2],
            };
            regs[dr] = regs[sr1] & val2;
            *cc = cc_of(regs[dr]);
        },
        SimInstr::LDR(dr, br, off) => {
            regs[dr] = mem[regs[br].wrapping_add_signed(off.get())];
            *cc = cc_of(regs[dr]);
        },
        SimInstr::STR(sr, br, off) => {
            mem[regs[br].wrapping_add_signed(off.get())] = regs[sr];
        },
        SimInstr::NOT(dr, sr) => {
            regs[dr] = !regs[sr];
            *cc = cc_of(regs[dr]);
        },
        SimInstr::LDI(dr, off) => {
            let ptr = mem[pc.wrapping_add_signed(off.get())];
            regs[dr] = mem[ptr];
            *cc = cc_of(regs[dr]);
        },
        SimInstr::STI(sr, off) => {
            let ptr = mem[pc.wrapping_add_signed(off.get())];
            mem[ptr] = regs[sr];
        },
        SimInstr::JMP(br) => {
            pc = regs[br];
        },
        SimInstr::LEA(dr, off) => {
            regs[dr] = pc.wrapping_add_signed(off.get());
            *cc = cc_of(regs[dr]);
        },
        SimInstr::TRAP(vect) => match vect.get() {
            // GETC
            0x20 => match (io.read_byte(), eof) {
                (Some(byte), _) => regs[R0] = u16::from(byte),
                (None, EofBehavior::Sentinel(value)) => regs[R0] = value,
                (None, EofBehavior::Pause) => return Ok(Step::InputExhausted),
            },
            // OUT
            0x21 => io.write_byte(regs[R0] as u8),
            // HALT
            0x25 => return Ok(Step::Halt),
            v => tracing::trace!(vect = v, "no-op trap"),
        },
    }

    Ok(Step::Next(pc))
}

/// Executes assembled code.
#[derive(Debug)]
pub struct Simulator {
    // ------------------ SIMULATION STATE ------------------
    // Calling [`Simulator::reset`] resets these values.

    /// The simulator's memory.
    ///
    /// Note that this is held in the heap, as it is too large for the stack.
    pub mem: Mem,

    /// The simulator's register file.
    pub reg_file: RegFile,

    /// The program counter.
    pub pc: u16,

    /// The condition code register (exactly one of `n`, `z`, `p`).
    cc: CondCode,

    /// The number of instructions successfully run since this `Simulator` was initialized.
    ///
    /// This can be set to 0 to reset the counter.
    pub instructions_run: u64,

    /// Indicates the reason why the last execution (via [`Simulator::run_while`] and adjacent)
    /// had paused. `None` if it has not run or ended in an error.
    pause_condition: Option<PauseCondition>,

    // ------------------ CONFIG/DEBUG STATE ------------------
    // Calling [`Simulator::reset`] does not reset these values.

    /// Configuration settings for the simulator.
    ///
    /// These are preserved between resets.
    ///
    /// See [`SimFlags`] for more details on what configuration
    /// settings are available.
    pub flags: SimFlags,

    /// Breakpoints for the simulator.
    pub breakpoints: HashSet<Breakpoint>,

    /// The console device.
    io: SimIO,
}

impl Simulator {
    /// Creates a new simulator with the provided flags, without a loaded object file.
    ///
    /// The PC starts at `x3000` and the condition code starts as `z`.
    pub fn new(flags: SimFlags) -> Self {
        let mut filler = flags.machine_init.generator();

        Self {
            mem: Mem::new(&mut filler),
            reg_file: RegFile::new(&mut filler),
            pc: 0x3000,
            cc: 0b010,
            instructions_run: 0,
            pause_condition: None,

            flags,
            breakpoints: Default::default(),
            io: Default::default(),
        }
    }

    /// Resets the simulator.
    ///
    /// This resets the state of the `Simulator` back to before any execution calls,
    /// while preserving configuration and debug state.
    ///
    /// Note that this function preserves:
    /// - Flags
    /// - Breakpoints
    /// - IO (however, note that it does not reset IO state, which must be manually reset)
    ///
    /// This also does not reload object files. Any object file data has to be reloaded into the Simulator.
    pub fn reset(&mut self) {
        let flags = self.flags;
        let breakpoints = std::mem::take(&mut self.breakpoints);
        let io = std::mem::take(&mut self.io);

        *self = Simulator::new(flags);
        self.breakpoints = breakpoints;
        self.io = io;
    }

    /// Loads an object file into this simulator, and points the PC at its origin.
    pub fn load_obj_file(&mut self, obj: &ObjectFile) {
        self.mem.copy_block(obj.origin(), obj.words());
        self.pc = obj.origin();
    }

    /// Sets the IO device used by `GETC` and `OUT`.
    ///
    /// The previous device is closed.
    pub fn open_io<IO: Into<SimIO>>(&mut self, io: IO) {
        self.close_io();
        self.io = io.into();
    }

    /// Closes the IO device (flushing any pending output), leaving [`io::EmptyIO`] in its place.
    pub fn close_io(&mut self) {
        std::mem::take(&mut self.io).close();
    }

    /// The condition code register (`0b100` = n, `0b010` = z, `0b001` = p).
    pub fn cc(&self) -> CondCode {
        self.cc
    }
    /// Sets the condition code register.
    ///
    /// Anything that is not exactly one of n/z/p is treated as z.
    pub fn set_cc(&mut self, mut cc: CondCode) {
        cc &= 0b111;
        if cc.count_ones() != 1 { cc = 0b010 };
        self.cc = cc;
    }

    /// Gets the address of the instruction that will execute next
    /// (or, after a pause, the instruction that caused the pause).
    ///
    /// Halts, input exhaustion and errors all leave the PC on the offending instruction,
    /// so this is just the PC.
    pub fn prefetch_pc(&self) -> u16 {
        self.pc
    }

    /// Indicates whether the last execution of the simulator hit a breakpoint.
    pub fn hit_breakpoint(&self) -> bool {
        matches!(self.pause_condition, Some(PauseCondition::Breakpoint))
    }

    /// Indicates whether the last execution of the simulator resulted in a HALT.
    pub fn hit_halt(&self) -> bool {
        matches!(self.pause_condition, Some(PauseCondition::Halt))
    }

    /// Indicates whether the last execution of the simulator ran out of input.
    pub fn hit_input_exhausted(&self) -> bool {
        matches!(self.pause_condition, Some(PauseCondition::InputExhausted))
    }

    /// Simulate one step, executing one instruction.
    ///
    /// A halt or input exhaustion leaves the PC on the instruction
    /// (so stepping again retries it).
    fn step(&mut self) -> Result<Step, SimErr> {
        let result = step(&mut self.mem, &mut self.reg_file, &mut self.cc, self.pc, &mut self.io, self.flags.eof);
        match result {
            Ok(Step::Next(pc)) => {
                self.pc = pc;
                self.instructions_run = self.instructions_run.wrapping_add(1);
            },
            Ok(Step::InputExhausted) => tracing::debug!(pc = format_args!("x{:04X}", self.pc), "input exhausted"),
            Ok(Step::Halt) => {},
            Err(e) => tracing::debug!(pc = format_args!("x{:04X}", self.pc), "{e}"),
        }
        result
    }

    /// Simulate one step, executing one instruction.
    pub fn step_in(&mut self) -> Result<Step, SimErr> {
        self.step()
    }

    /// Runs until the tripwire condition returns false (or any of the typical breaks occur).
    ///
    /// The typical break conditions are:
    /// - `HALT` is executed
    /// - `GETC` runs out of input (with [`EofBehavior::Pause`])
    /// - A breakpoint matches
    pub fn run_while(&mut self, mut tripwire: impl FnMut(&mut Simulator) -> bool) -> Result<PauseCondition, SimErr> {
        self.pause_condition.take();

        // event loop
        // run until:
        // 1. the tripwire condition returns false
        // 2. a halt or input exhaustion
        // 3. any of the breakpoints are hit
        let result = loop {
            // Tripwire turned off:
            if !tripwire(self) {
                break Ok(PauseCondition::Tripwire);
            }

            // Run a step:
            match self.step() {
                Ok(Step::Next(_)) => {},
                Ok(Step::Halt) => break Ok(PauseCondition::Halt),
                Ok(Step::InputExhausted) => break Ok(PauseCondition::InputExhausted),
                Err(e) => break Err(e),
            }

            // After executing, check that any breakpoints were hit.
            if self.breakpoints.iter().any(|bp| bp.check(self)) {
                break Ok(PauseCondition::Breakpoint);
            }
        };

        self.pause_condition = result.ok();
        tracing::debug!(?result, instructions_run = self.instructions_run, "run paused");
        result
    }

    /// Execute the program.
    ///
    /// This blocks until the program pauses.
    /// If you would like to limit the maximum number of steps to execute, consider [`Simulator::run_with_limit`].
    pub fn run(&mut self) -> Result<PauseCondition, SimErr> {
        self.run_while(|_| true)
    }

    /// Execute the program with a limit on how many steps to execute.
    ///
    /// This blocks until the program pauses or until the number of steps to execute has been hit
    /// (which pauses with [`PauseCondition::Tripwire`]).
    pub fn run_with_limit(&mut self, max_steps: u64) -> Result<PauseCondition, SimErr> {
        let i = self.instructions_run;
        self.run_while(|sim| sim.instructions_run.wrapping_sub(i) < max_steps)
    }
}
impl Default for Simulator {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

#[cfg(test)]
mod tests {
    use crate::asm::{assemble, ObjectFile};
    use crate::ast::reg_consts::{R0, R1, R2, R3, R7};

    use super::debug::{Breakpoint, Comparator};
    use super::io::BufferedIO;
    use super::{EofBehavior, PauseCondition, SimErr, SimFlags, Simulator, Step};

    fn load(obj: &ObjectFile) -> Simulator {
        let mut sim = Simulator::new(SimFlags::default());
        sim.load_obj_file(obj);
        sim
    }

    #[test]
    fn test_exactly_one_flag() {
        let obj = assemble(0x3000, |a| {
            a.and(R0, R0, 0);     // z
            a.add(R0, R0, -3);    // n
            a.not(R0, R0);        // p (2)
            a.lea(R1, 0x3000u16); // p
            a.ld(R2, "neg");      // n
            a.halt();
            a.mark("neg");
            a.fill(0x8000u16);
        }).unwrap();

        let mut sim = load(&obj);
        assert_eq!(sim.cc(), 0b010);
        for expected in [0b010, 0b100, 0b001, 0b001, 0b100] {
            sim.step_in().unwrap();
            assert_eq!(sim.cc(), expected);
            assert_eq!(sim.cc().count_ones(), 1);
        }
        assert_eq!(sim.reg_file[R0], 2);
        assert_eq!(sim.reg_file[R1], 0x3000);
    }

    #[test]
    fn test_flags_untouched_by_stores() {
        let obj = assemble(0x3000, |a| {
            a.add(R0, R0, -1); // n
            a.st(R0, "cell");
            a.str(R0, R1, 0);
            a.br_cc(0b000, 0x3000u16);
            a.halt();
            a.mark("cell");
            a.fill(0u16);
        }).unwrap();

        let mut sim = load(&obj);
        sim.reg_file[R1] = 0x4000;
        assert_eq!(sim.run().unwrap(), PauseCondition::Halt);
        assert_eq!(sim.cc(), 0b100);
        assert_eq!(sim.mem[0x3005], 0xFFFF);
        assert_eq!(sim.mem[0x4000], 0xFFFF);
    }

    #[test]
    fn test_jsr_ret_and_indirect() {
        let obj = assemble(0x3000, |a| {
            a.jsr("sub");
            a.ldi(R2, "ptr");
            a.sti(R2, "ptr2");
            a.halt();
            a.mark("sub");
            a.add(R1, R1, 7);
            a.ret();
            a.mark("ptr");
            a.fill("data");
            a.mark("ptr2");
            a.fill(0x4000u16);
            a.mark("data");
            a.fill(0x1234u16);
        }).unwrap();

        let mut sim = load(&obj);
        assert_eq!(sim.run().unwrap(), PauseCondition::Halt);
        assert_eq!(sim.reg_file[R1], 7);
        assert_eq!(sim.reg_file[R7], 0x3001);
        assert_eq!(sim.reg_file[R2], 0x1234);
        assert_eq!(sim.mem[0x4000], 0x1234);
    }

    #[test]
    fn test_address_wrapping() {
        let mut sim = Simulator::default();
        // LDR R0, R1, #-1 with R1 = 0 reads xFFFF
        sim.mem[0x3000] = 0x607F;
        sim.mem[0xFFFF] = 0x4242;
        sim.reg_file[R1] = 0;
        assert_eq!(sim.step_in(), Ok(Step::Next(0x3001)));
        assert_eq!(sim.reg_file[R0], 0x4242);

        // BR at xFFFF wraps to x0000
        sim.mem[0xFFFF] = 0x0E00;
        sim.pc = 0xFFFF;
        assert_eq!(sim.step_in(), Ok(Step::Next(0x0000)));
    }

    #[test]
    fn test_halt_rewinds() {
        let obj = assemble(0x3000, |a| {
            a.add(R0, R0, 1);
            a.halt();
            a.add(R0, R0, 1);
        }).unwrap();

        let mut sim = load(&obj);
        assert_eq!(sim.run().unwrap(), PauseCondition::Halt);
        assert!(sim.hit_halt());
        assert_eq!(sim.pc, 0x3001);
        assert_eq!(sim.instructions_run, 1);

        // halts again without executing anything else
        assert_eq!(sim.run().unwrap(), PauseCondition::Halt);
        assert_eq!(sim.reg_file[R0], 1);
    }

    #[test]
    fn test_illegal_opcode() {
        let mut sim = Simulator::default();
        sim.mem[0x3000] = 0x1021;
        sim.mem[0x3001] = 0x8000;
        assert_eq!(sim.run(), Err(SimErr::IllegalOpcode(0x8000)));
        assert_eq!(sim.prefetch_pc(), 0x3001);
        assert!(!sim.hit_halt());

        sim.mem[0x3001] = 0xD000;
        assert_eq!(sim.run(), Err(SimErr::IllegalOpcode(0xD000)));
    }

    #[test]
    fn test_unknown_trap_is_noop() {
        let obj = assemble(0x3000, |a| {
            a.add(R0, R0, 5);
            a.trap(0x00);
            a.trap(0x22);
            a.trap(0xFF);
            a.halt();
        }).unwrap();

        let mut sim = load(&obj);
        sim.reg_file[R7] = 0xAAAA;
        assert_eq!(sim.run().unwrap(), PauseCondition::Halt);
        assert_eq!(sim.reg_file[R0], 5);
        // traps do not link
        assert_eq!(sim.reg_file[R7], 0xAAAA);
        assert_eq!(sim.cc(), 0b001);
    }

    fn echo_program() -> ObjectFile {
        // echo until '.'
        assemble(0x3000, |a| {
            a.ld(R3, "dot");
            a.mark("loop");
            a.getc();
            a.putc();
            a.add(R1, R0, R3);
            a.brnp("loop");
            a.halt();
            a.mark("dot");
            a.fill(-i16::from(b'.') as u16);
        }).unwrap()
    }

    #[test]
    fn test_eof_pause_and_resume() {
        let obj = echo_program();
        let mut sim = load(&obj);
        let io = BufferedIO::new();
        sim.open_io(io.clone());

        io.push_input(b"ab");
        assert_eq!(sim.run().unwrap(), PauseCondition::InputExhausted);
        assert!(sim.hit_input_exhausted());
        assert_eq!(io.take_output(), b"ab");
        // PC is left on the GETC, R0 still holds the last byte
        assert_eq!(sim.pc, 0x3001);
        assert_eq!(sim.reg_file[R0], u16::from(b'b'));

        io.push_input(b"c.");
        assert_eq!(sim.run().unwrap(), PauseCondition::Halt);
        assert_eq!(io.take_output(), b"c.");
    }

    #[test]
    fn test_eof_sentinel() {
        let obj = echo_program();
        let mut sim = load(&obj);
        sim.flags.eof = EofBehavior::Sentinel(u16::from(b'.'));

        let io = BufferedIO::new();
        sim.open_io(io.clone());
        io.push_input(b"xy");

        assert_eq!(sim.run().unwrap(), PauseCondition::Halt);
        assert_eq!(io.take_output(), b"xy.");
    }

    #[test]
    fn test_run_with_limit() {
        let obj = assemble(0x3000, |a| {
            a.mark("spin");
            a.add(R0, R0, 1);
            a.br("spin");
        }).unwrap();

        let mut sim = load(&obj);
        assert_eq!(sim.run_with_limit(10).unwrap(), PauseCondition::Tripwire);
        assert_eq!(sim.instructions_run, 10);
        assert_eq!(sim.reg_file[R0], 5);
    }

    #[test]
    fn test_breakpoints() {
        let obj = assemble(0x3000, |a| {
            a.mark("spin");
            a.add(R0, R0, 1);
            a.trap(0x00);
            a.br("spin");
        }).unwrap();

        let mut sim = load(&obj);
        sim.breakpoints.insert(Breakpoint::Reg { reg: R0, value: Comparator::Eq(3) });
        assert_eq!(sim.run().unwrap(), PauseCondition::Breakpoint);
        assert!(sim.hit_breakpoint());
        assert_eq!(sim.pc, 0x3001);

        sim.breakpoints.clear();
        sim.breakpoints.insert(Breakpoint::Trap(0x00));
        assert_eq!(sim.run().unwrap(), PauseCondition::Breakpoint);
        assert_eq!(sim.pc, 0x3001);
        assert_eq!(sim.reg_file[R0], 4);
    }

    #[test]
    fn test_reset_keeps_config() {
        let mut sim = Simulator::default();
        sim.flags.eof = EofBehavior::Sentinel(0xFFFF);
        sim.breakpoints.insert(Breakpoint::PC(0x3005));
        sim.reg_file[R0] = 9;
        sim.set_cc(0b001);

        sim.reset();
        assert_eq!(sim.reg_file[R0], 0);
        assert_eq!(sim.cc(), 0b010);
        assert_eq!(sim.flags.eof, EofBehavior::Sentinel(0xFFFF));
        assert_eq!(sim.breakpoints.len(), 1);
    }
}
