//! A Forth system running on the simulator.
//!
//! The Forth system itself is LC-3 code (see [`runtime`]), so everything here is host-side:
//! [`Forth`] boots the runtime in a [`Simulator`], feeds it console input,
//! collects its console output, and reads its state back out of memory.
//!
//! This module consists of:
//! - [`Forth`]: An execution session of the runtime.
//! - [`Config`]: Configuration for a session.
//! - [`runtime`]: The generator of the runtime's code.
//! - [`layout`]: Where the runtime keeps its buffers, variables, stacks and dictionary.
//! - [`dict`]: A host-side view of the dictionary.
//!
//! # Usage
//!
//! ```
//! use lc3_forth::forth::{Forth, Mode};
//!
//! let mut forth = Forth::new(Default::default()).unwrap();
//!
//! forth.eval("1 1 + 1 +").unwrap();
//! assert_eq!(forth.data_stack(), [3]);
//!
//! forth.eval(": inc 1 + ;").unwrap();
//! assert_eq!(forth.mode(), Mode::Interpreting);
//! forth.eval("inc").unwrap();
//! assert_eq!(forth.data_stack(), [4]);
//!
//! // Unknown words print `?` and reset the interpreter (emptying the stacks).
//! assert_eq!(forth.eval("nope").unwrap(), "?");
//! assert!(forth.data_stack().is_empty());
//! ```
pub mod dict;
pub mod layout;
pub mod runtime;

use crate::asm::{AsmErr, AsmErrKind, ObjectFile};
use crate::sim::debug::Breakpoint;
use crate::sim::io::BufferedIO;
use crate::sim::{EofBehavior, PauseCondition, SimErr, SimFlags, Simulator};

use self::dict::{Body, Dictionary};
use self::layout::{Layout, LayoutErr};
use self::runtime::{IP, RP, SP};

/// Words defined at the start of every session (unless disabled in [`Config`]).
///
/// These only use the built-in words.
pub const PRELUDE: &str = "\
: dup sp@ @ ;
: invert dup nand ;
: and nand invert ;
: negate invert 1 + ;
: - negate + ;
: drop dup - + ;
: over sp@ 1 - @ ;
: 2 1 1 + ;
: cr 2 2 + 2 + 2 + 2 + emit ;
";

/// Configuration for a [`Forth`] session.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Config {
    /// The memory layout of the runtime.
    pub layout: Layout,
    /// Forth source evaluated line by line after booting (by default, [`PRELUDE`]).
    pub prelude: Option<String>,
    /// The most instructions a single [`Forth::run`] may execute before giving up.
    ///
    /// By default, this is 10 million.
    pub step_limit: Option<u64>,
    /// Simulator flags.
    ///
    /// The session relies on pausing at the end of input,
    /// so the EOF behavior is always [`EofBehavior::Pause`].
    pub sim: SimFlags,
    /// Whether to record a [`Snapshot`] before every `TRAP x00` through `TRAP x0F`
    /// (e.g., the `debug` word).
    pub trace: bool,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            layout: Layout::default(),
            prelude: Some(PRELUDE.to_string()),
            step_limit: Some(10_000_000),
            sim: SimFlags::default(),
            trace: false,
        }
    }
}

/// Errors from a Forth session.
///
/// Forth-level errors (unknown words, bad definitions) are not errors here:
/// the runtime prints `?` and recovers on its own.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ForthErr {
    /// The runtime failed to assemble.
    Asm(AsmErr),
    /// The layout is invalid.
    Layout(LayoutErr),
    /// The simulator stopped with an error.
    Sim(SimErr),
    /// A run executed too many instructions without waiting for input.
    StepLimit(u64),
    /// A line of the prelude printed something (most likely a `?`).
    Prelude {
        /// The offending line.
        line: String,
        /// What it printed.
        output: String,
    },
}
impl std::fmt::Display for ForthErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForthErr::Asm(e)    => write!(f, "could not assemble runtime: {e}"),
            ForthErr::Layout(e) => write!(f, "invalid layout: {e}"),
            ForthErr::Sim(e)    => std::fmt::Display::fmt(e, f),
            ForthErr::StepLimit(n) => write!(f, "runtime did not wait for input after {n} instructions"),
            ForthErr::Prelude { line, output } => write!(f, "prelude line {line:?} printed {output:?}"),
        }
    }
}
impl std::error::Error for ForthErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ForthErr::Asm(e)    => Some(e),
            ForthErr::Layout(e) => Some(e),
            ForthErr::Sim(e)    => Some(e),
            _ => None,
        }
    }
}
impl crate::err::Error for ForthErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        use crate::err::Error;

        match self {
            ForthErr::Asm(e)    => e.help(),
            ForthErr::Layout(e) => e.help(),
            ForthErr::Sim(e)    => e.help(),
            ForthErr::StepLimit(_) => Some("a word may be looping forever (e.g., a definition that calls itself)".into()),
            ForthErr::Prelude { .. } => Some("every prelude word has to be defined from words that already exist".into()),
        }
    }
}
impl From<AsmErr> for ForthErr {
    fn from(value: AsmErr) -> Self {
        ForthErr::Asm(value)
    }
}
impl From<LayoutErr> for ForthErr {
    fn from(value: LayoutErr) -> Self {
        ForthErr::Layout(value)
    }
}
impl From<SimErr> for ForthErr {
    fn from(value: SimErr) -> Self {
        ForthErr::Sim(value)
    }
}

/// Whether the outer interpreter is executing or compiling words.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Mode {
    /// Words are executed (`state` is anything but 1).
    Interpreting,
    /// Non-immediate words are appended to the newest definition (`state` = 1).
    Compiling,
}

/// The machine state at some point of execution (see [`Config::trace`]).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Snapshot {
    /// The PC.
    pub pc: u16,
    /// The word at the PC.
    pub word: u16,
    /// R0 through R7.
    pub regs: [u16; 8],
    /// The condition code.
    pub cc: u8,
    /// The data stack (bottom first).
    pub data_stack: Vec<u16>,
    /// The return stack (bottom first).
    pub return_stack: Vec<u16>,
    /// The value of `>in` and the character it points at.
    pub toin: (u16, u16),
    /// The value of `latest`.
    pub latest: u16,
    /// The value of `here`.
    pub here: u16,
    /// The value of `state`.
    pub state: u16,
    layout: Layout,
}
impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [r0, r1, r2, r3, ip, sp, rp, r7] = self.regs;
        let flag = |bit: u8, c: char| if self.cc & bit != 0 { c } else { '-' };
        writeln!(f,
            "{:04X} | {:04X} | R0={r0:04X} R1={r1:04X} R2={r2:04X} R3={r3:04X} IP={ip:04X} SP={sp:04X} RP={rp:04X} R7={r7:04X} | {}{}{}",
            self.pc, self.word, flag(0b100, 'n'), flag(0b010, 'z'), flag(0b001, 'p')
        )?;

        for (name, base, stack) in [("SP", self.layout.sp0, &self.data_stack), ("RP", self.layout.rp0, &self.return_stack)] {
            write!(f, "{name:>4} | {base:04X} |")?;
            for cell in stack {
                write!(f, " {cell:04X}")?;
            }
            writeln!(f)?;
        }
        writeln!(f, " >IN | {:04X} | {:04X} [{:02X}]", self.layout.toin, self.toin.0, self.toin.1)?;
        writeln!(f, "LATE | {:04X} | {:04X}", self.layout.latest, self.latest)?;
        writeln!(f, "HERE | {:04X} | {:04X}", self.layout.here, self.here)?;
        writeln!(f, "STAT | {:04X} | {:04X}", self.layout.state, self.state)
    }
}

/// An execution session of the Forth runtime.
///
/// The session owns the simulator running the runtime and the buffers behind its console.
/// Input is supplied with [`Forth::feed`] (or [`Forth::eval`]),
/// and the runtime runs until it needs more input than it was given.
pub struct Forth {
    sim: Simulator,
    io: BufferedIO,
    layout: Layout,
    image: ObjectFile,
    docol: u16,
    exit: u16,
    step_limit: Option<u64>,
    traces: Vec<Snapshot>,
}

impl Forth {
    /// Assembles and boots the runtime, then evaluates the prelude.
    pub fn new(config: Config) -> Result<Self, ForthErr> {
        let Config { layout, prelude, step_limit, sim: mut flags, trace } = config;

        let image = runtime::assemble_runtime(&layout)?;
        layout.validate(image.len())?;
        for o in image.overflows() {
            tracing::warn!("runtime offset truncated: {o}");
        }

        let label = |name: &str| {
            image.symbol_table()
                .lookup_label(name)
                .ok_or_else(|| AsmErr::new(AsmErrKind::UndefinedLabel, Some(name)))
        };
        let docol = label(runtime::DOCOL)?;
        let exit = label(&runtime::xt_label("exit"))?;

        if flags.eof != EofBehavior::Pause {
            tracing::debug!(eof = ?flags.eof, "forth sessions pause at the end of input, ignoring EOF flag");
            flags.eof = EofBehavior::Pause;
        }
        let mut sim = Simulator::new(flags);
        sim.load_obj_file(&image);
        if trace {
            sim.breakpoints.extend((0x00..=0x0F).map(Breakpoint::Trap));
        }

        let io = BufferedIO::new();
        sim.open_io(io.clone());

        let mut forth = Forth { sim, io, layout, image, docol, exit, step_limit, traces: vec![] };

        // boot: runs until the first read
        forth.run()?;
        tracing::debug!(words = forth.image.len(), "forth runtime booted");

        for line in prelude.iter().flat_map(|p| p.lines()) {
            let output = forth.eval(line)?;
            if !output.is_empty() {
                return Err(ForthErr::Prelude { line: line.to_string(), output });
            }
        }
        Ok(forth)
    }

    /// Appends input to the console (without running anything).
    ///
    /// The runtime reads bytes, so the input does not have to be UTF-8.
    pub fn feed(&mut self, input: impl AsRef<[u8]>) {
        self.io.push_input(input.as_ref());
    }

    /// Runs the runtime until it halts (via `bye`) or runs out of input.
    ///
    /// If tracing is enabled, a snapshot is recorded every time a trace point is hit.
    pub fn run(&mut self) -> Result<PauseCondition, ForthErr> {
        let start = self.sim.instructions_run;
        loop {
            let result = match self.step_limit {
                Some(limit) => {
                    let remaining = limit.saturating_sub(self.sim.instructions_run.wrapping_sub(start));
                    self.sim.run_with_limit(remaining)?
                },
                None => self.sim.run()?,
            };

            match result {
                PauseCondition::Breakpoint => {
                    let snapshot = self.snapshot();
                    tracing::trace!(pc = snapshot.pc, "trace point");
                    self.traces.push(snapshot);
                },
                PauseCondition::Tripwire => return Err(ForthErr::StepLimit(self.step_limit.unwrap_or(0))),
                cond => return Ok(cond),
            }
        }
    }

    /// Evaluates one line of input, returning whatever was printed.
    ///
    /// The line is fed with a trailing newline.
    /// If the runtime needs more input to finish (e.g., an unfinished definition),
    /// the state is kept and the next call continues where this one stopped.
    pub fn eval(&mut self, line: &str) -> Result<String, ForthErr> {
        self.feed(line);
        self.feed("\n");
        self.run()?;
        Ok(self.take_output())
    }

    /// Takes everything the runtime printed so far.
    ///
    /// Bytes that are not UTF-8 are replaced (see [`Forth::take_output_bytes`]).
    pub fn take_output(&mut self) -> String {
        String::from_utf8_lossy(&self.io.take_output()).into_owned()
    }

    /// Takes every byte the runtime printed so far.
    pub fn take_output_bytes(&mut self) -> Vec<u8> {
        self.io.take_output()
    }

    /// Takes the snapshots recorded since the last call (see [`Config::trace`]).
    pub fn take_traces(&mut self) -> Vec<Snapshot> {
        std::mem::take(&mut self.traces)
    }

    /// Whether the runtime has executed `bye`.
    pub fn halted(&self) -> bool {
        self.sim.hit_halt()
    }

    /// Reads a stack growing up from `base` to `top` (bottom first).
    ///
    /// An underflowed stack reads as empty.
    fn stack(&self, base: u16, top: u16) -> Vec<u16> {
        let depth = top.wrapping_sub(base);
        match depth <= self.layout.stack_len {
            true  => self.sim.mem.read_block(base.wrapping_add(1), depth),
            false => vec![],
        }
    }

    /// The data stack (bottom first).
    pub fn data_stack(&self) -> Vec<u16> {
        self.stack(self.layout.sp0, self.sim.reg_file[SP])
    }

    /// The return stack (bottom first).
    pub fn return_stack(&self) -> Vec<u16> {
        self.stack(self.layout.rp0, self.sim.reg_file[RP])
    }

    /// Whether the outer interpreter is compiling.
    ///
    /// The runtime only compiles while `state` is exactly 1.
    /// Any other value (e.g., one stored with `state !`) executes every word.
    pub fn mode(&self) -> Mode {
        match self.sim.mem[self.layout.state] {
            1 => Mode::Compiling,
            _ => Mode::Interpreting,
        }
    }

    /// The address of the newest dictionary header.
    pub fn latest(&self) -> u16 {
        self.sim.mem[self.layout.latest]
    }

    /// The address of the next free dictionary cell.
    pub fn here(&self) -> u16 {
        self.sim.mem[self.layout.here]
    }

    /// A view of the dictionary.
    pub fn dictionary(&self) -> Dictionary<'_> {
        Dictionary::new(&self.sim.mem, self.latest(), self.here(), self.docol, self.exit)
    }

    /// Renders a colon definition as source (see [`Dictionary::decompile`]).
    pub fn see(&self, name: &str) -> Option<String> {
        let dict = self.dictionary();
        dict.decompile(&dict.find(name)?)
    }

    /// Decodes the body of a word (see [`Dictionary::body`]).
    pub fn body(&self, name: &str) -> Option<Body> {
        let dict = self.dictionary();
        Some(dict.body(&dict.find(name)?))
    }

    /// The execution token of `exit`.
    pub fn exit_xt(&self) -> u16 {
        self.exit
    }

    /// The assembled runtime.
    pub fn image(&self) -> &ObjectFile {
        &self.image
    }

    /// The layout the runtime was assembled for.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The simulator running the runtime.
    pub fn simulator(&self) -> &Simulator {
        &self.sim
    }

    /// Captures registers, stacks and the interpreter variables.
    pub fn snapshot(&self) -> Snapshot {
        let mem = &self.sim.mem;
        let pc = self.sim.prefetch_pc();
        let toin = mem[self.layout.toin];

        Snapshot {
            pc,
            word: mem[pc],
            regs: *self.sim.reg_file.as_array(),
            cc: self.sim.cc(),
            data_stack: self.data_stack(),
            return_stack: self.return_stack(),
            toin: (toin, mem[toin]),
            latest: self.latest(),
            here: self.here(),
            state: mem[self.layout.state],
            layout: self.layout,
        }
    }

    /// The inner interpreter's instruction pointer.
    pub fn ip(&self) -> u16 {
        self.sim.reg_file[IP]
    }
}
impl std::fmt::Debug for Forth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forth")
            .field("mode", &self.mode())
            .field("data_stack", &self.data_stack())
            .field("latest", &self.latest())
            .field("here", &self.here())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::asm::encoding::{BinaryFormat, ObjFileFormat};
    use crate::sim::io::BufferedIO;
    use crate::sim::{PauseCondition, Simulator};

    use super::dict::Body;
    use super::layout::{Layout, LayoutErr};
    use super::{Config, Forth, ForthErr, Mode};

    fn bare() -> Forth {
        Forth::new(Config { prelude: None, ..Default::default() }).unwrap()
    }

    #[test]
    fn test_boot() {
        let forth = bare();
        assert_eq!(forth.mode(), Mode::Interpreting);
        assert!(forth.data_stack().is_empty());
        assert!(forth.return_stack().is_empty());
        assert_eq!(forth.here(), 0x7000);
        assert_eq!(forth.dictionary().find("debug").map(|e| e.addr), Some(forth.latest()));
        assert!(forth.simulator().hit_input_exhausted());
    }

    #[test]
    fn test_colon_definition() {
        let mut forth = bare();
        assert_eq!(forth.eval("1 1 + 1 + 1 + 1 +").unwrap(), "");
        assert_eq!(forth.data_stack(), [5]);

        assert_eq!(forth.eval(": inc 1 + ;").unwrap(), "");
        assert_eq!(forth.mode(), Mode::Interpreting);
        assert_eq!(forth.data_stack(), [5]);

        forth.eval("inc").unwrap();
        assert_eq!(forth.data_stack(), [6]);
        assert!(forth.return_stack().is_empty());
        assert_eq!(forth.see("inc").as_deref(), Some(": inc 1 + ;"));
    }

    #[test]
    fn test_empty_definition() {
        let mut forth = bare();
        forth.eval(": foo ;").unwrap();
        assert_eq!(forth.mode(), Mode::Interpreting);
        assert_eq!(forth.body("foo"), Some(Body::Threaded(vec![forth.exit_xt()])));

        // header (2 + 3) + prologue (3) + exit (1)
        assert_eq!(forth.here(), 0x7000 + 9);
        forth.eval("foo foo").unwrap();
        assert!(forth.data_stack().is_empty());
    }

    #[test]
    fn test_shadowing() {
        let mut forth = bare();
        forth.eval(": one 1 ;").unwrap();
        forth.eval(": one 0 ;").unwrap();
        forth.eval("one").unwrap();
        assert_eq!(forth.data_stack(), [0]);

        let dict = forth.dictionary();
        let newest = dict.find("one").unwrap();
        let older = dict.entry_at(newest.link);
        assert_eq!(older.name, "one");
        assert_eq!(dict.decompile(&older).as_deref(), Some(": one 1 ;"));
    }

    #[test]
    fn test_unknown_words() {
        let mut forth = bare();
        forth.eval("1 1").unwrap();
        assert_eq!(forth.eval("1 bogus 1").unwrap(), "?");
        assert!(forth.data_stack().is_empty());
        assert_eq!(forth.mode(), Mode::Interpreting);

        // inside a definition: the definition is discarded
        let (latest, here) = (forth.latest(), forth.here());
        assert_eq!(forth.eval(": bad 1 zork ;").unwrap(), "?");
        assert_eq!(forth.mode(), Mode::Interpreting);
        assert_eq!((forth.latest(), forth.here()), (latest, here));
        assert_eq!(forth.dictionary().find("bad"), None);

        // words are case-sensitive
        assert_eq!(forth.eval("BYE").unwrap(), "?");
    }

    #[test]
    fn test_rejected_definitions() {
        let mut forth = bare();
        let (latest, here) = (forth.latest(), forth.here());

        // nested definitions
        assert_eq!(forth.eval(": a 1 : b ;").unwrap(), "?");
        assert_eq!(forth.mode(), Mode::Interpreting);
        assert_eq!((forth.latest(), forth.here()), (latest, here));

        // names are limited to 15 characters
        assert_eq!(forth.eval(": abcdefghijklmnop 1 ;").unwrap(), "?");
        assert_eq!((forth.latest(), forth.here()), (latest, here));

        assert_eq!(forth.eval(": abcdefghijklmno 1 ;").unwrap(), "");
        forth.eval("abcdefghijklmno abcdefghijklmno").unwrap();
        assert_eq!(forth.data_stack(), [1, 1]);
    }

    #[test]
    fn test_input_exhaustion() {
        let mut forth = bare();
        forth.eval("1 1 + 1 + 1 + 1 +").unwrap();

        // definition split across lines
        assert_eq!(forth.eval(": inc2").unwrap(), "");
        assert_eq!(forth.mode(), Mode::Compiling);
        assert_eq!(forth.data_stack(), [5]);
        assert_eq!(forth.dictionary().names()[0], "inc2");

        forth.eval("1 + 1 + ;").unwrap();
        assert_eq!(forth.mode(), Mode::Interpreting);
        forth.eval("inc2").unwrap();
        assert_eq!(forth.data_stack(), [7]);

        // key waits for input
        forth.eval("key").unwrap();
        assert_eq!(forth.data_stack(), [7]);
        forth.feed("A");
        assert_eq!(forth.run().unwrap(), PauseCondition::InputExhausted);
        assert_eq!(forth.data_stack(), [7, 65]);
    }

    #[test]
    fn test_mode_follows_dispatch() {
        let mut forth = bare();
        forth.eval("1 1 + state !").unwrap();
        assert_eq!(forth.simulator().mem[forth.layout().state], 2);
        assert_eq!(forth.mode(), Mode::Interpreting);

        // 1 still executes
        forth.eval("1").unwrap();
        assert_eq!(forth.data_stack(), [1]);

        forth.eval("1 state !").unwrap();
        assert_eq!(forth.mode(), Mode::Compiling);
    }

    #[test]
    fn test_raw_bytes() {
        let mut forth = bare();
        forth.feed(b"\xFF\n");
        forth.run().unwrap();
        assert_eq!(forth.take_output_bytes(), b"?");

        forth.feed(b"key emit\n\xC3");
        assert_eq!(forth.run().unwrap(), PauseCondition::InputExhausted);
        assert_eq!(forth.take_output_bytes(), [0xC3]);
        assert!(forth.data_stack().is_empty());
    }

    #[test]
    fn test_long_lines_are_split() {
        let layout = Layout { tib_len: 8, ..Default::default() };
        let mut forth = Forth::new(Config { layout, prelude: None, ..Default::default() }).unwrap();

        // 7 characters fit, the rest is read as the next line
        // ("0 0 0 0" and "=")
        forth.eval("1 1 1 1 1").unwrap();
        assert_eq!(forth.data_stack(), [1, 1, 1, 1, 1]);
        assert_eq!(forth.eval("0 0 0 0=").unwrap(), "?");
        assert!(forth.data_stack().is_empty());
    }

    #[test]
    fn test_prelude() {
        let mut forth = Forth::new(Default::default()).unwrap();
        assert_eq!(forth.eval("2 dup + dup + dup + dup + dup + 1 + emit cr").unwrap(), "A\n");
        assert!(forth.data_stack().is_empty());

        forth.eval("1 2 + dup + 2 - negate").unwrap();
        assert_eq!(forth.data_stack(), [(-4i16) as u16]);
        forth.eval("drop 0 0= 1 0= 1 1 and 0 invert 2 1 over").unwrap();
        assert_eq!(forth.data_stack(), [0xFFFF, 0, 1, 0xFFFF, 2, 1, 2]);
    }

    #[test]
    fn test_variables() {
        let mut forth = bare();
        forth.eval("tib >in latest state here").unwrap();
        assert_eq!(forth.data_stack(), [0x4000, 0x4100, 0x4101, 0x4102, 0x4103]);

        // here @ reads the dictionary pointer
        forth.eval("here @").unwrap();
        assert_eq!(forth.data_stack(), [0x4000, 0x4100, 0x4101, 0x4102, 0x4103, 0x7000]);
    }

    #[test]
    fn test_bye() {
        let mut forth = bare();
        forth.eval("1 bye 1").unwrap();
        assert!(forth.halted());
        assert_eq!(forth.data_stack(), [1]);
    }

    #[test]
    fn test_step_limit() {
        let mut forth = Forth::new(Config { prelude: None, step_limit: Some(1000), ..Default::default() }).unwrap();
        forth.eval(": f f ;").unwrap();
        assert_eq!(forth.eval("f"), Err(ForthErr::StepLimit(1000)));
    }

    #[test]
    fn test_bad_layout() {
        let layout = Layout { tib: 0x3010, ..Default::default() };
        let err = Forth::new(Config { layout, ..Default::default() }).unwrap_err();
        assert_eq!(err, ForthErr::Layout(LayoutErr::Overlap("code", "TIB")));
    }

    #[test]
    fn test_trace() {
        let mut forth = Forth::new(Config { prelude: None, trace: true, ..Default::default() }).unwrap();
        forth.eval("1 debug 1").unwrap();
        assert_eq!(forth.data_stack(), [1, 1]);

        let traces = forth.take_traces();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].word, 0xF000);
        assert_eq!(traces[0].data_stack, [1]);
        assert_eq!(traces[0].state, 0);

        let text = traces[0].to_string();
        assert!(text.contains("  SP | 5000 | 0001"), "{text}");
        assert!(text.contains(" >IN | 4100 |"), "{text}");
        assert!(forth.take_traces().is_empty());
    }

    #[test]
    fn test_image_reproduces_execution() {
        let mut forth = bare();
        let input = "1 emit 0 emit bogus\n: inc 1 + ;\n1 inc inc emit\n";
        let output: String = input.lines()
            .map(|line| forth.eval(line).unwrap())
            .collect();
        assert_eq!(output, "\x01\x00?\x03");

        // the session's output again, from the image alone
        let bytes = BinaryFormat::serialize(forth.image());
        let image = BinaryFormat::deserialize(&bytes).unwrap();
        let mut sim = Simulator::default();
        sim.load_obj_file(&image);
        let io = BufferedIO::new();
        sim.open_io(io.clone());
        io.push_input(input.as_bytes());
        assert_eq!(sim.run_with_limit(1_000_000).unwrap(), PauseCondition::InputExhausted);

        assert_eq!(io.take_output(), b"\x01\x00?\x03");
        assert_eq!(sim.mem[0x4101], forth.latest());
        assert_eq!(sim.mem[0x4103], forth.here());
    }
}
