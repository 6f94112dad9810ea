//! Assembling generator programs into object files.
//!
//! Programs are not parsed from text. They are written as a Rust closure
//! (the *generator*) that drives an [`Assembler`], emitting one word per call
//! and recording labels as it goes.
//!
//! The assembler module notably consists of:
//! - [`assemble`]: the main function, which runs the generator twice and produces an object file.
//! - [`Assembler`]: the emitter passed to the generator (one method per opcode, plus aliases).
//! - [`SymbolTable`]: a mapping from label names to memory addresses.
//! - [`ObjectFile`]: the assembled words, which can be loaded into the simulator and executed.
//!
//! # Label resolution
//!
//! Labels may be referenced before they are defined. To make this work,
//! the generator is run exactly twice from the same origin:
//! - In the first pass, a forward reference resolves to `0`,
//!     so its encoded offset is garbage (and is discarded).
//! - In the second pass, a forward reference resolves to the address
//!     the label had at the end of the first pass.
//!
//! Since every emitting operation writes exactly one word,
//! label addresses do not depend on the values of other labels and
//! two passes are enough. This is checked rather than assumed:
//! after the second pass, every label has to have kept its first-pass address
//! (see [`AsmErrKind::UnstableLabel`]).

pub mod encoding;

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use crate::ast::reg_consts::R7;
use crate::ast::sim::SimInstr;
use crate::ast::{CondCode, IOffset, ImmOrReg, Offset, Reg};

/// Assembles a program by running its generator twice.
///
/// The generator receives an [`Assembler`] whose cursor starts at `origin`.
///
/// # Example
/// ```
/// use lc3_forth::asm::assemble;
/// use lc3_forth::ast::reg_consts::R0;
///
/// let obj = assemble(0x3000, |a| {
///     a.and(R0, R0, 0);
///     a.mark("loop");
///     a.add(R0, R0, 1);
///     a.brp("loop");
///     a.halt();
/// }).unwrap();
///
/// assert_eq!(obj.words(), &[0x5020, 0x1021, 0x03FE, 0xF025]);
/// assert_eq!(obj.symbol_table().lookup_label("loop"), Some(0x3001));
/// ```
pub fn assemble<F: FnMut(&mut Assembler)>(origin: u16, mut generator: F) -> Result<ObjectFile, AsmErr> {
    let mut asm = Assembler::new(origin);

    generator(&mut asm);
    tracing::debug!(pass = 1, words = asm.words.len(), labels = asm.labels.len(), "assembler pass complete");

    asm.next_pass();
    generator(&mut asm);
    tracing::debug!(pass = 2, words = asm.words.len(), labels = asm.labels.len(), "assembler pass complete");

    asm.finish()
}

/// Kinds of errors that can occur from assembling a generator.
///
/// See [`AsmErr`] for this error type with the offending label included.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum AsmErrKind {
    /// A label was referenced but never defined.
    UndefinedLabel,
    /// A label was defined more than once (at different addresses) in a single pass.
    DuplicateLabel,
    /// A label resolved to a different address in the second pass than it did in the first.
    UnstableLabel,
    /// The second pass emitted a different number of words than the first.
    UnstableLayout,
}
impl std::fmt::Display for AsmErrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UndefinedLabel => f.write_str("label could not be found"),
            Self::DuplicateLabel => f.write_str("label was defined multiple times"),
            Self::UnstableLabel  => f.write_str("label changed address between passes"),
            Self::UnstableLayout => f.write_str("program changed size between passes"),
        }
    }
}

/// Error from assembling a generator.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AsmErr {
    /// The kind of error.
    pub kind: AsmErrKind,
    /// The label associated with this error (if there is one).
    pub label: Option<String>,
}
impl AsmErr {
    /// Creates a new [`AsmErr`].
    pub fn new(kind: AsmErrKind, label: Option<&str>) -> Self {
        AsmErr { kind, label: label.map(String::from) }
    }
}
impl std::fmt::Display for AsmErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.kind, f)?;
        match &self.label {
            Some(label) => write!(f, ": {label:?}"),
            None => Ok(()),
        }
    }
}
impl std::error::Error for AsmErr {}
impl crate::err::Error for AsmErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self.kind {
            AsmErrKind::UndefinedLabel => Some("try defining this label with `mark` or `define`".into()),
            AsmErrKind::DuplicateLabel => Some("labels must be unique within a program, try renaming one of the labels".into()),
            AsmErrKind::UnstableLabel  => Some("the generator must emit the same words in the same order on every pass".into()),
            AsmErrKind::UnstableLayout => Some("the generator must emit the same words in the same order on every pass".into()),
        }
    }
}

/// A mapping from label names to memory addresses.
///
/// Labels are case-sensitive.
#[derive(PartialEq, Eq, Clone, Default)]
pub struct SymbolTable {
    label_map: BTreeMap<String, u16>,
}
impl SymbolTable {
    /// Creates an empty symbol table.
    pub fn new() -> Self {
        Default::default()
    }

    /// Gets the memory address of a given label (if it exists).
    pub fn lookup_label(&self, label: &str) -> Option<u16> {
        self.label_map.get(label).copied()
    }

    /// Gets a label at a given memory address (if one exists).
    ///
    /// If several labels share the address, the first in lexicographic order is returned.
    pub fn rev_lookup_label(&self, addr: u16) -> Option<&str> {
        self.label_map.iter()
            .find(|&(_, &a)| a == addr)
            .map(|(label, _)| &**label)
    }

    /// Gets an iterable of the mapping from labels to addresses (ordered by label).
    pub fn label_iter(&self) -> impl Iterator<Item=(&str, u16)> + '_ {
        self.label_map.iter()
            .map(|(label, &addr)| (&**label, addr))
    }

    /// The number of labels in this table.
    pub fn len(&self) -> usize {
        self.label_map.len()
    }

    /// Whether this table has no labels.
    pub fn is_empty(&self) -> bool {
        self.label_map.is_empty()
    }

    fn insert(&mut self, label: &str, addr: u16) -> Result<(), u16> {
        match self.label_map.entry(label.to_string()) {
            // Two labels with different addresses. Conflict.
            Entry::Occupied(e) if *e.get() != addr => Err(*e.get()),
            // Two labels with same address. No conflict.
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(e) => {
                e.insert(addr);
                Ok(())
            }
        }
    }
}
impl std::fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.label_map.iter().map(|(k, &v)| (k, Addr(v))))
            .finish()
    }
}

/// A PC-relative offset that did not fit in its field and was truncated.
///
/// These are recorded during the final pass and are not errors:
/// the instruction was still emitted with the low bits of the offset.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Overflow {
    /// Address of the instruction holding the offset.
    pub addr: u16,
    /// The address the instruction meant to reach.
    pub target: u16,
    /// The offset that was required (`target - (addr + 1)`).
    pub offset: i16,
    /// The bit size of the field.
    pub bits: u32,
}
impl std::fmt::Display for Overflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "offset #{} from x{:04X} to x{:04X} does not fit in {} bits", self.offset, self.addr, self.target, self.bits)
    }
}

/// Something that resolves to an address: a raw address or a label name.
///
/// Every PC-relative operand of an [`Assembler`] method accepts a `Target`,
/// so `a.br(0x3000)` and `a.br("loop")` both work.
pub trait Target {
    /// Resolves this target to an address in the assembler's current pass.
    fn resolve(self, asm: &mut Assembler) -> u16;
}
impl Target for u16 {
    fn resolve(self, _asm: &mut Assembler) -> u16 {
        self
    }
}
impl Target for &str {
    fn resolve(self, asm: &mut Assembler) -> u16 {
        asm.addr(self)
    }
}
impl Target for &String {
    fn resolve(self, asm: &mut Assembler) -> u16 {
        asm.addr(self)
    }
}

/// The emitter passed to a generator.
///
/// Each emitting method encodes one word at the cursor, advances the cursor
/// and returns the address it wrote to.
/// PC-relative operands are computed as `target - (cursor + 1)` and masked to the field width.
/// Out-of-range offsets are never rejected (see [`ObjectFile::overflows`]).
#[derive(Debug)]
pub struct Assembler {
    origin: u16,
    cursor: u16,
    pass: u8,
    words: Vec<u16>,

    /// Labels defined during this pass.
    labels: SymbolTable,
    /// Labels defined during the previous pass.
    prev_labels: SymbolTable,
    /// Every label referenced during this pass.
    referenced: BTreeSet<String>,
    /// Labels defined twice during this pass.
    duplicates: Vec<String>,
    overflows: Vec<Overflow>,
    /// Word count of the previous pass.
    prev_len: Option<usize>,
}

impl Assembler {
    fn new(origin: u16) -> Self {
        Self {
            origin,
            cursor: origin,
            pass: 1,
            words: vec![],
            labels: SymbolTable::new(),
            prev_labels: SymbolTable::new(),
            referenced: BTreeSet::new(),
            duplicates: vec![],
            overflows: vec![],
            prev_len: None,
        }
    }

    fn next_pass(&mut self) {
        self.prev_len = Some(self.words.len());
        self.prev_labels = std::mem::take(&mut self.labels);
        self.cursor = self.origin;
        self.pass += 1;
        self.words.clear();
        self.referenced.clear();
        self.duplicates.clear();
        self.overflows.clear();
    }

    fn finish(self) -> Result<ObjectFile, AsmErr> {
        if let Some(label) = self.duplicates.first() {
            return Err(AsmErr::new(AsmErrKind::DuplicateLabel, Some(label)));
        }
        if let Some(label) = self.referenced.iter().find(|l| self.labels.lookup_label(l).is_none()) {
            return Err(AsmErr::new(AsmErrKind::UndefinedLabel, Some(label)));
        }
        if let Some((label, _)) = self.labels.label_iter().find(|&(l, addr)| self.prev_labels.lookup_label(l) != Some(addr)) {
            return Err(AsmErr::new(AsmErrKind::UnstableLabel, Some(label)));
        }
        if self.prev_len != Some(self.words.len()) {
            return Err(AsmErr::new(AsmErrKind::UnstableLayout, None));
        }

        for o in &self.overflows {
            tracing::debug!("{o}");
        }
        Ok(ObjectFile {
            origin: self.origin,
            words: self.words,
            sym: self.labels,
            overflows: self.overflows,
        })
    }

    /// The current pass (1 or 2).
    pub fn pass(&self) -> u8 {
        self.pass
    }
    /// Whether this is the last pass (the one whose output is kept).
    pub fn is_final_pass(&self) -> bool {
        self.pass >= 2
    }
    /// The address the next word will be written to.
    pub fn cursor(&self) -> u16 {
        self.cursor
    }
    /// The address the generator started at.
    pub fn origin(&self) -> u16 {
        self.origin
    }

    /// Resolves a label.
    ///
    /// This returns the address given to the label earlier in this pass if it has one,
    /// otherwise its address from the previous pass, otherwise `0`.
    pub fn addr(&mut self, label: &str) -> u16 {
        if !self.referenced.contains(label) {
            self.referenced.insert(label.to_string());
        }

        self.labels.lookup_label(label)
            .or_else(|| self.prev_labels.lookup_label(label))
            .unwrap_or(0)
    }

    /// Binds a label to an address.
    pub fn define(&mut self, label: &str, addr: u16) {
        if self.labels.insert(label, addr).is_err() {
            self.duplicates.push(label.to_string());
        }
    }

    /// Binds a label to the cursor, returning the cursor.
    pub fn mark(&mut self, label: &str) -> u16 {
        let addr = self.cursor;
        self.define(label, addr);
        addr
    }

    /// Emits a raw data word (`.fill`).
    ///
    /// A label can be given to emit its address.
    pub fn fill(&mut self, value: impl Target) -> u16 {
        let word = value.resolve(self);
        self.emit_word(word)
    }

    /// Emits an instruction.
    pub fn emit(&mut self, instr: SimInstr) -> u16 {
        self.emit_word(instr.encode())
    }

    fn emit_word(&mut self, word: u16) -> u16 {
        let addr = self.cursor;
        self.words.push(word);
        self.cursor = self.cursor.wrapping_add(1);
        addr
    }

    /// Computes the PC-relative offset from the cursor to a target.
    fn pc_offset<const N: u32>(&mut self, target: impl Target) -> IOffset<N> {
        let target = target.resolve(self);
        let addr = self.cursor;
        let offset = target.wrapping_sub(addr.wrapping_add(1)) as i16;

        IOffset::new(offset).unwrap_or_else(|_| {
            if self.is_final_pass() {
                self.overflows.push(Overflow { addr, target, offset, bits: N });
            }
            IOffset::new_trunc(offset)
        })
    }

    /// `BR` with an arbitrary condition code mask.
    pub fn br_cc(&mut self, cc: CondCode, target: impl Target) -> u16 {
        let off = self.pc_offset(target);
        self.emit(SimInstr::BR(cc & 0b111, off))
    }
    /// Unconditional branch (`BRnzp`).
    pub fn br(&mut self, target: impl Target) -> u16 { self.br_cc(0b111, target) }
    #[allow(missing_docs)]
    pub fn brn(&mut self, target: impl Target) -> u16 { self.br_cc(0b100, target) }
    #[allow(missing_docs)]
    pub fn brz(&mut self, target: impl Target) -> u16 { self.br_cc(0b010, target) }
    #[allow(missing_docs)]
    pub fn brp(&mut self, target: impl Target) -> u16 { self.br_cc(0b001, target) }
    #[allow(missing_docs)]
    pub fn brnz(&mut self, target: impl Target) -> u16 { self.br_cc(0b110, target) }
    #[allow(missing_docs)]
    pub fn brnp(&mut self, target: impl Target) -> u16 { self.br_cc(0b101, target) }
    #[allow(missing_docs)]
    pub fn brzp(&mut self, target: impl Target) -> u16 { self.br_cc(0b011, target) }
    /// A branch that is never taken (`BR` with an empty mask and offset 0).
    pub fn nop(&mut self) -> u16 {
        self.emit(SimInstr::BR(0b000, Offset::new_trunc(0)))
    }

    /// `ADD`. The second source is a register or an immediate (masked to 5 bits).
    pub fn add(&mut self, dr: Reg, sr1: Reg, sr2: impl Into<ImmOrReg<5>>) -> u16 {
        self.emit(SimInstr::ADD(dr, sr1, sr2.into()))
    }
    /// `AND`. The second source is a register or an immediate (masked to 5 bits).
    pub fn and(&mut self, dr: Reg, sr1: Reg, sr2: impl Into<ImmOrReg<5>>) -> u16 {
        self.emit(SimInstr::AND(dr, sr1, sr2.into()))
    }
    #[allow(missing_docs)]
    pub fn not(&mut self, dr: Reg, sr: Reg) -> u16 {
        self.emit(SimInstr::NOT(dr, sr))
    }
    #[allow(missing_docs)]
    pub fn ld(&mut self, dr: Reg, target: impl Target) -> u16 {
        let off = self.pc_offset(target);
        self.emit(SimInstr::LD(dr, off))
    }
    #[allow(missing_docs)]
    pub fn ldi(&mut self, dr: Reg, target: impl Target) -> u16 {
        let off = self.pc_offset(target);
        self.emit(SimInstr::LDI(dr, off))
    }
    #[allow(missing_docs)]
    pub fn st(&mut self, sr: Reg, target: impl Target) -> u16 {
        let off = self.pc_offset(target);
        self.emit(SimInstr::ST(sr, off))
    }
    #[allow(missing_docs)]
    pub fn sti(&mut self, sr: Reg, target: impl Target) -> u16 {
        let off = self.pc_offset(target);
        self.emit(SimInstr::STI(sr, off))
    }
    #[allow(missing_docs)]
    pub fn lea(&mut self, dr: Reg, target: impl Target) -> u16 {
        let off = self.pc_offset(target);
        self.emit(SimInstr::LEA(dr, off))
    }
    /// `LDR`. The offset is masked to 6 bits.
    pub fn ldr(&mut self, dr: Reg, base: Reg, offset: i16) -> u16 {
        self.emit(SimInstr::LDR(dr, base, IOffset::new_trunc(offset)))
    }
    /// `STR`. The offset is masked to 6 bits.
    pub fn str(&mut self, sr: Reg, base: Reg, offset: i16) -> u16 {
        self.emit(SimInstr::STR(sr, base, IOffset::new_trunc(offset)))
    }
    #[allow(missing_docs)]
    pub fn jmp(&mut self, base: Reg) -> u16 {
        self.emit(SimInstr::JMP(base))
    }
    /// `JMP R7`.
    pub fn ret(&mut self) -> u16 {
        self.jmp(R7)
    }
    #[allow(missing_docs)]
    pub fn jsr(&mut self, target: impl Target) -> u16 {
        let off = self.pc_offset(target);
        self.emit(SimInstr::JSR(off))
    }
    /// `TRAP` with a vector masked to 8 bits.
    pub fn trap(&mut self, vect: u16) -> u16 {
        self.emit(SimInstr::TRAP(Offset::new_trunc(vect)))
    }
    /// `TRAP x20`.
    pub fn getc(&mut self) -> u16 { self.trap(0x20) }
    /// `TRAP x21`.
    pub fn putc(&mut self) -> u16 { self.trap(0x21) }
    /// `TRAP x25`.
    pub fn halt(&mut self) -> u16 { self.trap(0x25) }
}

/// An object file.
///
/// This is the final product after a generator is fully assembled:
/// a contiguous run of words starting at an origin.
/// This can be loaded in the simulator to run the assembled code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ObjectFile {
    origin: u16,
    words: Vec<u16>,
    sym: SymbolTable,
    overflows: Vec<Overflow>,
}
impl ObjectFile {
    /// Creates an object file out of raw words (with no symbols).
    pub fn from_words(origin: u16, words: Vec<u16>) -> Self {
        ObjectFile { origin, words, sym: SymbolTable::new(), overflows: vec![] }
    }

    /// The address of the first word.
    pub fn origin(&self) -> u16 {
        self.origin
    }
    /// The address one past the last word (wrapping).
    pub fn end(&self) -> u16 {
        self.origin.wrapping_add(self.words.len() as u16)
    }
    /// The assembled words.
    pub fn words(&self) -> &[u16] {
        &self.words
    }
    /// The number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }
    /// Whether this object file has no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Gets an iterator over all of the memory locations defined in the object file.
    pub fn addr_iter(&self) -> impl Iterator<Item=(u16, u16)> + '_ {
        self.words.iter()
            .enumerate()
            .map(|(i, &w)| (self.origin.wrapping_add(i as u16), w))
    }
    /// Gets the word at a given address, if the address is in this object file.
    pub fn get(&self, addr: u16) -> Option<u16> {
        self.words.get(usize::from(addr.wrapping_sub(self.origin))).copied()
    }

    /// The labels defined by the generator.
    pub fn symbol_table(&self) -> &SymbolTable {
        &self.sym
    }
    /// Every PC-relative offset that had to be truncated in the final pass.
    pub fn overflows(&self) -> &[Overflow] {
        &self.overflows
    }
}

/// Used for [`std::fmt::Debug`] purposes.
#[repr(transparent)]
struct Addr(u16);
impl std::fmt::Debug for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "x{:04X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::reg_consts::{R0, R1, R2, R3};
    use crate::sim::{PauseCondition, SimFlags, Simulator};

    use super::{assemble, AsmErrKind, ObjectFile, Overflow};

    fn run(obj: &ObjectFile, regs: &[(crate::ast::Reg, u16)]) -> Simulator {
        let mut sim = Simulator::new(SimFlags::default());
        sim.load_obj_file(obj);
        for &(r, v) in regs {
            sim.reg_file[r] = v;
        }
        assert_eq!(sim.run_with_limit(10_000).unwrap(), PauseCondition::Halt);
        sim
    }

    #[test]
    fn test_sym_basic() {
        let obj = assemble(0x3000, |a| {
            a.mark("A");
            a.add(R0, R0, 0);
            a.and(R0, R0, 1);
            a.mark("C");
            a.add(R0, R0, 0);
            a.mark("D");
            a.ld(R0, 0x3002u16);
            a.halt();
            a.halt();
            a.mark("E");
            a.br("C");
            a.mark("B");
            a.jsr("A");
        }).unwrap();

        let sym = obj.symbol_table();
        assert_eq!(sym.lookup_label("A"), Some(0x3000));
        assert_eq!(sym.lookup_label("C"), Some(0x3002));
        assert_eq!(sym.lookup_label("D"), Some(0x3003));
        assert_eq!(sym.lookup_label("E"), Some(0x3006));
        assert_eq!(sym.lookup_label("B"), Some(0x3007));
        assert_eq!(sym.lookup_label("c"), None);
        assert_eq!(sym.rev_lookup_label(0x3006), Some("E"));

        // offsets
        assert_eq!(obj.get(0x3003), Some(0x21FE)); // LD R0, #-2
        assert_eq!(obj.get(0x3006), Some(0x0FFB)); // BR #-5
        assert_eq!(obj.get(0x3007), Some(0x49F8)); // JSR #-8
        assert_eq!(obj.end(), 0x3008);
    }

    #[test]
    fn test_subtraction_round_trip() {
        // R2 = R0 - R1
        let obj = assemble(0x3000, |a| {
            a.not(R2, R1);
            a.add(R2, R2, 1);
            a.add(R2, R0, R2);
            a.halt();
        }).unwrap();

        for (x, y, diff) in [(5, 2, 3i16), (7, 11, -4), (0, 0, 0), (32767, -32768, -1)] {
            let sim = run(&obj, &[(R0, x as u16), (R1, y as u16)]);
            assert_eq!(sim.reg_file[R2] as i16, diff, "{x} - {y}");
        }
    }

    #[test]
    fn test_subtraction_through_memory() {
        // z = x - y, with the operands patched in between runs
        let obj = assemble(0x3000, |a| {
            a.ld(R0, "x");
            a.ld(R1, "y");
            a.not(R2, R1);
            a.add(R2, R2, 1);
            a.add(R2, R0, R2);
            a.st(R2, "z");
            a.halt();
            a.mark("x");
            a.fill(0u16);
            a.mark("y");
            a.fill(0u16);
            a.mark("z");
            a.fill(0u16);
        }).unwrap();

        let sym = obj.symbol_table();
        let [x_addr, y_addr, z_addr] = ["x", "y", "z"].map(|l| sym.lookup_label(l).unwrap());
        assert_eq!(obj.words()[..6], [0x2006, 0x2206, 0x947F, 0x14A1, 0x1402, 0x3403]);

        let mut sim = Simulator::new(SimFlags::default());
        sim.load_obj_file(&obj);
        for (x, y, diff) in [(5, 2, 3i16), (7, 11, -4), (0, 0, 0), (32767, -32768, -1)] {
            sim.mem[x_addr] = x as u16;
            sim.mem[y_addr] = y as u16;
            sim.pc = obj.origin();
            assert_eq!(sim.run_with_limit(100).unwrap(), PauseCondition::Halt);
            assert_eq!(sim.mem[z_addr] as i16, diff, "{x} - {y}");
        }
    }

    #[test]
    fn test_forward_and_backward_branches() {
        let obj = assemble(0x3000, |a| {
            a.and(R0, R0, 0);
            a.and(R1, R1, 0);
            a.add(R1, R1, 5);
            a.br("body");
            a.mark("top");
            a.add(R0, R0, 3);
            a.add(R1, R1, -1);
            a.mark("body");
            a.brp("top");
            a.halt();
        }).unwrap();

        let sym = obj.symbol_table();
        let body = sym.lookup_label("body").unwrap();
        let top = sym.lookup_label("top").unwrap();

        // the forward branch lands on `body`, the backward one on `top`
        assert_eq!(obj.get(0x3003), Some(0x0E00 | (body - 0x3004)));
        assert_eq!(obj.get(body), Some(0x0200 | (top.wrapping_sub(body + 1) & 0x1FF)));

        let sim = run(&obj, &[]);
        assert_eq!(sim.reg_file[R0], 15);
        assert_eq!(sim.reg_file[R1], 0);
    }

    #[test]
    fn test_truncation() {
        let obj = assemble(0x3000, |a| {
            a.br(0x3101u16);
            a.ld(R0, 0x2F01u16);
            a.add(R0, R0, 0x10);
            a.ldr(R0, R1, 32);
        }).unwrap();

        // 256 masks to -256, -257 masks to 255
        assert_eq!(obj.words(), &[0x0F00, 0x20FF, 0x1030, 0x6060]);
        assert_eq!(obj.overflows(), &[
            Overflow { addr: 0x3000, target: 0x3101, offset: 256, bits: 9 },
            Overflow { addr: 0x3001, target: 0x2F01, offset: -257, bits: 9 },
        ]);
    }

    #[test]
    fn test_deep_forward_chain() {
        // Every label is referenced before it is defined,
        // and every definition is reached through a chain of forward branches.
        let obj = assemble(0x3000, |a| {
            a.and(R3, R3, 0);
            a.br("l0");
            for i in 0..50 {
                a.mark(&format!("l{i}"));
                a.add(R3, R3, 1);
                a.br(&format!("l{}", i + 1));
                a.fill(0xDEADu16);
            }
            a.mark("l50");
            a.halt();
        }).unwrap();

        assert!(obj.overflows().is_empty());
        let sim = run(&obj, &[]);
        assert_eq!(sim.reg_file[R3], 50);
    }

    #[test]
    fn test_fill_label() {
        let obj = assemble(0x4000, |a| {
            a.fill("end");
            a.fill("start");
            a.mark("start");
            a.fill(0x1234u16);
            a.mark("end");
        }).unwrap();

        assert_eq!(obj.words(), &[0x4003, 0x4002, 0x1234]);
    }

    #[test]
    fn test_labels_fail() {
        let err = assemble(0x3000, |a| {
            a.br("nowhere");
        }).unwrap_err();
        assert_eq!(err.kind, AsmErrKind::UndefinedLabel);
        assert_eq!(err.label.as_deref(), Some("nowhere"));

        let err = assemble(0x3000, |a| {
            a.mark("twice");
            a.nop();
            a.mark("twice");
        }).unwrap_err();
        assert_eq!(err.kind, AsmErrKind::DuplicateLabel);

        // same label, same address is not a conflict
        assert!(assemble(0x3000, |a| {
            a.mark("same");
            a.define("same", 0x3000);
            a.nop();
        }).is_ok());
    }

    #[test]
    fn test_unstable_generators() {
        let err = assemble(0x3000, |a| {
            if a.pass() == 2 { a.nop(); }
            a.mark("x");
            a.br("x");
        }).unwrap_err();
        assert_eq!(err.kind, AsmErrKind::UnstableLabel);

        let err = assemble(0x3000, |a| {
            a.nop();
            if a.is_final_pass() { a.nop(); }
        }).unwrap_err();
        assert_eq!(err.kind, AsmErrKind::UnstableLayout);
    }
}
