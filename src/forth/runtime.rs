//! The Forth runtime, written as an assembler generator.
//!
//! Everything the Forth system does at run time is LC-3 code emitted here:
//! the outer interpreter (token reader, dictionary search, dispatch),
//! the inner interpreter (`next`), the colon compiler and the built-in words.
//!
//! Registers are allocated as follows:
//! - `R4` ([`IP`]): the instruction pointer of the inner interpreter
//! - `R5` ([`SP`]): the data stack pointer (points at the top element)
//! - `R6` ([`RP`]): the return stack pointer (points at the top element)
//! - `R0`-`R3`, `R7`: scratch
//!
//! The program starts at the layout's origin with a branch to `cold`,
//! which initializes `latest` and `here`, so a flat image of the program
//! is enough to boot the system.

use crate::asm::{assemble, AsmErr, Assembler, ObjectFile};
use crate::ast::Reg;
use crate::ast::reg_consts::{R0, R1, R2, R3, R4, R5, R6};

use super::layout::Layout;

/// The inner interpreter's instruction pointer.
pub const IP: Reg = R4;
/// The data stack pointer.
pub const SP: Reg = R5;
/// The return stack pointer.
pub const RP: Reg = R6;

/// The immediate bit of a header's length cell.
pub const F_IMMEDIATE: u16 = 0x10;
/// The name length bits of a header's length cell.
pub const LEN_MASK: u16 = 0x0F;
/// The longest name a word can have.
pub const MAX_NAME_LEN: usize = 15;

/// `LD R1, #1`, the first cell of a colon definition.
pub const PROLOGUE_LD: u16 = 0x2201;
/// `JMP R1`, the second cell of a colon definition (the third is the address of `docol`).
pub const PROLOGUE_JMP: u16 = 0xC040;

/// Label of the `docol` routine.
pub const DOCOL: &str = "docol";
/// Label of the inner interpreter.
pub const NEXT: &str = "next";
/// Label of the outer interpreter's reset routine.
pub const START: &str = "start";

/// Label of a built-in word's execution token.
pub fn xt_label(name: &str) -> String {
    format!("xt:{name}")
}

/// Assembles the runtime for the given layout.
///
/// The layout is not validated here (see [`Layout::validate`]).
pub fn assemble_runtime(layout: &Layout) -> Result<ObjectFile, AsmErr> {
    assemble(layout.origin, |a| generate(a, layout))
}

/// Dictionary headers of the built-in words.
struct Headers {
    link: u16,
}
impl Headers {
    /// Emits a header (link, length+flags, name), returning the execution token.
    ///
    /// The execution token is also labeled (see [`xt_label`]).
    fn word(&mut self, a: &mut Assembler, name: &str, flags: u16) -> u16 {
        self.link = a.fill(self.link);
        a.fill(name.len() as u16 | flags);
        for b in name.bytes() {
            a.fill(u16::from(b));
        }
        a.mark(&xt_label(name))
    }

    /// A word which pushes the address held in a constant pool cell.
    fn variable(&mut self, a: &mut Assembler, name: &str, ptr: &str) {
        self.word(a, name, 0);
        a.ld(R0, ptr);
        a.add(SP, SP, 1);
        a.str(R0, SP, 0);
        a.br(NEXT);
    }
}

/// The generator of the runtime.
///
/// The order of the sections keeps every PC-relative operand in range.
pub fn generate(a: &mut Assembler, layout: &Layout) {
    a.br("cold");

    outer_interpreter(a);
    token_reader(a);
    constant_pool(a, layout);

    // cold start: initialize the dictionary pointers, then reset
    a.mark("cold");
    a.ld(R0, "latest0");
    a.sti(R0, "latest");
    a.ld(R0, "here0");
    a.sti(R0, "here");
    a.br(START);

    // next: fetch the cell at IP, advance IP, and jump to it
    a.mark(NEXT);
    a.ldr(R0, IP, 0);
    a.add(IP, IP, 1);
    a.jmp(R0);

    let mut h = Headers { link: 0 };
    compiler_words(a, &mut h);

    h.variable(a, "tib", "tib");
    h.variable(a, ">in", "toin");
    h.variable(a, "latest", "latest");
    h.variable(a, "state", "state");
    h.variable(a, "here", "here");

    primitives(a, &mut h);
    a.define("last_word", h.link);
}

fn outer_interpreter(a: &mut Assembler) {
    // error: print '?', discard the definition being compiled (if any), then reset
    a.mark("error");
    a.ld(R0, "quest");
    a.putc();
    a.ldi(R1, "state");
    a.brz(START);
    a.ldi(R0, "latest"); // r0 := unfinished header
    a.sti(R0, "here");
    a.ldr(R0, R0, 0);
    a.sti(R0, "latest");

    // start: empty the TIB, interpret, reset both stacks
    a.mark(START);
    a.ld(R0, "toin");
    a.ld(R1, "tib");
    a.str(R1, R0, 0); // >in := tib
    a.and(R2, R2, 0);
    a.str(R2, R1, 0); // tib[0] := 0
    a.sti(R2, "state");
    a.ld(SP, "spaddr");
    a.ld(RP, "rpaddr");

    // the cells above SP are scratch while the interpreter runs:
    // [SP+1] = current entry, [SP+2] = token start, [SP+3] = token length
    a.mark("intrp");
    a.jsr("token");
    a.str(R2, SP, 2);
    a.str(R3, SP, 3);
    a.ldi(R0, "latest");
    a.mark("ismtch");
    a.brz("error"); // end of dictionary
    a.str(R0, SP, 1);
    a.ldr(R1, SP, 2);
    a.ldr(R2, SP, 3);
    a.ldr(R3, R0, 1);
    a.and(R3, R3, LEN_MASK as i32);
    a.not(R3, R3);
    a.add(R3, R3, 1);
    a.add(R3, R3, R2);
    a.brnp("nomtch"); // lengths differ
    a.mark("nextc");
    a.ldr(IP, R0, 2);
    a.ldr(R3, R1, 0);
    a.not(R3, R3);
    a.add(R3, R3, 1);
    a.add(R3, R3, IP);
    a.brnp("nomtch");
    a.add(R1, R1, 1);
    a.add(R0, R0, 1);
    a.add(R2, R2, -1);
    a.brz("found");
    a.br("nextc");
    a.mark("nomtch");
    a.ldr(R0, SP, 1);
    a.ldr(R0, R0, 0); // follow the link
    a.br("ismtch");

    // found: r0 is past the name, so r0 + 2 is the execution token.
    // compile if (immediate + state - 1) == 0, otherwise execute
    a.mark("found");
    a.add(R0, R0, 2);
    a.lea(IP, "loop");
    a.ldi(R1, "state");
    a.ldr(R2, SP, 1);
    a.ldr(R2, R2, 1);
    a.and(R2, R2, F_IMMEDIATE as i32);
    a.add(R2, R2, R1);
    a.add(R2, R2, -1);
    a.brz("compil");
    a.jmp(R0);

    // executed words return here through `next`
    a.mark("loop");
    a.fill("intrp");
}

fn token_reader(a: &mut Assembler) {
    // token: returns the start (r2) and length (r3) of the next token, advancing >in
    a.mark("token");
    a.ldi(R3, "toin");
    a.ld(R1, "space");
    a.mark("skipws");
    a.ldr(R0, R3, 0);
    a.brz("readln");
    a.and(R2, R3, R3);
    a.add(R3, R3, 1);
    a.add(R0, R0, R1);
    a.brz("skipws");
    a.add(R3, R3, -1);
    a.mark("findws");
    a.add(R3, R3, 1);
    a.ldr(R0, R3, 0);
    a.brz("tokend");
    a.add(R0, R0, R1);
    a.brnp("findws");
    a.mark("tokend");
    a.sti(R3, "toin");
    a.not(R1, R2);
    a.add(R1, R1, 1);
    a.add(R3, R3, R1); // length = end - start
    a.ret();

    // readln: refill the TIB with one line (without its newline) and retry
    a.mark("readln");
    a.ld(R1, "tib");
    a.ld(R0, "toin");
    a.str(R1, R0, 0);
    a.mark("readlp");
    a.getc();
    a.add(R2, R0, -10);
    a.brz("rdone");
    a.str(R0, R1, 0);
    a.add(R1, R1, 1);
    a.ld(R2, "tiblim");
    a.add(R2, R2, R1);
    a.brnp("readlp"); // a full TIB ends the line
    a.mark("rdone");
    a.and(R0, R0, 0);
    a.str(R0, R1, 0);
    a.br("token");
}

fn constant_pool(a: &mut Assembler, layout: &Layout) {
    let mut constant = |label: &str, value: u16| {
        a.mark(label);
        a.fill(value);
    };
    constant("space", u16::from(b' ').wrapping_neg());
    constant("quest", u16::from(b'?'));
    constant("toin", layout.toin);
    constant("tib", layout.tib);
    constant("latest", layout.latest);
    constant("state", layout.state);
    constant("here", layout.here);
    constant("spaddr", layout.sp0);
    constant("rpaddr", layout.rp0);
    constant("tiblim", layout.tib_limit().wrapping_neg());
    constant("here0", layout.dict);

    a.mark("latest0");
    a.fill("last_word");
}

fn compiler_words(a: &mut Assembler, h: &mut Headers) {
    // exit ( r:ip -- )
    let exit = h.word(a, "exit", 0);
    a.ldr(IP, RP, 0);
    a.add(RP, RP, -1);
    a.br(NEXT);

    // ; ( -- )  compile exit, stop compiling
    h.word(a, ";", F_IMMEDIATE);
    a.and(R1, R1, 0);
    a.sti(R1, "state");
    a.lea(R0, exit);
    // compil: append r0 at here
    a.mark("compil");
    a.ldi(R1, "here");
    a.str(R0, R1, 0);
    a.add(R1, R1, 1);
    a.sti(R1, "here");
    a.br(NEXT);

    // : ( "name" -- )  start a definition
    // Immediate, so that a nested `:` is rejected instead of compiled.
    h.word(a, ":", F_IMMEDIATE);
    a.ldi(R0, "state");
    a.brnp("error");
    a.jsr("token");
    a.add(R0, R3, -(MAX_NAME_LEN as i32 + 1));
    a.brzp("error");
    a.ldi(R0, "latest");
    a.ldi(R1, "here");
    a.str(R0, R1, 0); // link
    a.sti(R1, "latest");
    a.str(R3, R1, 1); // length
    a.add(R1, R1, 2);
    a.mark("copy");
    a.ldr(R0, R2, 0);
    a.str(R0, R1, 0);
    a.add(R2, R2, 1);
    a.add(R1, R1, 1);
    a.add(R3, R3, -1);
    a.brp("copy");
    a.ld(R0, "op1");
    a.str(R0, R1, 0);
    a.ld(R0, "op2");
    a.str(R0, R1, 1);
    a.ld(R0, "op3");
    a.str(R0, R1, 2);
    a.add(R1, R1, 3);
    a.sti(R1, "here");
    a.and(R2, R2, 0);
    a.add(R2, R2, 1);
    a.sti(R2, "state");
    a.br(NEXT);

    a.mark("op1");
    a.fill(PROLOGUE_LD);
    a.mark("op2");
    a.fill(PROLOGUE_JMP);
    a.mark("op3");
    a.fill(DOCOL);

    // docol: r0 is the execution token of the colon definition
    a.mark(DOCOL);
    a.str(IP, RP, 1);
    a.add(RP, RP, 1);
    a.add(IP, R0, 3);
    a.br(NEXT);
}

fn primitives(a: &mut Assembler, h: &mut Headers) {
    // @ ( addr -- x )
    h.word(a, "@", 0);
    a.ldr(R0, SP, 0);
    a.ldr(R0, R0, 0);
    a.str(R0, SP, 0);
    a.br(NEXT);

    // ! ( x addr -- )
    h.word(a, "!", 0);
    a.ldr(R0, SP, 0);
    a.ldr(R1, SP, -1);
    a.str(R1, R0, 0);
    a.add(SP, SP, -2);
    a.br(NEXT);

    // sp@ ( -- addr )
    h.word(a, "sp@", 0);
    a.str(SP, SP, 1);
    a.add(SP, SP, 1);
    a.br(NEXT);

    // rp@ ( -- addr )
    h.word(a, "rp@", 0);
    a.add(SP, SP, 1);
    a.str(RP, SP, 0);
    a.br(NEXT);

    // 0= ( x -- flag )
    h.word(a, "0=", 0);
    a.ldr(R0, SP, 0);
    a.brnp("zeq_false");
    a.not(R0, R0);
    a.br("zeq_store");
    a.mark("zeq_false");
    a.and(R0, R0, 0);
    a.mark("zeq_store");
    a.str(R0, SP, 0);
    a.br(NEXT);

    // + ( x1 x2 -- n )
    h.word(a, "+", 0);
    a.ldr(R0, SP, 0);
    a.ldr(R1, SP, -1);
    a.add(R1, R1, R0);
    a.add(SP, SP, -1);
    a.str(R1, SP, 0);
    a.br(NEXT);

    // nand ( x1 x2 -- n )
    h.word(a, "nand", 0);
    a.ldr(R0, SP, 0);
    a.ldr(R1, SP, -1);
    a.and(R1, R1, R0);
    a.not(R1, R1);
    a.add(SP, SP, -1);
    a.str(R1, SP, 0);
    a.br(NEXT);

    // key ( -- c )
    h.word(a, "key", 0);
    a.getc();
    a.add(SP, SP, 1);
    a.str(R0, SP, 0);
    a.br(NEXT);

    // emit ( c -- )
    h.word(a, "emit", 0);
    a.ldr(R0, SP, 0);
    a.add(SP, SP, -1);
    a.putc();
    a.br(NEXT);

    // bye ( -- )
    h.word(a, "bye", 0);
    a.halt();
    a.br(NEXT);

    // 0 ( -- 0 )
    h.word(a, "0", 0);
    a.and(R0, R0, 0);
    a.add(SP, SP, 1);
    a.str(R0, SP, 0);
    a.br(NEXT);

    // 1 ( -- 1 )
    h.word(a, "1", 0);
    a.and(R0, R0, 0);
    a.add(R0, R0, 1);
    a.add(SP, SP, 1);
    a.str(R0, SP, 0);
    a.br(NEXT);

    // debug ( -- )  TRAP x00 does nothing, but a tracer can break on it
    h.word(a, "debug", 0);
    a.trap(0x00);
    a.br(NEXT);
}

#[cfg(test)]
mod tests {
    use crate::forth::layout::Layout;

    use super::{assemble_runtime, xt_label, DOCOL, NEXT, PROLOGUE_JMP, PROLOGUE_LD};

    #[test]
    fn test_runtime_fits() {
        let layout = Layout::default();
        let obj = assemble_runtime(&layout).unwrap();

        assert!(obj.overflows().is_empty(), "{:?}", obj.overflows());
        assert_eq!(layout.validate(obj.len()), Ok(()));
        assert_eq!(obj.origin(), 0x3000);
    }

    #[test]
    fn test_prologue_constants() {
        use crate::ast::reg_consts::R1;
        use crate::ast::sim::SimInstr;
        use crate::ast::IOffset;

        assert_eq!(SimInstr::LD(R1, IOffset::new_trunc(1)).encode(), PROLOGUE_LD);
        assert_eq!(SimInstr::JMP(R1).encode(), PROLOGUE_JMP);
    }

    #[test]
    fn test_headers() {
        let obj = assemble_runtime(&Layout::default()).unwrap();
        let sym = obj.symbol_table();

        // exit is the first entry, so its link is 0
        let exit = sym.lookup_label(&xt_label("exit")).unwrap();
        let exit_hdr = exit - 2 - 4;
        assert_eq!(obj.get(exit_hdr), Some(0));
        assert_eq!(obj.get(exit_hdr + 1), Some(4));

        // ; and : are immediate
        let semi = sym.lookup_label(&xt_label(";")).unwrap();
        assert_eq!(obj.get(semi - 2), Some(0x11));
        assert_eq!(obj.get(semi - 3), Some(exit_hdr));
        let colon = sym.lookup_label(&xt_label(":")).unwrap();
        assert_eq!(obj.get(colon - 2), Some(0x11));

        // the colon prologue points at docol
        let docol = sym.lookup_label(DOCOL).unwrap();
        assert!(obj.words().windows(3).any(|w| w == [PROLOGUE_LD, PROLOGUE_JMP, docol]));
        assert!(sym.lookup_label(NEXT).is_some());
    }
}
