//! An LC-3 assembler and simulator, and a Forth system written in LC-3 code.
//!
//! The crate has three layers:
//! - [`sim`]: an LC-3 instruction engine (memory, registers, condition codes, `GETC`/`OUT`/`HALT`),
//! - [`asm`]: a two-pass label assembler driven by a Rust closure,
//! - [`forth`]: an indirect-threaded Forth whose runtime is generated with the assembler
//!     and runs entirely on the simulator.
//!
//! # Usage
//!
//! Programs are written as generators and assembled into object files:
//! ```
//! use lc3_forth::asm::{assemble, ObjectFile};
//! use lc3_forth::ast::reg_consts::R0;
//!
//! let obj_file: ObjectFile = assemble(0x3000, |a| {
//!     a.and(R0, R0, 0);
//!     a.add(R0, R0, 7);
//!     a.halt();
//! }).unwrap();
//! ```
//!
//! Once an object file has been created, it can be executed with the simulator:
//! ```
//! # use lc3_forth::asm::assemble;
//! # use lc3_forth::ast::reg_consts::R0;
//! # let obj_file = assemble(0x3000, |a| { a.and(R0, R0, 0); a.add(R0, R0, 7); a.halt(); }).unwrap();
//! use lc3_forth::sim::{PauseCondition, Simulator};
//!
//! let mut simulator = Simulator::new(Default::default());
//! simulator.load_obj_file(&obj_file);
//! assert_eq!(simulator.run().unwrap(), PauseCondition::Halt);
//! assert_eq!(simulator.reg_file[R0], 7);
//! ```
//!
//! The Forth system wraps both:
//! ```
//! use lc3_forth::forth::Forth;
//!
//! let mut forth = Forth::new(Default::default()).unwrap();
//! forth.eval(": 3x dup dup + + ;").unwrap();
//! forth.eval("1 1 + 3x").unwrap();
//! assert_eq!(forth.data_stack(), [6]);
//! ```
//!
//! If more granularity is needed for simulation, there are also step and breakpoint functions.
//! See the [`sim`] module for more details.
#![warn(missing_docs)]

pub mod ast;
pub mod asm;
pub mod sim;
pub mod forth;
pub mod err;
