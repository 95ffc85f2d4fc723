//! Build WebAssembly modules in memory and serialize them to the binary
//! format (`.wasm`) or the text format (WAT).
//!
//! wasmith is a pure construction library: clients assemble a
//! [`module::Module`] out of typed sections, then run one of the two
//! encoders over it. There is no decoder, no validator, and no interpreter;
//! the output is meant to be handed to an external WebAssembly runtime.
//!
//! # Modules
//!
//! - [`types`] -- Value, reference, heap, composite, and limit types.
//! - [`instruction`] -- The instruction set across all four opcode spaces.
//! - [`module`] -- Sections, entities, [`module::Module`], and the builder.
//! - [`encoder`] -- Binary encoder. Serialises a `Module` to `.wasm` bytes.
//! - [`text`] -- Text encoder. Renders a `Module` as a WAT string.
//! - [`encoding`] -- LEB128 and IEEE 754 primitives shared by the encoders.
//!
//! # Example
//!
//! Build a module exporting an `add` function and encode it both ways:
//!
//! ```
//! use wasmith::instruction::Instruction;
//! use wasmith::module::{
//!     CodeSection, Export, ExportDesc, ExportSection, Func, FunctionSection, ModuleBuilder,
//!     Section, TypeSection,
//! };
//! use wasmith::types::{FuncType, ValueType};
//! use wasmith::{encoder, text};
//!
//! let add = FuncType::new(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32]);
//! let module = ModuleBuilder::new()
//!     .section(Section::Type(TypeSection::new(vec![add.into()])))
//!     .section(Section::Function(FunctionSection { type_indices: vec![0] }))
//!     .section(Section::Export(ExportSection {
//!         exports: vec![Export::new("add", ExportDesc::Func(0))],
//!     }))
//!     .section(Section::Code(CodeSection {
//!         funcs: vec![Func::new(vec![], vec![
//!             Instruction::LocalGet { local: 0 },
//!             Instruction::LocalGet { local: 1 },
//!             Instruction::I32Add,
//!         ])],
//!     }))
//!     .finish();
//!
//! let bytes = encoder::encode(&module).unwrap();
//! assert_eq!(&bytes[0..4], b"\0asm");
//!
//! let wat = text::encode_text(&module).unwrap();
//! assert!(wat.contains("(export \"add\")"));
//! ```
//!
//! # Specification
//!
//! Targets the [WebAssembly 2.0 specification](https://webassembly.github.io/spec/core/)
//! together with the GC, threads (shared memory and atomics), and tail-call
//! proposals.

pub mod encoder;
pub mod encoding;
pub mod instruction;
pub mod module;
pub mod text;
pub mod types;

pub use encoder::{EncodeError, encode};
pub use text::encode_text;
