//! Encodes a [`Module`] to WebAssembly Text format (WAT).
//!
//! The output is a canonical flat rendering: s-expression entity forms, one
//! per line, two-space indentation, numeric indices throughout (no symbolic
//! names). Function bodies use the flat instruction form, one instruction
//! per line; `block`/`loop`/`if` close with `end` on its own line. The
//! result is not meant to be byte-identical to hand-written WAT, only to
//! parse back to an equivalent module.
//!
//! The same layout and validation passes as the binary encoder run first, so
//! a module either encodes in both formats or fails with the same
//! [`EncodeError`].
//!
//! # Example
//!
//! ```
//! use wasmith::module::Module;
//! use wasmith::text;
//!
//! assert_eq!(text::encode_text(&Module::new()).unwrap(), "(module\n)");
//! ```

use crate::encoder::{EncodeError, Layout, validate};
use crate::instruction::Instruction;
use crate::module::{
    DataMode, ElementItems, ElementMode, ExportDesc, ExportSection, Expr, ImportDesc, Module,
};
use crate::types::{CompositeType, FuncType, SubType, TypeEntry};

/// Encodes a WebAssembly module to WAT text.
pub fn encode_text(module: &Module) -> Result<String, EncodeError> {
    let layout = Layout::of(module)?;
    validate(&layout)?;

    let mut w = Writer::new();
    w.line("(module");
    w.indent += 1;

    // Type definitions first, so every later (type n) use resolves.
    if let Some(types) = layout.types {
        for entry in &types.types {
            match entry {
                TypeEntry::Single(sub) => w.line(&format!("(type {})", sub_type_text(sub))),
                TypeEntry::Rec(members) => {
                    w.line("(rec");
                    w.indent += 1;
                    for member in members {
                        w.line(&format!("(type {})", sub_type_text(member)));
                    }
                    w.indent -= 1;
                    w.line(")");
                }
            }
        }
    }

    // Imports precede all definitions so index spaces line up.
    let mut imported = Imported::default();
    if let Some(imports) = layout.imports {
        for import in &imports.imports {
            let desc = match &import.desc {
                ImportDesc::Func { type_index } => {
                    imported.funcs += 1;
                    format!("(func (type {type_index}))")
                }
                ImportDesc::Table(tt) => {
                    imported.tables += 1;
                    format!("(table {} {})", tt.limits, tt.element)
                }
                ImportDesc::Memory(mt) => {
                    imported.memories += 1;
                    format!("(memory {})", mt.limits)
                }
                ImportDesc::Global(gt) => {
                    imported.globals += 1;
                    format!("(global {gt})")
                }
                ImportDesc::Tag { type_index } => {
                    imported.tags += 1;
                    format!("(tag (type {type_index}))")
                }
            };
            w.line(&format!(
                "(import {} {} {desc})",
                quote_name(&import.module),
                quote_name(&import.name)
            ));
        }
    }

    let exports = layout.exports;

    if let Some(tables) = layout.tables {
        for (i, table) in tables.tables.iter().enumerate() {
            let index = imported.tables + i as u32;
            let names = inline_exports(exports, |d| matches!(d, ExportDesc::Table(n) if *n == index));
            w.line(&format!("(table{names} {} {})", table.limits, table.element));
        }
    }

    if let Some(memories) = layout.memories {
        for (i, memory) in memories.memories.iter().enumerate() {
            let index = imported.memories + i as u32;
            let names =
                inline_exports(exports, |d| matches!(d, ExportDesc::Memory(n) if *n == index));
            w.line(&format!("(memory{names} {})", memory.limits));
        }
    }

    if let Some(tags) = layout.tags {
        for (i, tag) in tags.tags.iter().enumerate() {
            let index = imported.tags + i as u32;
            let names = inline_exports(exports, |d| matches!(d, ExportDesc::Tag(n) if *n == index));
            w.line(&format!("(tag{names} (type {}))", tag.type_index));
        }
    }

    if let Some(globals) = layout.globals {
        for (i, global) in globals.globals.iter().enumerate() {
            let index = imported.globals + i as u32;
            let names =
                inline_exports(exports, |d| matches!(d, ExportDesc::Global(n) if *n == index));
            let mut form = format!("(global{names} {}", global.ty);
            let init = expr_inline(&global.init);
            if !init.is_empty() {
                form.push(' ');
                form.push_str(&init);
            }
            form.push(')');
            w.line(&form);
        }
    }

    // Defined functions merge the function section (type) with the code
    // section (locals and body).
    if let (Some(functions), Some(code)) = (layout.functions, layout.code) {
        for (i, func) in code.funcs.iter().enumerate() {
            let index = imported.funcs + i as u32;
            let type_index = functions.type_indices[i];
            let names = inline_exports(exports, |d| matches!(d, ExportDesc::Func(n) if *n == index));
            w.line(&format!("(func{names} (type {type_index})"));
            w.indent += 1;
            for (count, vt) in &func.locals {
                let mut locals = String::from("(local");
                for _ in 0..*count {
                    locals.push(' ');
                    locals.push_str(&vt.to_string());
                }
                locals.push(')');
                w.line(&locals);
            }
            write_body(&mut w, &func.body);
            w.indent -= 1;
            w.line(")");
        }
    }

    // Exports of imported entities have no defining form to sit on.
    if let Some(exports) = exports {
        for export in &exports.exports {
            let (keyword, index, is_import) = match export.desc {
                ExportDesc::Func(n) => ("func", n, n < imported.funcs),
                ExportDesc::Table(n) => ("table", n, n < imported.tables),
                ExportDesc::Memory(n) => ("memory", n, n < imported.memories),
                ExportDesc::Global(n) => ("global", n, n < imported.globals),
                ExportDesc::Tag(n) => ("tag", n, n < imported.tags),
            };
            if is_import {
                w.line(&format!(
                    "(export {} ({keyword} {index}))",
                    quote_name(&export.name)
                ));
            }
        }
    }

    if let Some(start) = layout.start {
        w.line(&format!("(start {})", start.func_index));
    }

    if let Some(elements) = layout.elements {
        for elem in &elements.elements {
            let mut form = String::from("(elem");
            match &elem.mode {
                ElementMode::Active { table_index, offset } => {
                    form.push_str(&format!(
                        " (table {table_index}) (offset {})",
                        expr_inline(offset)
                    ));
                }
                ElementMode::Passive => {}
                ElementMode::Declarative => form.push_str(" declare"),
            }
            match &elem.items {
                ElementItems::Functions(funcs) => {
                    form.push_str(" func");
                    for func in funcs {
                        form.push_str(&format!(" {func}"));
                    }
                }
                ElementItems::Expressions(exprs) => {
                    form.push_str(&format!(" {}", elem.ref_type));
                    for expr in exprs {
                        form.push_str(&format!(" (item {})", expr_inline(expr)));
                    }
                }
            }
            form.push(')');
            w.line(&form);
        }
    }

    if let Some(data) = layout.data {
        for segment in &data.segments {
            match &segment.mode {
                DataMode::Active { memory_index, offset } => {
                    w.line(&format!(
                        "(data (memory {memory_index}) (offset {}) {})",
                        expr_inline(offset),
                        quote_bytes(&segment.init)
                    ));
                }
                DataMode::Passive => {
                    w.line(&format!("(data {})", quote_bytes(&segment.init)));
                }
            }
        }
    }

    w.indent -= 1;
    w.out.push(')');
    Ok(w.out)
}

/// Counts of imports per index space; definitions index after these.
#[derive(Default)]
struct Imported {
    funcs: u32,
    tables: u32,
    memories: u32,
    globals: u32,
    tags: u32,
}

// ===========================================================================
// Line writer
// ===========================================================================

struct Writer {
    out: String,
    indent: usize,
}

impl Writer {
    fn new() -> Writer {
        Writer {
            out: String::new(),
            indent: 0,
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }
}

// ===========================================================================
// Instruction rendering
// ===========================================================================

/// Writes a function body in flat form, one instruction per line, recursing
/// into structured instructions.
fn write_body(w: &mut Writer, instrs: &[Instruction]) {
    for inst in instrs {
        write_instr(w, inst);
    }
}

fn write_instr(w: &mut Writer, inst: &Instruction) {
    match inst {
        Instruction::Block { body, .. } | Instruction::Loop { body, .. } => {
            w.line(&inst.to_string());
            w.indent += 1;
            write_body(w, body);
            w.indent -= 1;
            w.line("end");
        }
        Instruction::If {
            then_body,
            else_body,
            ..
        } => {
            w.line(&inst.to_string());
            w.indent += 1;
            write_body(w, then_body);
            w.indent -= 1;
            if let Some(else_body) = else_body {
                w.line("else");
                w.indent += 1;
                write_body(w, else_body);
                w.indent -= 1;
            }
            w.line("end");
        }
        _ => w.line(&inst.to_string()),
    }
}

/// Renders a constant expression on a single line. Structured instructions
/// stay in flat form with inline `else`/`end` tokens, which parses the same.
fn expr_inline(instrs: &Expr) -> String {
    let mut parts = Vec::new();
    for inst in instrs {
        push_flat(&mut parts, inst);
    }
    parts.join(" ")
}

fn push_flat(parts: &mut Vec<String>, inst: &Instruction) {
    parts.push(inst.to_string());
    match inst {
        Instruction::Block { body, .. } | Instruction::Loop { body, .. } => {
            for nested in body {
                push_flat(parts, nested);
            }
            parts.push("end".to_string());
        }
        Instruction::If {
            then_body,
            else_body,
            ..
        } => {
            for nested in then_body {
                push_flat(parts, nested);
            }
            if let Some(else_body) = else_body {
                parts.push("else".to_string());
                for nested in else_body {
                    push_flat(parts, nested);
                }
            }
            parts.push("end".to_string());
        }
        _ => {}
    }
}

// ===========================================================================
// Type rendering
// ===========================================================================

fn sub_type_text(sub: &SubType) -> String {
    let composite = composite_text(&sub.composite);
    if sub.is_final && sub.super_types.is_empty() {
        return composite;
    }
    let mut form = String::from("(sub");
    if sub.is_final {
        form.push_str(" final");
    }
    for super_idx in &sub.super_types {
        form.push_str(&format!(" {super_idx}"));
    }
    form.push_str(&format!(" {composite})"));
    form
}

fn composite_text(composite: &CompositeType) -> String {
    match composite {
        CompositeType::Func(ft) => func_type_text(ft),
        CompositeType::Struct(st) => {
            let mut form = String::from("(struct");
            for field in &st.fields {
                form.push_str(&format!(" (field {field})"));
            }
            form.push(')');
            form
        }
        CompositeType::Array(at) => format!("(array {})", at.field),
    }
}

fn func_type_text(ft: &FuncType) -> String {
    let mut form = String::from("(func");
    for param in &ft.params {
        form.push_str(&format!(" (param {param})"));
    }
    for result in &ft.results {
        form.push_str(&format!(" (result {result})"));
    }
    form.push(')');
    form
}

// ===========================================================================
// Exports and string escaping
// ===========================================================================

/// The ` (export "a") (export "b")` suffix for an entity's defining form.
fn inline_exports(
    exports: Option<&ExportSection>,
    matches_entity: impl Fn(&ExportDesc) -> bool,
) -> String {
    let Some(exports) = exports else {
        return String::new();
    };
    let mut out = String::new();
    for export in &exports.exports {
        if matches_entity(&export.desc) {
            out.push_str(&format!(" (export {})", quote_name(&export.name)));
        }
    }
    out
}

/// Double-quotes a byte string, escaping `"`, `\`, and anything outside
/// printable ASCII as two-digit hex.
fn quote_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    for &byte in bytes {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\{byte:02x}")),
        }
    }
    out.push('"');
    out
}

fn quote_name(name: &str) -> String {
    quote_bytes(name.as_bytes())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{BlockType, Instruction};
    use crate::types::{FieldType, StructType, ValueType};

    #[test]
    fn quoting_escapes_specials_and_non_ascii() {
        assert_eq!(quote_name("add"), "\"add\"");
        assert_eq!(quote_name("a\"b"), "\"a\\\"b\"");
        assert_eq!(quote_name("a\\b"), "\"a\\\\b\"");
        assert_eq!(quote_bytes(&[0x00, 0x7f, 0xff]), "\"\\00\\7f\\ff\"");
        // UTF-8 multibyte sequences escape per byte.
        assert_eq!(quote_name("\u{e9}"), "\"\\c3\\a9\"");
    }

    #[test]
    fn inline_expr_flattens_blocks() {
        let expr = vec![Instruction::Block {
            block_type: BlockType::Empty,
            body: vec![Instruction::Nop],
        }];
        assert_eq!(expr_inline(&expr), "block nop end");
    }

    #[test]
    fn struct_type_form() {
        let st = StructType::new(vec![
            FieldType::val(ValueType::I32, false),
            FieldType::val(ValueType::I32, true),
        ]);
        assert_eq!(
            composite_text(&CompositeType::Struct(st)),
            "(struct (field i32) (field (mut i32)))"
        );
    }

    #[test]
    fn func_type_form() {
        let ft = FuncType::new(vec![ValueType::I32, ValueType::I64], vec![ValueType::F32]);
        assert_eq!(
            func_type_text(&ft),
            "(func (param i32) (param i64) (result f32))"
        );
    }
}
