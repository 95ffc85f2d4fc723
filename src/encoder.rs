//! Encodes a [`Module`] to WebAssembly binary format (`.wasm`).
//!
//! # Binary format overview
//!
//! A WebAssembly binary begins with a magic number (`\0asm`) and version (1),
//! followed by sections in a fixed order. Each section is encoded as:
//!
//! ```text
//! section_id: u8 | byte_length: vu32 | contents: byte*
//! ```
//!
//! Section bodies are built into scratch buffers so their length is known
//! before framing. The encoder produces minimal LEB128 encoding for all
//! integer values and is deterministic: equal modules yield identical bytes.
//!
//! Before emission the module passes through a layout pass (canonical
//! section ordering, duplicate detection, custom-section anchoring) and a
//! validation pass (index resolution, limits well-formedness, function/code
//! parity). Construction-time operations never fail; everything is checked
//! here.
//!
//! # Example
//!
//! ```
//! use wasmith::encoder;
//! use wasmith::module::Module;
//!
//! let bytes = encoder::encode(&Module::new()).unwrap();
//! assert_eq!(bytes, b"\0asm\x01\x00\x00\x00");
//! ```

use crate::encoding::{
    self, DATA_ACTIVE, DATA_ACTIVE_EXPLICIT, DATA_PASSIVE, DESC_FUNC, DESC_GLOBAL, DESC_MEMORY,
    DESC_TABLE, DESC_TAG, ELEM_ACTIVE_EXPRS, ELEM_ACTIVE_FUNCS, ELEM_ACTIVE_TABLE_EXPRS,
    ELEM_ACTIVE_TABLE_FUNCS, ELEM_DECLARATIVE_EXPRS, ELEM_DECLARATIVE_FUNCS, ELEM_PASSIVE_EXPRS,
    ELEM_PASSIVE_FUNCS, ELEMKIND_FUNCREF, OP_END, SECTION_CODE, SECTION_CUSTOM, SECTION_DATA,
    SECTION_DATA_COUNT, SECTION_ELEMENT, SECTION_EXPORT, SECTION_FUNCTION, SECTION_GLOBAL,
    SECTION_IMPORT, SECTION_MEMORY, SECTION_START, SECTION_TABLE, SECTION_TAG, SECTION_TYPE,
    TAG_ATTR_EXCEPTION,
};
use crate::instruction::{BlockType, Instruction};
use crate::module::{
    CodeSection, CustomSection, Data, DataCountSection, DataMode, DataSection, Element,
    ElementItems, ElementMode, ElementSection, Export, ExportDesc, ExportSection, Expr,
    FunctionSection, GlobalSection, Import, ImportDesc, ImportSection, MemorySection, Module,
    Section, StartSection, TableSection, TagSection, TypeSection,
};
use crate::types::{
    CompositeType, HeapType, Limits, RefType, StorageType, TableType, TypeEntry, ValueType,
};

// ===========================================================================
// Error type
// ===========================================================================

/// Errors reported by the binary and text encoders.
///
/// Diagnostics name the offending section and entry; no partial output is
/// ever returned.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// An instruction or descriptor references an entry that does not exist.
    #[error("{space} index {index} out of range in {context}: {count} available")]
    IndexOutOfRange {
        space: &'static str,
        index: u32,
        count: u32,
        context: String,
    },
    /// Two sections that must agree on entry counts do not.
    #[error("{what} have mismatched sizes: {left} vs {right}")]
    SectionCountMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },
    /// `min > max`, or a shared memory without an explicit `max`.
    #[error("invalid limits in {context}: {reason}")]
    InvalidLimits { context: String, reason: &'static str },
    /// A value, heap, or block type is malformed for its position.
    #[error("invalid type in {context}: {reason}")]
    InvalidType { context: String, reason: String },
    /// An export or import name is not valid UTF-8.
    #[error("invalid name in {context}: not valid UTF-8")]
    InvalidName { context: String },
    /// An instruction variant has no binary encoding.
    #[error("instruction {mnemonic} cannot be encoded")]
    UnsupportedOpcode { mnemonic: &'static str },
    /// A non-custom section kind appeared more than once.
    #[error("duplicate {kind} section")]
    DuplicateSection { kind: &'static str },
}

// ===========================================================================
// Layout pass
// ===========================================================================

/// The module's sections sorted into their canonical slots.
///
/// Built by walking insertion order once: a second section of any non-custom
/// kind is a [`EncodeError::DuplicateSection`]; custom sections remember the
/// id of the non-custom section they followed (`None` when they preceded
/// every non-custom section) and are re-emitted at that anchor's canonical
/// position, preserving their relative order.
pub(crate) struct Layout<'a> {
    pub types: Option<&'a TypeSection>,
    pub imports: Option<&'a ImportSection>,
    pub functions: Option<&'a FunctionSection>,
    pub tables: Option<&'a TableSection>,
    pub memories: Option<&'a MemorySection>,
    pub tags: Option<&'a TagSection>,
    pub globals: Option<&'a GlobalSection>,
    pub exports: Option<&'a ExportSection>,
    pub start: Option<&'a StartSection>,
    pub elements: Option<&'a ElementSection>,
    pub data_count: Option<&'a DataCountSection>,
    pub code: Option<&'a CodeSection>,
    pub data: Option<&'a DataSection>,
    pub customs: Vec<(Option<u8>, &'a CustomSection)>,
}

impl<'a> Layout<'a> {
    pub(crate) fn of(module: &'a Module) -> Result<Layout<'a>, EncodeError> {
        fn claim<'a, T>(
            slot: &mut Option<&'a T>,
            value: &'a T,
            kind: &'static str,
        ) -> Result<(), EncodeError> {
            if slot.is_some() {
                return Err(EncodeError::DuplicateSection { kind });
            }
            *slot = Some(value);
            Ok(())
        }

        let mut layout = Layout {
            types: None,
            imports: None,
            functions: None,
            tables: None,
            memories: None,
            tags: None,
            globals: None,
            exports: None,
            start: None,
            elements: None,
            data_count: None,
            code: None,
            data: None,
            customs: Vec::new(),
        };

        let mut anchor = None;
        for section in module.sections() {
            let kind = section.kind_name();
            match section {
                Section::Custom(c) => {
                    layout.customs.push((anchor, c));
                    continue;
                }
                Section::Type(s) => claim(&mut layout.types, s, kind)?,
                Section::Import(s) => claim(&mut layout.imports, s, kind)?,
                Section::Function(s) => claim(&mut layout.functions, s, kind)?,
                Section::Table(s) => claim(&mut layout.tables, s, kind)?,
                Section::Memory(s) => claim(&mut layout.memories, s, kind)?,
                Section::Tag(s) => claim(&mut layout.tags, s, kind)?,
                Section::Global(s) => claim(&mut layout.globals, s, kind)?,
                Section::Export(s) => claim(&mut layout.exports, s, kind)?,
                Section::Start(s) => claim(&mut layout.start, s, kind)?,
                Section::Element(s) => claim(&mut layout.elements, s, kind)?,
                Section::DataCount(s) => claim(&mut layout.data_count, s, kind)?,
                Section::Code(s) => claim(&mut layout.code, s, kind)?,
                Section::Data(s) => claim(&mut layout.data, s, kind)?,
            }
            anchor = Some(section.id());
        }
        Ok(layout)
    }

    /// Resolves a type index to its composite definition, counting every
    /// subtype inside recursion groups.
    pub(crate) fn composite(&self, index: u32) -> Option<&'a CompositeType> {
        let types = self.types?;
        let mut remaining = index;
        for entry in &types.types {
            let subs = entry.sub_types();
            if (remaining as usize) < subs.len() {
                return Some(&subs[remaining as usize].composite);
            }
            remaining -= subs.len() as u32;
        }
        None
    }
}

// ===========================================================================
// Validation pass
// ===========================================================================

/// Sizes of the module's index spaces, imports included.
pub(crate) struct IndexSpaces {
    pub types: u32,
    pub funcs: u32,
    pub tables: u32,
    pub memories: u32,
    pub globals: u32,
    pub tags: u32,
    pub elems: u32,
    pub datas: u32,
}

impl IndexSpaces {
    fn check(
        &self,
        space: &'static str,
        index: u32,
        count: u32,
        context: &str,
    ) -> Result<(), EncodeError> {
        if index < count {
            Ok(())
        } else {
            Err(EncodeError::IndexOutOfRange {
                space,
                index,
                count,
                context: context.to_string(),
            })
        }
    }

    fn check_type(&self, index: u32, context: &str) -> Result<(), EncodeError> {
        self.check("type", index, self.types, context)
    }

    fn check_func(&self, index: u32, context: &str) -> Result<(), EncodeError> {
        self.check("function", index, self.funcs, context)
    }

    fn check_table(&self, index: u32, context: &str) -> Result<(), EncodeError> {
        self.check("table", index, self.tables, context)
    }

    fn check_memory(&self, index: u32, context: &str) -> Result<(), EncodeError> {
        self.check("memory", index, self.memories, context)
    }

    fn check_global(&self, index: u32, context: &str) -> Result<(), EncodeError> {
        self.check("global", index, self.globals, context)
    }

    fn check_elem(&self, index: u32, context: &str) -> Result<(), EncodeError> {
        self.check("element", index, self.elems, context)
    }

    fn check_data(&self, index: u32, context: &str) -> Result<(), EncodeError> {
        self.check("data", index, self.datas, context)
    }

    fn check_heap(&self, heap: &HeapType, context: &str) -> Result<(), EncodeError> {
        if let HeapType::Index(idx) = heap {
            self.check_type(*idx, context)?;
        }
        Ok(())
    }

    fn check_value_type(&self, vt: &ValueType, context: &str) -> Result<(), EncodeError> {
        if let ValueType::Ref(rt) = vt {
            self.check_heap(&rt.heap_type, context)?;
        }
        Ok(())
    }
}

fn check_limits(limits: &Limits, context: &str) -> Result<(), EncodeError> {
    if let Some(max) = limits.max {
        if limits.min > max {
            return Err(EncodeError::InvalidLimits {
                context: context.to_string(),
                reason: "min exceeds max",
            });
        }
    } else if limits.shared {
        return Err(EncodeError::InvalidLimits {
            context: context.to_string(),
            reason: "shared without max",
        });
    }
    Ok(())
}

fn check_table_type(
    spaces: &IndexSpaces,
    table: &TableType,
    context: &str,
) -> Result<(), EncodeError> {
    if table.limits.shared {
        return Err(EncodeError::InvalidLimits {
            context: context.to_string(),
            reason: "tables cannot be shared",
        });
    }
    check_limits(&table.limits, context)?;
    spaces.check_heap(&table.element.heap_type, context)
}

/// Checks every type reference inside a composite type definition.
fn check_composite(
    spaces: &IndexSpaces,
    composite: &CompositeType,
    context: &str,
) -> Result<(), EncodeError> {
    match composite {
        CompositeType::Func(ft) => {
            for vt in ft.params.iter().chain(&ft.results) {
                spaces.check_value_type(vt, context)?;
            }
        }
        CompositeType::Struct(st) => {
            for field in &st.fields {
                if let StorageType::Val(vt) = &field.storage {
                    spaces.check_value_type(vt, context)?;
                }
            }
        }
        CompositeType::Array(at) => {
            if let StorageType::Val(vt) = &at.field.storage {
                spaces.check_value_type(vt, context)?;
            }
        }
    }
    Ok(())
}

/// Walks an instruction sequence checking every index it carries.
///
/// `labels` is the number of enclosing branch targets (1 for a function
/// body, whose implicit block is a target; 0 for constant expressions).
fn check_instrs(
    spaces: &IndexSpaces,
    instrs: &[Instruction],
    labels: u32,
    locals: u32,
    context: &str,
) -> Result<(), EncodeError> {
    use Instruction::*;

    let check_block_type = |bt: &BlockType| -> Result<(), EncodeError> {
        match bt {
            BlockType::Empty => Ok(()),
            BlockType::Value(vt) => spaces.check_value_type(vt, context),
            BlockType::Func(idx) => spaces.check_type(*idx, context),
        }
    };

    for inst in instrs {
        if let Some(memarg) = inst.memarg() {
            spaces.check_memory(memarg.memory, context)?;
            continue;
        }
        match inst {
            Block { block_type, body } | Loop { block_type, body } => {
                check_block_type(block_type)?;
                check_instrs(spaces, body, labels + 1, locals, context)?;
            }
            If {
                block_type,
                then_body,
                else_body,
            } => {
                check_block_type(block_type)?;
                check_instrs(spaces, then_body, labels + 1, locals, context)?;
                if let Some(else_body) = else_body {
                    check_instrs(spaces, else_body, labels + 1, locals, context)?;
                }
            }
            Br { label } | BrIf { label } | BrOnNull { label } | BrOnNonNull { label } => {
                spaces.check("label", *label, labels, context)?;
            }
            BrTable { labels: targets, default } => {
                for label in targets {
                    spaces.check("label", *label, labels, context)?;
                }
                spaces.check("label", *default, labels, context)?;
            }
            Call { func } | ReturnCall { func } | RefFunc { func } => {
                spaces.check_func(*func, context)?;
            }
            CallIndirect { type_index, table } | ReturnCallIndirect { type_index, table } => {
                spaces.check_type(*type_index, context)?;
                spaces.check_table(*table, context)?;
            }
            RefNull { heap_type } => spaces.check_heap(heap_type, context)?,
            SelectTyped { types } => {
                for vt in types {
                    spaces.check_value_type(vt, context)?;
                }
            }
            LocalGet { local } | LocalSet { local } | LocalTee { local } => {
                spaces.check("local", *local, locals, context)?;
            }
            GlobalGet { global } | GlobalSet { global } => {
                spaces.check_global(*global, context)?;
            }
            TableGet { table } | TableSet { table } | TableGrow { table } | TableSize { table }
            | TableFill { table } => {
                spaces.check_table(*table, context)?;
            }
            TableInit { elem, table } => {
                spaces.check_elem(*elem, context)?;
                spaces.check_table(*table, context)?;
            }
            ElemDrop { elem } => spaces.check_elem(*elem, context)?,
            TableCopy { dst_table, src_table } => {
                spaces.check_table(*dst_table, context)?;
                spaces.check_table(*src_table, context)?;
            }
            MemorySize | MemoryGrow | MemoryCopy | MemoryFill => {
                spaces.check_memory(0, context)?;
            }
            MemoryInit { data } => {
                spaces.check_memory(0, context)?;
                spaces.check_data(*data, context)?;
            }
            DataDrop { data } => spaces.check_data(*data, context)?,
            StructNew { type_index }
            | StructNewDefault { type_index }
            | ArrayNew { type_index }
            | ArrayNewDefault { type_index }
            | ArrayGet { type_index }
            | ArrayGetS { type_index }
            | ArrayGetU { type_index }
            | ArraySet { type_index }
            | ArrayFill { type_index }
            | StructGet { type_index, .. }
            | StructGetS { type_index, .. }
            | StructGetU { type_index, .. }
            | StructSet { type_index, .. }
            | ArrayNewFixed { type_index, .. } => {
                spaces.check_type(*type_index, context)?;
            }
            ArrayNewData { type_index, data } | ArrayInitData { type_index, data } => {
                spaces.check_type(*type_index, context)?;
                spaces.check_data(*data, context)?;
            }
            ArrayNewElem { type_index, elem } | ArrayInitElem { type_index, elem } => {
                spaces.check_type(*type_index, context)?;
                spaces.check_elem(*elem, context)?;
            }
            ArrayCopy {
                dst_type_index,
                src_type_index,
            } => {
                spaces.check_type(*dst_type_index, context)?;
                spaces.check_type(*src_type_index, context)?;
            }
            RefTest { ref_type } | RefCast { ref_type } => {
                spaces.check_heap(&ref_type.heap_type, context)?;
            }
            BrOnCast {
                label,
                from_type,
                to_type,
            }
            | BrOnCastFail {
                label,
                from_type,
                to_type,
            } => {
                spaces.check("label", *label, labels, context)?;
                spaces.check_heap(&from_type.heap_type, context)?;
                spaces.check_heap(&to_type.heap_type, context)?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Builds the index spaces and checks every reference in the module.
pub(crate) fn validate(layout: &Layout) -> Result<IndexSpaces, EncodeError> {
    let mut imported_funcs = 0u32;
    let mut imported_tables = 0u32;
    let mut imported_memories = 0u32;
    let mut imported_globals = 0u32;
    let mut imported_tags = 0u32;
    if let Some(imports) = layout.imports {
        for import in &imports.imports {
            match &import.desc {
                ImportDesc::Func { .. } => imported_funcs += 1,
                ImportDesc::Table(_) => imported_tables += 1,
                ImportDesc::Memory(_) => imported_memories += 1,
                ImportDesc::Global(_) => imported_globals += 1,
                ImportDesc::Tag { .. } => imported_tags += 1,
            }
        }
    }

    let defined_funcs = layout.functions.map_or(0, |s| s.type_indices.len());
    let code_bodies = layout.code.map_or(0, |s| s.funcs.len());
    if defined_funcs != code_bodies {
        return Err(EncodeError::SectionCountMismatch {
            what: "function and code sections",
            left: defined_funcs,
            right: code_bodies,
        });
    }

    // A missing data section counts as zero segments; an explicit count
    // must agree either way.
    let datas = layout.data.map_or(0, |s| s.segments.len()) as u32;
    if let Some(dc) = layout.data_count {
        if dc.count != datas {
            return Err(EncodeError::SectionCountMismatch {
                what: "data count and data sections",
                left: dc.count as usize,
                right: datas as usize,
            });
        }
    }

    let spaces = IndexSpaces {
        types: layout
            .types
            .map_or(0, |s| s.types.iter().map(TypeEntry::index_count).sum()),
        funcs: imported_funcs + defined_funcs as u32,
        tables: imported_tables + layout.tables.map_or(0, |s| s.tables.len() as u32),
        memories: imported_memories + layout.memories.map_or(0, |s| s.memories.len() as u32),
        globals: imported_globals + layout.globals.map_or(0, |s| s.globals.len() as u32),
        tags: imported_tags + layout.tags.map_or(0, |s| s.tags.len() as u32),
        elems: layout.elements.map_or(0, |s| s.elements.len() as u32),
        datas,
    };

    // Type section: supertype chains and nested type references.
    if let Some(types) = layout.types {
        for (i, entry) in types.types.iter().enumerate() {
            let context = format!("type[{i}]");
            for sub in entry.sub_types() {
                for super_idx in &sub.super_types {
                    spaces.check_type(*super_idx, &context)?;
                }
                check_composite(&spaces, &sub.composite, &context)?;
            }
        }
    }

    // Imports: descriptors and their types.
    if let Some(imports) = layout.imports {
        for (i, import) in imports.imports.iter().enumerate() {
            let context = format!("import[{i}]");
            match &import.desc {
                ImportDesc::Func { type_index } | ImportDesc::Tag { type_index } => {
                    spaces.check_type(*type_index, &context)?;
                    require_func_type(layout, *type_index, &context)?;
                }
                ImportDesc::Table(tt) => check_table_type(&spaces, tt, &context)?,
                ImportDesc::Memory(mt) => check_limits(&mt.limits, &context)?,
                ImportDesc::Global(gt) => spaces.check_value_type(&gt.value_type, &context)?,
            }
        }
    }

    // Function section: every entry must name a function type.
    if let Some(functions) = layout.functions {
        for (i, type_index) in functions.type_indices.iter().enumerate() {
            let context = format!("function[{i}]");
            spaces.check_type(*type_index, &context)?;
            require_func_type(layout, *type_index, &context)?;
        }
    }

    // Tables and memories: limits well-formedness.
    if let Some(tables) = layout.tables {
        for (i, table) in tables.tables.iter().enumerate() {
            check_table_type(&spaces, table, &format!("table[{i}]"))?;
        }
    }
    if let Some(memories) = layout.memories {
        for (i, memory) in memories.memories.iter().enumerate() {
            check_limits(&memory.limits, &format!("memory[{i}]"))?;
        }
    }

    // Tags name function types.
    if let Some(tags) = layout.tags {
        for (i, tag) in tags.tags.iter().enumerate() {
            let context = format!("tag[{i}]");
            spaces.check_type(tag.type_index, &context)?;
            require_func_type(layout, tag.type_index, &context)?;
        }
    }

    // Globals: type plus init expression.
    if let Some(globals) = layout.globals {
        for (i, global) in globals.globals.iter().enumerate() {
            let context = format!("global[{i}]");
            spaces.check_value_type(&global.ty.value_type, &context)?;
            check_instrs(&spaces, &global.init, 0, 0, &context)?;
        }
    }

    // Exports point into their index spaces.
    if let Some(exports) = layout.exports {
        for (i, export) in exports.exports.iter().enumerate() {
            let context = format!("export[{i}]");
            match export.desc {
                ExportDesc::Func(idx) => spaces.check_func(idx, &context)?,
                ExportDesc::Table(idx) => spaces.check_table(idx, &context)?,
                ExportDesc::Memory(idx) => spaces.check_memory(idx, &context)?,
                ExportDesc::Global(idx) => spaces.check_global(idx, &context)?,
                ExportDesc::Tag(idx) => spaces.check("tag", idx, spaces.tags, &context)?,
            }
        }
    }

    if let Some(start) = layout.start {
        spaces.check_func(start.func_index, "start")?;
    }

    // Element segments.
    if let Some(elements) = layout.elements {
        for (i, elem) in elements.elements.iter().enumerate() {
            let context = format!("element[{i}]");
            spaces.check_heap(&elem.ref_type.heap_type, &context)?;
            if let ElementMode::Active { table_index, offset } = &elem.mode {
                spaces.check_table(*table_index, &context)?;
                check_instrs(&spaces, offset, 0, 0, &context)?;
            }
            match &elem.items {
                ElementItems::Functions(funcs) => {
                    // Plain index lists only exist for funcref segments.
                    if elem.ref_type != RefType::funcref() {
                        return Err(EncodeError::InvalidType {
                            context,
                            reason: format!(
                                "function index items require funcref, found {}",
                                elem.ref_type
                            ),
                        });
                    }
                    for func in funcs {
                        spaces.check_func(*func, &context)?;
                    }
                }
                ElementItems::Expressions(exprs) => {
                    for expr in exprs {
                        check_instrs(&spaces, expr, 0, 0, &context)?;
                    }
                }
            }
        }
    }

    // Data segments.
    if let Some(data) = layout.data {
        for (i, segment) in data.segments.iter().enumerate() {
            if let DataMode::Active { memory_index, offset } = &segment.mode {
                let context = format!("data[{i}]");
                spaces.check_memory(*memory_index, &context)?;
                check_instrs(&spaces, offset, 0, 0, &context)?;
            }
        }
    }

    // Code bodies: local index space is parameters plus declared locals.
    if let (Some(functions), Some(code)) = (layout.functions, layout.code) {
        for (i, func) in code.funcs.iter().enumerate() {
            let context = format!("code[{i}]");
            let type_index = functions.type_indices[i];
            let params = match layout.composite(type_index) {
                Some(CompositeType::Func(ft)) => ft.params.len() as u32,
                // Reported against the function section entry above.
                _ => 0,
            };
            let mut locals = params;
            for (count, vt) in &func.locals {
                spaces.check_value_type(vt, &context)?;
                locals += count;
            }
            check_instrs(&spaces, &func.body, 1, locals, &context)?;
        }
    }

    Ok(spaces)
}

fn require_func_type(layout: &Layout, type_index: u32, context: &str) -> Result<(), EncodeError> {
    match layout.composite(type_index) {
        Some(CompositeType::Func(_)) => Ok(()),
        Some(_) => Err(EncodeError::InvalidType {
            context: context.to_string(),
            reason: format!("type {type_index} is not a function type"),
        }),
        // Out-of-range indices are reported separately.
        None => Ok(()),
    }
}

// ===========================================================================
// Public API
// ===========================================================================

/// Encodes a WebAssembly module to binary format.
pub fn encode(module: &Module) -> Result<Vec<u8>, EncodeError> {
    let layout = Layout::of(module)?;
    validate(&layout)?;

    let mut buf = Vec::new();
    buf.extend_from_slice(&encoding::MAGIC);
    buf.extend_from_slice(&encoding::VERSION.to_le_bytes());

    // Custom sections inserted before any non-custom section.
    emit_customs_at(&mut buf, &layout, None);

    if let Some(types) = layout.types {
        encode_type_section(&mut buf, types);
        emit_customs_at(&mut buf, &layout, Some(SECTION_TYPE));
    }
    if let Some(imports) = layout.imports {
        encode_import_section(&mut buf, imports);
        emit_customs_at(&mut buf, &layout, Some(SECTION_IMPORT));
    }
    if let Some(functions) = layout.functions {
        encode_function_section(&mut buf, functions);
        emit_customs_at(&mut buf, &layout, Some(SECTION_FUNCTION));
    }
    if let Some(tables) = layout.tables {
        encode_table_section(&mut buf, tables);
        emit_customs_at(&mut buf, &layout, Some(SECTION_TABLE));
    }
    if let Some(memories) = layout.memories {
        encode_memory_section(&mut buf, memories);
        emit_customs_at(&mut buf, &layout, Some(SECTION_MEMORY));
    }
    if let Some(tags) = layout.tags {
        encode_tag_section(&mut buf, tags);
        emit_customs_at(&mut buf, &layout, Some(SECTION_TAG));
    }
    if let Some(globals) = layout.globals {
        encode_global_section(&mut buf, globals);
        emit_customs_at(&mut buf, &layout, Some(SECTION_GLOBAL));
    }
    if let Some(exports) = layout.exports {
        encode_export_section(&mut buf, exports);
        emit_customs_at(&mut buf, &layout, Some(SECTION_EXPORT));
    }
    if let Some(start) = layout.start {
        encode_start_section(&mut buf, start);
        emit_customs_at(&mut buf, &layout, Some(SECTION_START));
    }
    if let Some(elements) = layout.elements {
        encode_element_section(&mut buf, elements);
        emit_customs_at(&mut buf, &layout, Some(SECTION_ELEMENT));
    }
    if let Some(count) = data_count_to_emit(&layout) {
        let mut contents = Vec::new();
        encoding::write_vu32(&mut contents, count);
        emit_section(&mut buf, SECTION_DATA_COUNT, &contents);
        emit_customs_at(&mut buf, &layout, Some(SECTION_DATA_COUNT));
    }
    if let Some(code) = layout.code {
        encode_code_section(&mut buf, code);
        emit_customs_at(&mut buf, &layout, Some(SECTION_CODE));
    }
    if let Some(data) = layout.data {
        encode_data_section(&mut buf, data);
        emit_customs_at(&mut buf, &layout, Some(SECTION_DATA));
    }

    Ok(buf)
}

/// The data count to emit, if any: the client's explicit section wins;
/// otherwise one is synthesized when code references data segments, which
/// require the count to precede the code section.
fn data_count_to_emit(layout: &Layout) -> Option<u32> {
    if let Some(dc) = layout.data_count {
        return Some(dc.count);
    }
    let data = layout.data?;
    if code_references_data(layout.code?) {
        Some(data.segments.len() as u32)
    } else {
        None
    }
}

/// Returns true if any function body contains an instruction that needs the
/// data count section (`memory.init`, `data.drop`, `array.new_data`,
/// `array.init_data`).
fn code_references_data(code: &CodeSection) -> bool {
    fn scan(instrs: &[Instruction]) -> bool {
        use Instruction::*;
        for inst in instrs {
            match inst {
                MemoryInit { .. } | DataDrop { .. } | ArrayNewData { .. }
                | ArrayInitData { .. } => return true,
                Block { body, .. } | Loop { body, .. } => {
                    if scan(body) {
                        return true;
                    }
                }
                If {
                    then_body,
                    else_body,
                    ..
                } => {
                    if scan(then_body) {
                        return true;
                    }
                    if else_body.as_deref().is_some_and(scan) {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }
    code.funcs.iter().any(|f| scan(&f.body))
}

// ===========================================================================
// Section encoders (in wire order)
// ===========================================================================

/// Wraps section contents with a section ID and length prefix.
fn emit_section(buf: &mut Vec<u8>, id: u8, contents: &[u8]) {
    buf.push(id);
    encoding::write_vu32(buf, contents.len() as u32);
    buf.extend_from_slice(contents);
}

/// Emits the custom sections anchored at the given slot, in insertion order.
fn emit_customs_at(buf: &mut Vec<u8>, layout: &Layout, anchor: Option<u8>) {
    for (slot, custom) in &layout.customs {
        if *slot == anchor {
            let mut contents = Vec::new();
            encoding::write_name(&mut contents, &custom.name);
            contents.extend_from_slice(&custom.data);
            emit_section(buf, SECTION_CUSTOM, &contents);
        }
    }
}

/// Type section (id 1): composite type definitions.
///
/// ```text
/// typesec  ::= section_1(vec(rectype))
/// rectype  ::= 0x4E vec(subtype) | subtype
/// subtype  ::= 0x50 vec(typeidx) comptype | 0x4F vec(typeidx) comptype | comptype
/// comptype ::= 0x60 functype | 0x5F structtype | 0x5E arraytype
/// ```
fn encode_type_section(buf: &mut Vec<u8>, section: &TypeSection) {
    let mut contents = Vec::new();
    encoding::write_vu32(&mut contents, section.types.len() as u32);
    for entry in &section.types {
        entry.encode(&mut contents);
    }
    emit_section(buf, SECTION_TYPE, &contents);
}

/// Import section (id 2).
///
/// ```text
/// import     ::= module:name name:name importdesc
/// importdesc ::= 0x00 typeidx | 0x01 tabletype | 0x02 memtype
///              | 0x03 globaltype | 0x04 0x00 typeidx
/// ```
fn encode_import_section(buf: &mut Vec<u8>, section: &ImportSection) {
    let mut contents = Vec::new();
    encoding::write_vu32(&mut contents, section.imports.len() as u32);
    for Import { module, name, desc } in &section.imports {
        encoding::write_name(&mut contents, module);
        encoding::write_name(&mut contents, name);
        match desc {
            ImportDesc::Func { type_index } => {
                contents.push(DESC_FUNC);
                encoding::write_vu32(&mut contents, *type_index);
            }
            ImportDesc::Table(tt) => {
                contents.push(DESC_TABLE);
                tt.encode(&mut contents);
            }
            ImportDesc::Memory(mt) => {
                contents.push(DESC_MEMORY);
                mt.encode(&mut contents);
            }
            ImportDesc::Global(gt) => {
                contents.push(DESC_GLOBAL);
                gt.encode(&mut contents);
            }
            ImportDesc::Tag { type_index } => {
                contents.push(DESC_TAG);
                contents.push(TAG_ATTR_EXCEPTION);
                encoding::write_vu32(&mut contents, *type_index);
            }
        }
    }
    emit_section(buf, SECTION_IMPORT, &contents);
}

/// Function section (id 3): type index per local function.
fn encode_function_section(buf: &mut Vec<u8>, section: &FunctionSection) {
    let mut contents = Vec::new();
    encoding::write_vu32(&mut contents, section.type_indices.len() as u32);
    for type_index in &section.type_indices {
        encoding::write_vu32(&mut contents, *type_index);
    }
    emit_section(buf, SECTION_FUNCTION, &contents);
}

/// Table section (id 4): table declarations.
fn encode_table_section(buf: &mut Vec<u8>, section: &TableSection) {
    let mut contents = Vec::new();
    encoding::write_vu32(&mut contents, section.tables.len() as u32);
    for table in &section.tables {
        table.encode(&mut contents);
    }
    emit_section(buf, SECTION_TABLE, &contents);
}

/// Memory section (id 5): memory declarations.
fn encode_memory_section(buf: &mut Vec<u8>, section: &MemorySection) {
    let mut contents = Vec::new();
    encoding::write_vu32(&mut contents, section.memories.len() as u32);
    for memory in &section.memories {
        memory.encode(&mut contents);
    }
    emit_section(buf, SECTION_MEMORY, &contents);
}

/// Tag section (id 13): exception tags, each an attribute byte plus the
/// function type index of its signature. Ordered between the memory and
/// global sections.
fn encode_tag_section(buf: &mut Vec<u8>, section: &TagSection) {
    let mut contents = Vec::new();
    encoding::write_vu32(&mut contents, section.tags.len() as u32);
    for tag in &section.tags {
        contents.push(TAG_ATTR_EXCEPTION);
        encoding::write_vu32(&mut contents, tag.type_index);
    }
    emit_section(buf, SECTION_TAG, &contents);
}

/// Global section (id 6): global declarations with init expressions.
fn encode_global_section(buf: &mut Vec<u8>, section: &GlobalSection) {
    let mut contents = Vec::new();
    encoding::write_vu32(&mut contents, section.globals.len() as u32);
    for global in &section.globals {
        global.ty.encode(&mut contents);
        emit_expr(&mut contents, &global.init);
    }
    emit_section(buf, SECTION_GLOBAL, &contents);
}

/// Export section (id 7).
///
/// ```text
/// export     ::= name exportdesc
/// exportdesc ::= 0x00 funcidx | 0x01 tableidx | 0x02 memidx
///              | 0x03 globalidx | 0x04 tagidx
/// ```
fn encode_export_section(buf: &mut Vec<u8>, section: &ExportSection) {
    let mut contents = Vec::new();
    encoding::write_vu32(&mut contents, section.exports.len() as u32);
    for Export { name, desc } in &section.exports {
        encoding::write_name(&mut contents, name);
        match desc {
            ExportDesc::Func(idx) => {
                contents.push(DESC_FUNC);
                encoding::write_vu32(&mut contents, *idx);
            }
            ExportDesc::Table(idx) => {
                contents.push(DESC_TABLE);
                encoding::write_vu32(&mut contents, *idx);
            }
            ExportDesc::Memory(idx) => {
                contents.push(DESC_MEMORY);
                encoding::write_vu32(&mut contents, *idx);
            }
            ExportDesc::Global(idx) => {
                contents.push(DESC_GLOBAL);
                encoding::write_vu32(&mut contents, *idx);
            }
            ExportDesc::Tag(idx) => {
                contents.push(DESC_TAG);
                encoding::write_vu32(&mut contents, *idx);
            }
        }
    }
    emit_section(buf, SECTION_EXPORT, &contents);
}

/// Start section (id 8): start function index.
fn encode_start_section(buf: &mut Vec<u8>, section: &StartSection) {
    let mut contents = Vec::new();
    encoding::write_vu32(&mut contents, section.func_index);
    emit_section(buf, SECTION_START, &contents);
}

/// Element section (id 9): table initialisation segments.
///
/// The leading flags value (0-7) encodes the combination of mode
/// (active/passive/declarative), table addressing, and item encoding
/// (function indices vs expressions); it is derived from the segment, never
/// stored.
fn encode_element_section(buf: &mut Vec<u8>, section: &ElementSection) {
    let mut contents = Vec::new();
    encoding::write_vu32(&mut contents, section.elements.len() as u32);
    for elem in &section.elements {
        encode_element(&mut contents, elem);
    }
    emit_section(buf, SECTION_ELEMENT, &contents);
}

fn encode_element(buf: &mut Vec<u8>, elem: &Element) {
    let funcref = elem.ref_type == RefType::funcref();
    match (&elem.mode, &elem.items) {
        (ElementMode::Active { table_index, offset }, ElementItems::Functions(funcs)) => {
            if *table_index == 0 && funcref {
                encoding::write_vu32(buf, ELEM_ACTIVE_FUNCS);
                emit_expr(buf, offset);
            } else {
                encoding::write_vu32(buf, ELEM_ACTIVE_TABLE_FUNCS);
                encoding::write_vu32(buf, *table_index);
                emit_expr(buf, offset);
                buf.push(ELEMKIND_FUNCREF);
            }
            encoding::write_vu32(buf, funcs.len() as u32);
            for func in funcs {
                encoding::write_vu32(buf, *func);
            }
        }
        (ElementMode::Passive, ElementItems::Functions(funcs)) => {
            encoding::write_vu32(buf, ELEM_PASSIVE_FUNCS);
            buf.push(ELEMKIND_FUNCREF);
            encoding::write_vu32(buf, funcs.len() as u32);
            for func in funcs {
                encoding::write_vu32(buf, *func);
            }
        }
        (ElementMode::Declarative, ElementItems::Functions(funcs)) => {
            encoding::write_vu32(buf, ELEM_DECLARATIVE_FUNCS);
            buf.push(ELEMKIND_FUNCREF);
            encoding::write_vu32(buf, funcs.len() as u32);
            for func in funcs {
                encoding::write_vu32(buf, *func);
            }
        }
        (ElementMode::Active { table_index, offset }, ElementItems::Expressions(exprs)) => {
            if *table_index == 0 && funcref {
                encoding::write_vu32(buf, ELEM_ACTIVE_EXPRS);
                emit_expr(buf, offset);
            } else {
                encoding::write_vu32(buf, ELEM_ACTIVE_TABLE_EXPRS);
                encoding::write_vu32(buf, *table_index);
                emit_expr(buf, offset);
                elem.ref_type.encode(buf);
            }
            encoding::write_vu32(buf, exprs.len() as u32);
            for expr in exprs {
                emit_expr(buf, expr);
            }
        }
        (ElementMode::Passive, ElementItems::Expressions(exprs)) => {
            encoding::write_vu32(buf, ELEM_PASSIVE_EXPRS);
            elem.ref_type.encode(buf);
            encoding::write_vu32(buf, exprs.len() as u32);
            for expr in exprs {
                emit_expr(buf, expr);
            }
        }
        (ElementMode::Declarative, ElementItems::Expressions(exprs)) => {
            encoding::write_vu32(buf, ELEM_DECLARATIVE_EXPRS);
            elem.ref_type.encode(buf);
            encoding::write_vu32(buf, exprs.len() as u32);
            for expr in exprs {
                emit_expr(buf, expr);
            }
        }
    }
}

/// Code section (id 10): function bodies (locals + instructions).
///
/// ```text
/// code   ::= size:vu32 func
/// func   ::= vec(locals) expr
/// locals ::= n:vu32 t:valtype
/// ```
fn encode_code_section(buf: &mut Vec<u8>, section: &CodeSection) {
    let mut contents = Vec::new();
    encoding::write_vu32(&mut contents, section.funcs.len() as u32);

    for func in &section.funcs {
        let mut func_buf = Vec::new();

        // Locals: already in compressed (count, type) pairs.
        encoding::write_vu32(&mut func_buf, func.locals.len() as u32);
        for (count, vt) in &func.locals {
            encoding::write_vu32(&mut func_buf, *count);
            vt.encode(&mut func_buf);
        }

        emit_expr(&mut func_buf, &func.body);

        // Length-prefixed function body.
        encoding::write_vu32(&mut contents, func_buf.len() as u32);
        contents.extend(func_buf);
    }
    emit_section(buf, SECTION_CODE, &contents);
}

/// Data section (id 11): memory initialisation segments.
///
/// ```text
/// data ::= 0x00 expr vec(byte)         (active, memory 0)
///        | 0x01 vec(byte)              (passive)
///        | 0x02 memidx expr vec(byte)  (active, explicit memory)
/// ```
fn encode_data_section(buf: &mut Vec<u8>, section: &DataSection) {
    let mut contents = Vec::new();
    encoding::write_vu32(&mut contents, section.segments.len() as u32);

    for Data { init, mode } in &section.segments {
        match mode {
            DataMode::Active { memory_index, offset } => {
                if *memory_index == 0 {
                    encoding::write_vu32(&mut contents, DATA_ACTIVE);
                } else {
                    encoding::write_vu32(&mut contents, DATA_ACTIVE_EXPLICIT);
                    encoding::write_vu32(&mut contents, *memory_index);
                }
                emit_expr(&mut contents, offset);
            }
            DataMode::Passive => {
                encoding::write_vu32(&mut contents, DATA_PASSIVE);
            }
        }
        encoding::write_u8vec(&mut contents, init);
    }
    emit_section(buf, SECTION_DATA, &contents);
}

/// Encodes an instruction sequence followed by the end marker.
fn emit_expr(buf: &mut Vec<u8>, instrs: &Expr) {
    for inst in instrs {
        inst.encode(buf);
    }
    buf.push(OP_END);
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Func, Global, ModuleBuilder, Tag};
    use crate::types::{FuncType, GlobalType, MemoryType};

    fn module_with(sections: Vec<Section>) -> Module {
        let mut builder = ModuleBuilder::new();
        for section in sections {
            builder = builder.section(section);
        }
        builder.finish()
    }

    #[test]
    fn duplicate_section_rejected() {
        let module = module_with(vec![
            Section::Type(TypeSection::default()),
            Section::Type(TypeSection::default()),
        ]);
        assert!(matches!(
            encode(&module),
            Err(EncodeError::DuplicateSection { kind: "type" })
        ));
    }

    #[test]
    fn function_code_parity_enforced() {
        let module = module_with(vec![
            Section::Type(TypeSection::new(vec![FuncType::default().into()])),
            Section::Function(FunctionSection {
                type_indices: vec![0, 0],
            }),
            Section::Code(CodeSection {
                funcs: vec![Func::new(vec![], vec![])],
            }),
        ]);
        assert!(matches!(
            encode(&module),
            Err(EncodeError::SectionCountMismatch { left: 2, right: 1, .. })
        ));
    }

    #[test]
    fn shared_memory_requires_max() {
        let module = module_with(vec![Section::Memory(MemorySection {
            memories: vec![MemoryType::new(Limits {
                min: 1,
                max: None,
                shared: true,
            })],
        })]);
        let err = encode(&module).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidLimits { .. }), "{err}");
    }

    #[test]
    fn min_above_max_rejected() {
        let module = module_with(vec![Section::Memory(MemorySection {
            memories: vec![MemoryType::new(Limits::bounded(2, 1))],
        })]);
        assert!(matches!(
            encode(&module),
            Err(EncodeError::InvalidLimits { .. })
        ));
    }

    #[test]
    fn call_index_out_of_range() {
        let module = module_with(vec![
            Section::Type(TypeSection::new(vec![FuncType::default().into()])),
            Section::Function(FunctionSection {
                type_indices: vec![0],
            }),
            Section::Code(CodeSection {
                funcs: vec![Func::new(vec![], vec![Instruction::Call { func: 5 }])],
            }),
        ]);
        let err = encode(&module).unwrap_err();
        match err {
            EncodeError::IndexOutOfRange { space, index, context, .. } => {
                assert_eq!(space, "function");
                assert_eq!(index, 5);
                assert_eq!(context, "code[0]");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn local_index_counts_params() {
        let ty = FuncType::new(vec![ValueType::I32, ValueType::I32], vec![]);
        let body = vec![Instruction::LocalGet { local: 2 }, Instruction::Drop];
        let module = module_with(vec![
            Section::Type(TypeSection::new(vec![ty.into()])),
            Section::Function(FunctionSection {
                type_indices: vec![0],
            }),
            Section::Code(CodeSection {
                funcs: vec![Func::new(vec![(1, ValueType::I64)], body)],
            }),
        ]);
        // 2 params + 1 declared local: index 2 is in range.
        encode(&module).unwrap();
    }

    #[test]
    fn label_depth_tracked_through_blocks() {
        let body = vec![Instruction::Block {
            block_type: BlockType::Empty,
            body: vec![Instruction::Br { label: 2 }],
        }];
        let module = module_with(vec![
            Section::Type(TypeSection::new(vec![FuncType::default().into()])),
            Section::Function(FunctionSection {
                type_indices: vec![0],
            }),
            Section::Code(CodeSection {
                funcs: vec![Func::new(vec![], body)],
            }),
        ]);
        let err = encode(&module).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::IndexOutOfRange { space: "label", index: 2, .. }
        ));
    }

    #[test]
    fn function_section_entry_must_be_func_type() {
        let module = module_with(vec![
            Section::Type(TypeSection::new(vec![
                crate::types::StructType::new(vec![]).into(),
            ])),
            Section::Function(FunctionSection {
                type_indices: vec![0],
            }),
            Section::Code(CodeSection {
                funcs: vec![Func::new(vec![], vec![])],
            }),
        ]);
        assert!(matches!(encode(&module), Err(EncodeError::InvalidType { .. })));
    }

    #[test]
    fn global_init_is_checked() {
        let module = module_with(vec![Section::Global(GlobalSection {
            globals: vec![Global::new(
                GlobalType::new(ValueType::I32, false),
                vec![Instruction::GlobalGet { global: 3 }],
            )],
        })]);
        assert!(matches!(
            encode(&module),
            Err(EncodeError::IndexOutOfRange { space: "global", .. })
        ));
    }

    #[test]
    fn imports_extend_index_spaces() {
        let module = module_with(vec![
            Section::Type(TypeSection::new(vec![FuncType::default().into()])),
            Section::Import(ImportSection {
                imports: vec![Import {
                    module: "env".to_string(),
                    name: "f".to_string(),
                    desc: ImportDesc::Func { type_index: 0 },
                }],
            }),
            Section::Export(ExportSection {
                exports: vec![Export::new("f", ExportDesc::Func(0))],
            }),
        ]);
        encode(&module).unwrap();
    }

    #[test]
    fn explicit_data_count_must_match() {
        let module = module_with(vec![
            Section::DataCount(DataCountSection { count: 2 }),
            Section::Data(DataSection {
                segments: vec![Data::passive(vec![1, 2, 3])],
            }),
        ]);
        assert!(matches!(
            encode(&module),
            Err(EncodeError::SectionCountMismatch { left: 2, right: 1, .. })
        ));
    }

    #[test]
    fn explicit_data_count_must_match_missing_data_section() {
        // No data section means zero segments; a nonzero count disagrees.
        let module = module_with(vec![Section::DataCount(DataCountSection { count: 1 })]);
        assert!(matches!(
            encode(&module),
            Err(EncodeError::SectionCountMismatch { left: 1, right: 0, .. })
        ));
    }

    #[test]
    fn tag_section_bytes() {
        let module = module_with(vec![
            Section::Type(TypeSection::new(vec![FuncType::default().into()])),
            Section::Tag(TagSection {
                tags: vec![Tag { type_index: 0 }],
            }),
        ]);
        let bytes = encode(&module).unwrap();
        // header + type section, then tag section id 13, size 3, one entry
        assert_eq!(&bytes[bytes.len() - 5..], &[13, 3, 1, 0x00, 0]);
    }
}
