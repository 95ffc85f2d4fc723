//! WebAssembly instruction representation.
//!
//! One exhaustive enum covers every opcode family across the four prefix
//! spaces (base, 0xFC, 0xFB GC, 0xFE atomics); each variant carries exactly
//! the immediates its opcode requires. Structured instructions (`block`,
//! `loop`, `if`) own their nested bodies by value; the `end` and `else`
//! markers are an encoding concern and have no variants here.

pub mod encode;

use std::fmt;

use crate::types::{HeapType, RefType, ValueType};

/// Memory argument for memory access instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemArg {
    /// Alignment exponent (log2 of the byte alignment).
    pub align: u32,
    /// Constant byte offset added to the address operand.
    pub offset: u32,
    /// Memory index; 0 for the single-memory common case.
    pub memory: u32,
}

impl MemArg {
    pub fn new(align: u32, offset: u32) -> MemArg {
        MemArg {
            align,
            offset,
            memory: 0,
        }
    }
}

/// Block type for structured control instructions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockType {
    /// No parameters or results.
    Empty,
    /// A single result value type.
    Value(ValueType),
    /// A function type index, for blocks with parameters or multiple results.
    Func(u32),
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockType::Empty => Ok(()),
            BlockType::Value(vt) => write!(f, " (result {vt})"),
            BlockType::Func(idx) => write!(f, " (type {idx})"),
        }
    }
}

/// Algebraic data type representing all encodable WebAssembly instructions.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    // Control instructions
    Unreachable,
    Nop,
    Block {
        block_type: BlockType,
        body: Vec<Instruction>,
    },
    Loop {
        block_type: BlockType,
        body: Vec<Instruction>,
    },
    If {
        block_type: BlockType,
        then_body: Vec<Instruction>,
        else_body: Option<Vec<Instruction>>,
    },
    Br { label: u32 },
    BrIf { label: u32 },
    BrTable { labels: Vec<u32>, default: u32 },
    Return,
    Call { func: u32 },
    CallIndirect { type_index: u32, table: u32 },
    // Tail calls
    ReturnCall { func: u32 },
    ReturnCallIndirect { type_index: u32, table: u32 },

    // Reference instructions
    RefNull { heap_type: HeapType },
    RefIsNull,
    RefFunc { func: u32 },
    RefAsNonNull,
    BrOnNull { label: u32 },
    BrOnNonNull { label: u32 },

    // Parametric instructions
    Drop,
    Select,
    SelectTyped { types: Vec<ValueType> },

    // Variable instructions
    LocalGet { local: u32 },
    LocalSet { local: u32 },
    LocalTee { local: u32 },
    GlobalGet { global: u32 },
    GlobalSet { global: u32 },

    // Table instructions
    TableGet { table: u32 },
    TableSet { table: u32 },
    TableInit { elem: u32, table: u32 },
    ElemDrop { elem: u32 },
    TableCopy { dst_table: u32, src_table: u32 },
    TableGrow { table: u32 },
    TableSize { table: u32 },
    TableFill { table: u32 },

    // Memory instructions
    I32Load { memarg: MemArg },
    I64Load { memarg: MemArg },
    F32Load { memarg: MemArg },
    F64Load { memarg: MemArg },
    I32Load8S { memarg: MemArg },
    I32Load8U { memarg: MemArg },
    I32Load16S { memarg: MemArg },
    I32Load16U { memarg: MemArg },
    I64Load8S { memarg: MemArg },
    I64Load8U { memarg: MemArg },
    I64Load16S { memarg: MemArg },
    I64Load16U { memarg: MemArg },
    I64Load32S { memarg: MemArg },
    I64Load32U { memarg: MemArg },
    I32Store { memarg: MemArg },
    I64Store { memarg: MemArg },
    F32Store { memarg: MemArg },
    F64Store { memarg: MemArg },
    I32Store8 { memarg: MemArg },
    I32Store16 { memarg: MemArg },
    I64Store8 { memarg: MemArg },
    I64Store16 { memarg: MemArg },
    I64Store32 { memarg: MemArg },
    MemorySize,
    MemoryGrow,
    MemoryInit { data: u32 },
    DataDrop { data: u32 },
    MemoryCopy,
    MemoryFill,

    // Numeric instructions - Constants
    I32Const { value: i32 },
    I64Const { value: i64 },
    F32Const { value: f32 },
    F64Const { value: f64 },

    // Numeric instructions - i32 operations
    I32Eqz,
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32GtS,
    I32GtU,
    I32LeS,
    I32LeU,
    I32GeS,
    I32GeU,
    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Rotl,
    I32Rotr,

    // Numeric instructions - i64 operations
    I64Eqz,
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64GtS,
    I64GtU,
    I64LeS,
    I64LeU,
    I64GeS,
    I64GeU,
    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I64Rotl,
    I64Rotr,

    // Numeric instructions - f32 operations
    F32Eq,
    F32Ne,
    F32Lt,
    F32Gt,
    F32Le,
    F32Ge,
    F32Abs,
    F32Neg,
    F32Ceil,
    F32Floor,
    F32Trunc,
    F32Nearest,
    F32Sqrt,
    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Min,
    F32Max,
    F32Copysign,

    // Numeric instructions - f64 operations
    F64Eq,
    F64Ne,
    F64Lt,
    F64Gt,
    F64Le,
    F64Ge,
    F64Abs,
    F64Neg,
    F64Ceil,
    F64Floor,
    F64Trunc,
    F64Nearest,
    F64Sqrt,
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Min,
    F64Max,
    F64Copysign,

    // Numeric instructions - Conversions
    I32WrapI64,
    I32TruncF32S,
    I32TruncF32U,
    I32TruncF64S,
    I32TruncF64U,
    I64ExtendI32S,
    I64ExtendI32U,
    I64TruncF32S,
    I64TruncF32U,
    I64TruncF64S,
    I64TruncF64U,
    F32ConvertI32S,
    F32ConvertI32U,
    F32ConvertI64S,
    F32ConvertI64U,
    F32DemoteF64,
    F64ConvertI32S,
    F64ConvertI32U,
    F64ConvertI64S,
    F64ConvertI64U,
    F64PromoteF32,
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,

    // Sign extension operations
    I32Extend8S,
    I32Extend16S,
    I64Extend8S,
    I64Extend16S,
    I64Extend32S,

    // Saturating truncation operations (0xFC prefix)
    I32TruncSatF32S,
    I32TruncSatF32U,
    I32TruncSatF64S,
    I32TruncSatF64U,
    I64TruncSatF32S,
    I64TruncSatF32U,
    I64TruncSatF64S,
    I64TruncSatF64U,

    // SIMD instructions (0xFD prefix)
    V128Load { memarg: MemArg },
    V128Store { memarg: MemArg },
    V128Const { value: [u8; 16] },

    // GC instructions (0xFB prefix)
    StructNew { type_index: u32 },
    StructNewDefault { type_index: u32 },
    StructGet { type_index: u32, field: u32 },
    StructGetS { type_index: u32, field: u32 },
    StructGetU { type_index: u32, field: u32 },
    StructSet { type_index: u32, field: u32 },
    ArrayNew { type_index: u32 },
    ArrayNewDefault { type_index: u32 },
    ArrayNewFixed { type_index: u32, len: u32 },
    ArrayNewData { type_index: u32, data: u32 },
    ArrayNewElem { type_index: u32, elem: u32 },
    ArrayGet { type_index: u32 },
    ArrayGetS { type_index: u32 },
    ArrayGetU { type_index: u32 },
    ArraySet { type_index: u32 },
    ArrayLen,
    ArrayFill { type_index: u32 },
    ArrayCopy { dst_type_index: u32, src_type_index: u32 },
    ArrayInitData { type_index: u32, data: u32 },
    ArrayInitElem { type_index: u32, elem: u32 },
    RefTest { ref_type: RefType },
    RefCast { ref_type: RefType },
    BrOnCast {
        label: u32,
        from_type: RefType,
        to_type: RefType,
    },
    BrOnCastFail {
        label: u32,
        from_type: RefType,
        to_type: RefType,
    },
    AnyConvertExtern,
    ExternConvertAny,
    RefI31,
    I31GetS,
    I31GetU,

    // Atomic instructions (0xFE prefix, threads proposal)
    MemoryAtomicNotify { memarg: MemArg },
    MemoryAtomicWait32 { memarg: MemArg },
    MemoryAtomicWait64 { memarg: MemArg },
    AtomicFence,
    I32AtomicLoad { memarg: MemArg },
    I64AtomicLoad { memarg: MemArg },
    I32AtomicLoad8U { memarg: MemArg },
    I32AtomicLoad16U { memarg: MemArg },
    I64AtomicLoad8U { memarg: MemArg },
    I64AtomicLoad16U { memarg: MemArg },
    I64AtomicLoad32U { memarg: MemArg },
    I32AtomicStore { memarg: MemArg },
    I64AtomicStore { memarg: MemArg },
    I32AtomicStore8 { memarg: MemArg },
    I32AtomicStore16 { memarg: MemArg },
    I64AtomicStore8 { memarg: MemArg },
    I64AtomicStore16 { memarg: MemArg },
    I64AtomicStore32 { memarg: MemArg },
    I32AtomicRmwAdd { memarg: MemArg },
    I64AtomicRmwAdd { memarg: MemArg },
    I32AtomicRmw8AddU { memarg: MemArg },
    I32AtomicRmw16AddU { memarg: MemArg },
    I64AtomicRmw8AddU { memarg: MemArg },
    I64AtomicRmw16AddU { memarg: MemArg },
    I64AtomicRmw32AddU { memarg: MemArg },
    I32AtomicRmwSub { memarg: MemArg },
    I64AtomicRmwSub { memarg: MemArg },
    I32AtomicRmw8SubU { memarg: MemArg },
    I32AtomicRmw16SubU { memarg: MemArg },
    I64AtomicRmw8SubU { memarg: MemArg },
    I64AtomicRmw16SubU { memarg: MemArg },
    I64AtomicRmw32SubU { memarg: MemArg },
    I32AtomicRmwAnd { memarg: MemArg },
    I64AtomicRmwAnd { memarg: MemArg },
    I32AtomicRmw8AndU { memarg: MemArg },
    I32AtomicRmw16AndU { memarg: MemArg },
    I64AtomicRmw8AndU { memarg: MemArg },
    I64AtomicRmw16AndU { memarg: MemArg },
    I64AtomicRmw32AndU { memarg: MemArg },
    I32AtomicRmwOr { memarg: MemArg },
    I64AtomicRmwOr { memarg: MemArg },
    I32AtomicRmw8OrU { memarg: MemArg },
    I32AtomicRmw16OrU { memarg: MemArg },
    I64AtomicRmw8OrU { memarg: MemArg },
    I64AtomicRmw16OrU { memarg: MemArg },
    I64AtomicRmw32OrU { memarg: MemArg },
    I32AtomicRmwXor { memarg: MemArg },
    I64AtomicRmwXor { memarg: MemArg },
    I32AtomicRmw8XorU { memarg: MemArg },
    I32AtomicRmw16XorU { memarg: MemArg },
    I64AtomicRmw8XorU { memarg: MemArg },
    I64AtomicRmw16XorU { memarg: MemArg },
    I64AtomicRmw32XorU { memarg: MemArg },
    I32AtomicRmwXchg { memarg: MemArg },
    I64AtomicRmwXchg { memarg: MemArg },
    I32AtomicRmw8XchgU { memarg: MemArg },
    I32AtomicRmw16XchgU { memarg: MemArg },
    I64AtomicRmw8XchgU { memarg: MemArg },
    I64AtomicRmw16XchgU { memarg: MemArg },
    I64AtomicRmw32XchgU { memarg: MemArg },
    I32AtomicRmwCmpxchg { memarg: MemArg },
    I64AtomicRmwCmpxchg { memarg: MemArg },
    I32AtomicRmw8CmpxchgU { memarg: MemArg },
    I32AtomicRmw16CmpxchgU { memarg: MemArg },
    I64AtomicRmw8CmpxchgU { memarg: MemArg },
    I64AtomicRmw16CmpxchgU { memarg: MemArg },
    I64AtomicRmw32CmpxchgU { memarg: MemArg },
}

impl Instruction {
    /// The canonical mnemonic for this instruction.
    pub fn mnemonic(&self) -> &'static str {
        use Instruction::*;
        match self {
            // Control
            Unreachable => "unreachable",
            Nop => "nop",
            Block { .. } => "block",
            Loop { .. } => "loop",
            If { .. } => "if",
            Br { .. } => "br",
            BrIf { .. } => "br_if",
            BrTable { .. } => "br_table",
            Return => "return",
            Call { .. } => "call",
            CallIndirect { .. } => "call_indirect",
            ReturnCall { .. } => "return_call",
            ReturnCallIndirect { .. } => "return_call_indirect",

            // Reference
            RefNull { .. } => "ref.null",
            RefIsNull => "ref.is_null",
            RefFunc { .. } => "ref.func",
            RefAsNonNull => "ref.as_non_null",
            BrOnNull { .. } => "br_on_null",
            BrOnNonNull { .. } => "br_on_non_null",

            // Parametric
            Drop => "drop",
            Select => "select",
            SelectTyped { .. } => "select",

            // Variable
            LocalGet { .. } => "local.get",
            LocalSet { .. } => "local.set",
            LocalTee { .. } => "local.tee",
            GlobalGet { .. } => "global.get",
            GlobalSet { .. } => "global.set",

            // Table
            TableGet { .. } => "table.get",
            TableSet { .. } => "table.set",
            TableInit { .. } => "table.init",
            ElemDrop { .. } => "elem.drop",
            TableCopy { .. } => "table.copy",
            TableGrow { .. } => "table.grow",
            TableSize { .. } => "table.size",
            TableFill { .. } => "table.fill",

            // Memory
            I32Load { .. } => "i32.load",
            I64Load { .. } => "i64.load",
            F32Load { .. } => "f32.load",
            F64Load { .. } => "f64.load",
            I32Load8S { .. } => "i32.load8_s",
            I32Load8U { .. } => "i32.load8_u",
            I32Load16S { .. } => "i32.load16_s",
            I32Load16U { .. } => "i32.load16_u",
            I64Load8S { .. } => "i64.load8_s",
            I64Load8U { .. } => "i64.load8_u",
            I64Load16S { .. } => "i64.load16_s",
            I64Load16U { .. } => "i64.load16_u",
            I64Load32S { .. } => "i64.load32_s",
            I64Load32U { .. } => "i64.load32_u",
            I32Store { .. } => "i32.store",
            I64Store { .. } => "i64.store",
            F32Store { .. } => "f32.store",
            F64Store { .. } => "f64.store",
            I32Store8 { .. } => "i32.store8",
            I32Store16 { .. } => "i32.store16",
            I64Store8 { .. } => "i64.store8",
            I64Store16 { .. } => "i64.store16",
            I64Store32 { .. } => "i64.store32",
            MemorySize => "memory.size",
            MemoryGrow => "memory.grow",
            MemoryInit { .. } => "memory.init",
            DataDrop { .. } => "data.drop",
            MemoryCopy => "memory.copy",
            MemoryFill => "memory.fill",

            // Numeric
            I32Const { .. } => "i32.const",
            I64Const { .. } => "i64.const",
            F32Const { .. } => "f32.const",
            F64Const { .. } => "f64.const",
            I32Eqz => "i32.eqz",
            I32Eq => "i32.eq",
            I32Ne => "i32.ne",
            I32LtS => "i32.lt_s",
            I32LtU => "i32.lt_u",
            I32GtS => "i32.gt_s",
            I32GtU => "i32.gt_u",
            I32LeS => "i32.le_s",
            I32LeU => "i32.le_u",
            I32GeS => "i32.ge_s",
            I32GeU => "i32.ge_u",
            I64Eqz => "i64.eqz",
            I64Eq => "i64.eq",
            I64Ne => "i64.ne",
            I64LtS => "i64.lt_s",
            I64LtU => "i64.lt_u",
            I64GtS => "i64.gt_s",
            I64GtU => "i64.gt_u",
            I64LeS => "i64.le_s",
            I64LeU => "i64.le_u",
            I64GeS => "i64.ge_s",
            I64GeU => "i64.ge_u",
            F32Eq => "f32.eq",
            F32Ne => "f32.ne",
            F32Lt => "f32.lt",
            F32Gt => "f32.gt",
            F32Le => "f32.le",
            F32Ge => "f32.ge",
            F64Eq => "f64.eq",
            F64Ne => "f64.ne",
            F64Lt => "f64.lt",
            F64Gt => "f64.gt",
            F64Le => "f64.le",
            F64Ge => "f64.ge",
            I32Clz => "i32.clz",
            I32Ctz => "i32.ctz",
            I32Popcnt => "i32.popcnt",
            I32Add => "i32.add",
            I32Sub => "i32.sub",
            I32Mul => "i32.mul",
            I32DivS => "i32.div_s",
            I32DivU => "i32.div_u",
            I32RemS => "i32.rem_s",
            I32RemU => "i32.rem_u",
            I32And => "i32.and",
            I32Or => "i32.or",
            I32Xor => "i32.xor",
            I32Shl => "i32.shl",
            I32ShrS => "i32.shr_s",
            I32ShrU => "i32.shr_u",
            I32Rotl => "i32.rotl",
            I32Rotr => "i32.rotr",
            I64Clz => "i64.clz",
            I64Ctz => "i64.ctz",
            I64Popcnt => "i64.popcnt",
            I64Add => "i64.add",
            I64Sub => "i64.sub",
            I64Mul => "i64.mul",
            I64DivS => "i64.div_s",
            I64DivU => "i64.div_u",
            I64RemS => "i64.rem_s",
            I64RemU => "i64.rem_u",
            I64And => "i64.and",
            I64Or => "i64.or",
            I64Xor => "i64.xor",
            I64Shl => "i64.shl",
            I64ShrS => "i64.shr_s",
            I64ShrU => "i64.shr_u",
            I64Rotl => "i64.rotl",
            I64Rotr => "i64.rotr",
            F32Abs => "f32.abs",
            F32Neg => "f32.neg",
            F32Ceil => "f32.ceil",
            F32Floor => "f32.floor",
            F32Trunc => "f32.trunc",
            F32Nearest => "f32.nearest",
            F32Sqrt => "f32.sqrt",
            F32Add => "f32.add",
            F32Sub => "f32.sub",
            F32Mul => "f32.mul",
            F32Div => "f32.div",
            F32Min => "f32.min",
            F32Max => "f32.max",
            F32Copysign => "f32.copysign",
            F64Abs => "f64.abs",
            F64Neg => "f64.neg",
            F64Ceil => "f64.ceil",
            F64Floor => "f64.floor",
            F64Trunc => "f64.trunc",
            F64Nearest => "f64.nearest",
            F64Sqrt => "f64.sqrt",
            F64Add => "f64.add",
            F64Sub => "f64.sub",
            F64Mul => "f64.mul",
            F64Div => "f64.div",
            F64Min => "f64.min",
            F64Max => "f64.max",
            F64Copysign => "f64.copysign",
            I32WrapI64 => "i32.wrap_i64",
            I32TruncF32S => "i32.trunc_f32_s",
            I32TruncF32U => "i32.trunc_f32_u",
            I32TruncF64S => "i32.trunc_f64_s",
            I32TruncF64U => "i32.trunc_f64_u",
            I64ExtendI32S => "i64.extend_i32_s",
            I64ExtendI32U => "i64.extend_i32_u",
            I64TruncF32S => "i64.trunc_f32_s",
            I64TruncF32U => "i64.trunc_f32_u",
            I64TruncF64S => "i64.trunc_f64_s",
            I64TruncF64U => "i64.trunc_f64_u",
            F32ConvertI32S => "f32.convert_i32_s",
            F32ConvertI32U => "f32.convert_i32_u",
            F32ConvertI64S => "f32.convert_i64_s",
            F32ConvertI64U => "f32.convert_i64_u",
            F32DemoteF64 => "f32.demote_f64",
            F64ConvertI32S => "f64.convert_i32_s",
            F64ConvertI32U => "f64.convert_i32_u",
            F64ConvertI64S => "f64.convert_i64_s",
            F64ConvertI64U => "f64.convert_i64_u",
            F64PromoteF32 => "f64.promote_f32",
            I32ReinterpretF32 => "i32.reinterpret_f32",
            I64ReinterpretF64 => "i64.reinterpret_f64",
            F32ReinterpretI32 => "f32.reinterpret_i32",
            F64ReinterpretI64 => "f64.reinterpret_i64",
            I32Extend8S => "i32.extend8_s",
            I32Extend16S => "i32.extend16_s",
            I64Extend8S => "i64.extend8_s",
            I64Extend16S => "i64.extend16_s",
            I64Extend32S => "i64.extend32_s",
            I32TruncSatF32S => "i32.trunc_sat_f32_s",
            I32TruncSatF32U => "i32.trunc_sat_f32_u",
            I32TruncSatF64S => "i32.trunc_sat_f64_s",
            I32TruncSatF64U => "i32.trunc_sat_f64_u",
            I64TruncSatF32S => "i64.trunc_sat_f32_s",
            I64TruncSatF32U => "i64.trunc_sat_f32_u",
            I64TruncSatF64S => "i64.trunc_sat_f64_s",
            I64TruncSatF64U => "i64.trunc_sat_f64_u",

            // SIMD
            V128Load { .. } => "v128.load",
            V128Store { .. } => "v128.store",
            V128Const { .. } => "v128.const",

            // GC
            StructNew { .. } => "struct.new",
            StructNewDefault { .. } => "struct.new_default",
            StructGet { .. } => "struct.get",
            StructGetS { .. } => "struct.get_s",
            StructGetU { .. } => "struct.get_u",
            StructSet { .. } => "struct.set",
            ArrayNew { .. } => "array.new",
            ArrayNewDefault { .. } => "array.new_default",
            ArrayNewFixed { .. } => "array.new_fixed",
            ArrayNewData { .. } => "array.new_data",
            ArrayNewElem { .. } => "array.new_elem",
            ArrayGet { .. } => "array.get",
            ArrayGetS { .. } => "array.get_s",
            ArrayGetU { .. } => "array.get_u",
            ArraySet { .. } => "array.set",
            ArrayLen => "array.len",
            ArrayFill { .. } => "array.fill",
            ArrayCopy { .. } => "array.copy",
            ArrayInitData { .. } => "array.init_data",
            ArrayInitElem { .. } => "array.init_elem",
            RefTest { .. } => "ref.test",
            RefCast { .. } => "ref.cast",
            BrOnCast { .. } => "br_on_cast",
            BrOnCastFail { .. } => "br_on_cast_fail",
            AnyConvertExtern => "any.convert_extern",
            ExternConvertAny => "extern.convert_any",
            RefI31 => "ref.i31",
            I31GetS => "i31.get_s",
            I31GetU => "i31.get_u",

            // Atomics
            MemoryAtomicNotify { .. } => "memory.atomic.notify",
            MemoryAtomicWait32 { .. } => "memory.atomic.wait32",
            MemoryAtomicWait64 { .. } => "memory.atomic.wait64",
            AtomicFence => "atomic.fence",
            I32AtomicLoad { .. } => "i32.atomic.load",
            I64AtomicLoad { .. } => "i64.atomic.load",
            I32AtomicLoad8U { .. } => "i32.atomic.load8_u",
            I32AtomicLoad16U { .. } => "i32.atomic.load16_u",
            I64AtomicLoad8U { .. } => "i64.atomic.load8_u",
            I64AtomicLoad16U { .. } => "i64.atomic.load16_u",
            I64AtomicLoad32U { .. } => "i64.atomic.load32_u",
            I32AtomicStore { .. } => "i32.atomic.store",
            I64AtomicStore { .. } => "i64.atomic.store",
            I32AtomicStore8 { .. } => "i32.atomic.store8",
            I32AtomicStore16 { .. } => "i32.atomic.store16",
            I64AtomicStore8 { .. } => "i64.atomic.store8",
            I64AtomicStore16 { .. } => "i64.atomic.store16",
            I64AtomicStore32 { .. } => "i64.atomic.store32",
            I32AtomicRmwAdd { .. } => "i32.atomic.rmw.add",
            I64AtomicRmwAdd { .. } => "i64.atomic.rmw.add",
            I32AtomicRmw8AddU { .. } => "i32.atomic.rmw8.add_u",
            I32AtomicRmw16AddU { .. } => "i32.atomic.rmw16.add_u",
            I64AtomicRmw8AddU { .. } => "i64.atomic.rmw8.add_u",
            I64AtomicRmw16AddU { .. } => "i64.atomic.rmw16.add_u",
            I64AtomicRmw32AddU { .. } => "i64.atomic.rmw32.add_u",
            I32AtomicRmwSub { .. } => "i32.atomic.rmw.sub",
            I64AtomicRmwSub { .. } => "i64.atomic.rmw.sub",
            I32AtomicRmw8SubU { .. } => "i32.atomic.rmw8.sub_u",
            I32AtomicRmw16SubU { .. } => "i32.atomic.rmw16.sub_u",
            I64AtomicRmw8SubU { .. } => "i64.atomic.rmw8.sub_u",
            I64AtomicRmw16SubU { .. } => "i64.atomic.rmw16.sub_u",
            I64AtomicRmw32SubU { .. } => "i64.atomic.rmw32.sub_u",
            I32AtomicRmwAnd { .. } => "i32.atomic.rmw.and",
            I64AtomicRmwAnd { .. } => "i64.atomic.rmw.and",
            I32AtomicRmw8AndU { .. } => "i32.atomic.rmw8.and_u",
            I32AtomicRmw16AndU { .. } => "i32.atomic.rmw16.and_u",
            I64AtomicRmw8AndU { .. } => "i64.atomic.rmw8.and_u",
            I64AtomicRmw16AndU { .. } => "i64.atomic.rmw16.and_u",
            I64AtomicRmw32AndU { .. } => "i64.atomic.rmw32.and_u",
            I32AtomicRmwOr { .. } => "i32.atomic.rmw.or",
            I64AtomicRmwOr { .. } => "i64.atomic.rmw.or",
            I32AtomicRmw8OrU { .. } => "i32.atomic.rmw8.or_u",
            I32AtomicRmw16OrU { .. } => "i32.atomic.rmw16.or_u",
            I64AtomicRmw8OrU { .. } => "i64.atomic.rmw8.or_u",
            I64AtomicRmw16OrU { .. } => "i64.atomic.rmw16.or_u",
            I64AtomicRmw32OrU { .. } => "i64.atomic.rmw32.or_u",
            I32AtomicRmwXor { .. } => "i32.atomic.rmw.xor",
            I64AtomicRmwXor { .. } => "i64.atomic.rmw.xor",
            I32AtomicRmw8XorU { .. } => "i32.atomic.rmw8.xor_u",
            I32AtomicRmw16XorU { .. } => "i32.atomic.rmw16.xor_u",
            I64AtomicRmw8XorU { .. } => "i64.atomic.rmw8.xor_u",
            I64AtomicRmw16XorU { .. } => "i64.atomic.rmw16.xor_u",
            I64AtomicRmw32XorU { .. } => "i64.atomic.rmw32.xor_u",
            I32AtomicRmwXchg { .. } => "i32.atomic.rmw.xchg",
            I64AtomicRmwXchg { .. } => "i64.atomic.rmw.xchg",
            I32AtomicRmw8XchgU { .. } => "i32.atomic.rmw8.xchg_u",
            I32AtomicRmw16XchgU { .. } => "i32.atomic.rmw16.xchg_u",
            I64AtomicRmw8XchgU { .. } => "i64.atomic.rmw8.xchg_u",
            I64AtomicRmw16XchgU { .. } => "i64.atomic.rmw16.xchg_u",
            I64AtomicRmw32XchgU { .. } => "i64.atomic.rmw32.xchg_u",
            I32AtomicRmwCmpxchg { .. } => "i32.atomic.rmw.cmpxchg",
            I64AtomicRmwCmpxchg { .. } => "i64.atomic.rmw.cmpxchg",
            I32AtomicRmw8CmpxchgU { .. } => "i32.atomic.rmw8.cmpxchg_u",
            I32AtomicRmw16CmpxchgU { .. } => "i32.atomic.rmw16.cmpxchg_u",
            I64AtomicRmw8CmpxchgU { .. } => "i64.atomic.rmw8.cmpxchg_u",
            I64AtomicRmw16CmpxchgU { .. } => "i64.atomic.rmw16.cmpxchg_u",
            I64AtomicRmw32CmpxchgU { .. } => "i64.atomic.rmw32.cmpxchg_u",
        }
    }

    /// The memory argument carried by this instruction, if any.
    pub(crate) fn memarg(&self) -> Option<&MemArg> {
        use Instruction::*;
        match self {
            I32Load { memarg } | I64Load { memarg } | F32Load { memarg } | F64Load { memarg }
            | I32Load8S { memarg } | I32Load8U { memarg } | I32Load16S { memarg }
            | I32Load16U { memarg } | I64Load8S { memarg } | I64Load8U { memarg }
            | I64Load16S { memarg } | I64Load16U { memarg } | I64Load32S { memarg }
            | I64Load32U { memarg } | I32Store { memarg } | I64Store { memarg }
            | F32Store { memarg } | F64Store { memarg } | I32Store8 { memarg }
            | I32Store16 { memarg } | I64Store8 { memarg } | I64Store16 { memarg }
            | I64Store32 { memarg } | V128Load { memarg } | V128Store { memarg }
            | MemoryAtomicNotify { memarg } | MemoryAtomicWait32 { memarg }
            | MemoryAtomicWait64 { memarg } | I32AtomicLoad { memarg }
            | I64AtomicLoad { memarg } | I32AtomicLoad8U { memarg }
            | I32AtomicLoad16U { memarg } | I64AtomicLoad8U { memarg }
            | I64AtomicLoad16U { memarg } | I64AtomicLoad32U { memarg }
            | I32AtomicStore { memarg } | I64AtomicStore { memarg }
            | I32AtomicStore8 { memarg } | I32AtomicStore16 { memarg }
            | I64AtomicStore8 { memarg } | I64AtomicStore16 { memarg }
            | I64AtomicStore32 { memarg } | I32AtomicRmwAdd { memarg }
            | I64AtomicRmwAdd { memarg } | I32AtomicRmw8AddU { memarg }
            | I32AtomicRmw16AddU { memarg } | I64AtomicRmw8AddU { memarg }
            | I64AtomicRmw16AddU { memarg } | I64AtomicRmw32AddU { memarg }
            | I32AtomicRmwSub { memarg } | I64AtomicRmwSub { memarg }
            | I32AtomicRmw8SubU { memarg } | I32AtomicRmw16SubU { memarg }
            | I64AtomicRmw8SubU { memarg } | I64AtomicRmw16SubU { memarg }
            | I64AtomicRmw32SubU { memarg } | I32AtomicRmwAnd { memarg }
            | I64AtomicRmwAnd { memarg } | I32AtomicRmw8AndU { memarg }
            | I32AtomicRmw16AndU { memarg } | I64AtomicRmw8AndU { memarg }
            | I64AtomicRmw16AndU { memarg } | I64AtomicRmw32AndU { memarg }
            | I32AtomicRmwOr { memarg } | I64AtomicRmwOr { memarg }
            | I32AtomicRmw8OrU { memarg } | I32AtomicRmw16OrU { memarg }
            | I64AtomicRmw8OrU { memarg } | I64AtomicRmw16OrU { memarg }
            | I64AtomicRmw32OrU { memarg } | I32AtomicRmwXor { memarg }
            | I64AtomicRmwXor { memarg } | I32AtomicRmw8XorU { memarg }
            | I32AtomicRmw16XorU { memarg } | I64AtomicRmw8XorU { memarg }
            | I64AtomicRmw16XorU { memarg } | I64AtomicRmw32XorU { memarg }
            | I32AtomicRmwXchg { memarg } | I64AtomicRmwXchg { memarg }
            | I32AtomicRmw8XchgU { memarg } | I32AtomicRmw16XchgU { memarg }
            | I64AtomicRmw8XchgU { memarg } | I64AtomicRmw16XchgU { memarg }
            | I64AtomicRmw32XchgU { memarg } | I32AtomicRmwCmpxchg { memarg }
            | I64AtomicRmwCmpxchg { memarg } | I32AtomicRmw8CmpxchgU { memarg }
            | I32AtomicRmw16CmpxchgU { memarg } | I64AtomicRmw8CmpxchgU { memarg }
            | I64AtomicRmw16CmpxchgU { memarg } | I64AtomicRmw32CmpxchgU { memarg } => {
                Some(memarg)
            }
            _ => None,
        }
    }
}

/// Renders an f32 constant as a WAT literal (hex float, `inf`, or `nan:0x…`).
pub(crate) fn f32_literal(v: f32) -> String {
    use fhex::ToHex;
    if v.is_nan() {
        let payload = v.to_bits() & 0x7f_ffff;
        let sign = if v.is_sign_negative() { "-" } else { "" };
        format!("{sign}nan:{payload:#x}")
    } else if v.is_infinite() {
        if v < 0.0 { "-inf".to_string() } else { "inf".to_string() }
    } else {
        v.to_hex()
    }
}

/// Renders an f64 constant as a WAT literal (hex float, `inf`, or `nan:0x…`).
pub(crate) fn f64_literal(v: f64) -> String {
    use fhex::ToHex;
    if v.is_nan() {
        let payload = v.to_bits() & 0xf_ffff_ffff_ffff;
        let sign = if v.is_sign_negative() { "-" } else { "" };
        format!("{sign}nan:{payload:#x}")
    } else if v.is_infinite() {
        if v < 0.0 { "-inf".to_string() } else { "inf".to_string() }
    } else {
        v.to_hex()
    }
}

impl fmt::Display for Instruction {
    /// Formats the instruction head in WAT spelling: mnemonic plus
    /// immediates. Nested bodies of `block`/`loop`/`if` are not rendered
    /// here; layout (indentation, `else`, `end`) is the text encoder's job.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        write!(f, "{}", self.mnemonic())?;

        if let Some(memarg) = self.memarg() {
            if memarg.memory != 0 {
                write!(f, " {}", memarg.memory)?;
            }
            return write!(f, " offset={} align={}", memarg.offset, 1u64 << memarg.align);
        }

        match self {
            Block { block_type, .. } | Loop { block_type, .. } | If { block_type, .. } => {
                write!(f, "{block_type}")
            }
            Br { label } | BrIf { label } | BrOnNull { label } | BrOnNonNull { label } => {
                write!(f, " {label}")
            }
            BrTable { labels, default } => {
                for label in labels {
                    write!(f, " {label}")?;
                }
                write!(f, " {default}")
            }
            Call { func } | ReturnCall { func } | RefFunc { func } => write!(f, " {func}"),
            CallIndirect { type_index, table } | ReturnCallIndirect { type_index, table } => {
                if *table != 0 {
                    write!(f, " {table}")?;
                }
                write!(f, " (type {type_index})")
            }
            RefNull { heap_type } => write!(f, " {heap_type}"),
            SelectTyped { types } => {
                write!(f, " (result")?;
                for vt in types {
                    write!(f, " {vt}")?;
                }
                write!(f, ")")
            }
            LocalGet { local } | LocalSet { local } | LocalTee { local } => write!(f, " {local}"),
            GlobalGet { global } | GlobalSet { global } => write!(f, " {global}"),
            TableGet { table } | TableSet { table } | TableGrow { table } | TableSize { table }
            | TableFill { table } => write!(f, " {table}"),
            TableInit { elem, table } => write!(f, " {table} {elem}"),
            ElemDrop { elem } => write!(f, " {elem}"),
            TableCopy { dst_table, src_table } => write!(f, " {dst_table} {src_table}"),
            MemoryInit { data } => write!(f, " {data}"),
            DataDrop { data } => write!(f, " {data}"),
            I32Const { value } => write!(f, " {value}"),
            I64Const { value } => write!(f, " {value}"),
            F32Const { value } => write!(f, " {}", f32_literal(*value)),
            F64Const { value } => write!(f, " {}", f64_literal(*value)),
            V128Const { value } => {
                write!(f, " i8x16")?;
                for byte in value {
                    write!(f, " {byte}")?;
                }
                Ok(())
            }
            StructNew { type_index }
            | StructNewDefault { type_index }
            | ArrayNew { type_index }
            | ArrayNewDefault { type_index }
            | ArrayGet { type_index }
            | ArrayGetS { type_index }
            | ArrayGetU { type_index }
            | ArraySet { type_index }
            | ArrayFill { type_index } => write!(f, " {type_index}"),
            StructGet { type_index, field }
            | StructGetS { type_index, field }
            | StructGetU { type_index, field }
            | StructSet { type_index, field } => write!(f, " {type_index} {field}"),
            ArrayNewFixed { type_index, len } => write!(f, " {type_index} {len}"),
            ArrayNewData { type_index, data } | ArrayInitData { type_index, data } => {
                write!(f, " {type_index} {data}")
            }
            ArrayNewElem { type_index, elem } | ArrayInitElem { type_index, elem } => {
                write!(f, " {type_index} {elem}")
            }
            ArrayCopy {
                dst_type_index,
                src_type_index,
            } => write!(f, " {dst_type_index} {src_type_index}"),
            RefTest { ref_type } | RefCast { ref_type } => write!(f, " {}", ref_type_form(ref_type)),
            BrOnCast {
                label,
                from_type,
                to_type,
            }
            | BrOnCastFail {
                label,
                from_type,
                to_type,
            } => write!(
                f,
                " {label} {} {}",
                ref_type_form(from_type),
                ref_type_form(to_type)
            ),
            // Instructions with no immediates
            _ => Ok(()),
        }
    }
}

/// The explicit `(ref …)` spelling required where the grammar wants a
/// reference type operand rather than a value type.
fn ref_type_form(rt: &RefType) -> String {
    if rt.nullable {
        format!("(ref null {})", rt.heap_type)
    } else {
        format!("(ref {})", rt.heap_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_plain_and_indexed() {
        assert_eq!(Instruction::I32Add.to_string(), "i32.add");
        assert_eq!(Instruction::LocalGet { local: 2 }.to_string(), "local.get 2");
        assert_eq!(Instruction::Call { func: 7 }.to_string(), "call 7");
        assert_eq!(
            Instruction::ReturnCall { func: 1 }.to_string(),
            "return_call 1"
        );
        assert_eq!(
            Instruction::CallIndirect {
                type_index: 3,
                table: 0
            }
            .to_string(),
            "call_indirect (type 3)"
        );
        assert_eq!(
            Instruction::CallIndirect {
                type_index: 3,
                table: 1
            }
            .to_string(),
            "call_indirect 1 (type 3)"
        );
    }

    #[test]
    fn display_memarg() {
        assert_eq!(
            Instruction::I32Load {
                memarg: MemArg::new(2, 8)
            }
            .to_string(),
            "i32.load offset=8 align=4"
        );
        assert_eq!(
            Instruction::I32AtomicRmwAdd {
                memarg: MemArg::new(2, 0)
            }
            .to_string(),
            "i32.atomic.rmw.add offset=0 align=4"
        );
    }

    #[test]
    fn display_br_table() {
        let instr = Instruction::BrTable {
            labels: vec![0, 1, 2],
            default: 0,
        };
        assert_eq!(instr.to_string(), "br_table 0 1 2 0");
    }

    #[test]
    fn display_gc() {
        assert_eq!(
            Instruction::StructGet {
                type_index: 0,
                field: 1
            }
            .to_string(),
            "struct.get 0 1"
        );
        assert_eq!(
            Instruction::RefTest {
                ref_type: RefType::new(true, HeapType::Index(2))
            }
            .to_string(),
            "ref.test (ref null 2)"
        );
        assert_eq!(
            Instruction::BrOnCast {
                label: 0,
                from_type: RefType::new(true, HeapType::Any),
                to_type: RefType::new(false, HeapType::Index(1)),
            }
            .to_string(),
            "br_on_cast 0 (ref null any) (ref 1)"
        );
        assert_eq!(Instruction::RefI31.to_string(), "ref.i31");
    }

    #[test]
    fn display_ref_null_heap_types() {
        assert_eq!(
            Instruction::RefNull {
                heap_type: HeapType::Func
            }
            .to_string(),
            "ref.null func"
        );
        assert_eq!(
            Instruction::RefNull {
                heap_type: HeapType::Index(4)
            }
            .to_string(),
            "ref.null 4"
        );
    }

    #[test]
    fn display_floats() {
        assert_eq!(f32_literal(f32::INFINITY), "inf");
        assert_eq!(f64_literal(f64::NEG_INFINITY), "-inf");
        assert_eq!(f32_literal(f32::NAN), format!("nan:{:#x}", f32::NAN.to_bits() & 0x7f_ffff));
        // Finite values render as hex floats.
        let rendered = f32_literal(1.5);
        assert!(rendered.starts_with("0x"), "got {rendered}");
    }

    #[test]
    fn display_select() {
        assert_eq!(Instruction::Select.to_string(), "select");
        assert_eq!(
            Instruction::SelectTyped {
                types: vec![ValueType::I32]
            }
            .to_string(),
            "select (result i32)"
        );
    }
}

