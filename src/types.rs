//! The WebAssembly type model: value types, reference and heap types,
//! composite (function/struct/array) types with GC subtyping, limits, and
//! the memory/table/global type constructors.
//!
//! Every type knows how to emit its binary form (into a byte buffer) and its
//! text form (via [`std::fmt::Display`], producing WAT spellings).

use std::fmt;

use crate::encoding::{self, REF_NON_NULL, REF_NULL, TYPE_ARRAY, TYPE_FUNC, TYPE_STRUCT};

// ===========================================================================
// Heap and reference types
// ===========================================================================

/// The referent kind of a reference value.
///
/// Abstract heap types encode as single-byte s33 codes shared with their
/// shorthand value types; concrete types are indices into the type section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapType {
    Func,
    Extern,
    Any,
    Eq,
    I31,
    Struct,
    Array,
    None,
    NoExtern,
    NoFunc,
    /// A concrete type, by index into the module's type space.
    Index(u32),
}

impl HeapType {
    /// The s33 code for this heap type (negative for abstract types,
    /// the index itself for concrete types).
    pub(crate) fn code(&self) -> i64 {
        match self {
            HeapType::Func => -0x10,
            HeapType::Extern => -0x11,
            HeapType::Any => -0x12,
            HeapType::Eq => -0x13,
            HeapType::I31 => -0x14,
            HeapType::Struct => -0x15,
            HeapType::Array => -0x16,
            HeapType::None => -0x0f,
            HeapType::NoExtern => -0x0e,
            HeapType::NoFunc => -0x0d,
            HeapType::Index(idx) => *idx as i64,
        }
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        encoding::write_vs33(buf, self.code());
    }
}

impl fmt::Display for HeapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapType::Func => write!(f, "func"),
            HeapType::Extern => write!(f, "extern"),
            HeapType::Any => write!(f, "any"),
            HeapType::Eq => write!(f, "eq"),
            HeapType::I31 => write!(f, "i31"),
            HeapType::Struct => write!(f, "struct"),
            HeapType::Array => write!(f, "array"),
            HeapType::None => write!(f, "none"),
            HeapType::NoExtern => write!(f, "noextern"),
            HeapType::NoFunc => write!(f, "nofunc"),
            HeapType::Index(idx) => write!(f, "{idx}"),
        }
    }
}

/// A typed reference: nullability plus a heap type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefType {
    pub nullable: bool,
    pub heap_type: HeapType,
}

impl RefType {
    pub fn new(nullable: bool, heap_type: HeapType) -> RefType {
        RefType { nullable, heap_type }
    }

    /// The `funcref` shorthand: a nullable reference to `func`.
    pub fn funcref() -> RefType {
        RefType::new(true, HeapType::Func)
    }

    /// The `externref` shorthand: a nullable reference to `extern`.
    pub fn externref() -> RefType {
        RefType::new(true, HeapType::Extern)
    }

    /// The WAT shorthand name for this reference type, if one exists.
    /// Only nullable references to abstract heap types have shorthands.
    pub(crate) fn shorthand(&self) -> Option<&'static str> {
        if !self.nullable {
            return None;
        }
        match self.heap_type {
            HeapType::Func => Some("funcref"),
            HeapType::Extern => Some("externref"),
            HeapType::Any => Some("anyref"),
            HeapType::Eq => Some("eqref"),
            HeapType::I31 => Some("i31ref"),
            HeapType::Struct => Some("structref"),
            HeapType::Array => Some("arrayref"),
            HeapType::None => Some("nullref"),
            HeapType::NoExtern => Some("nullexternref"),
            HeapType::NoFunc => Some("nullfuncref"),
            HeapType::Index(_) => None,
        }
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        // Nullable references to abstract heap types use the one-byte
        // shorthand form; everything else takes the two-part constructor.
        if self.nullable && !matches!(self.heap_type, HeapType::Index(_)) {
            self.heap_type.encode(buf);
        } else {
            buf.push(if self.nullable { REF_NULL } else { REF_NON_NULL });
            self.heap_type.encode(buf);
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shorthand() {
            Some(name) => write!(f, "{name}"),
            None if self.nullable => write!(f, "(ref null {})", self.heap_type),
            None => write!(f, "(ref {})", self.heap_type),
        }
    }
}

// ===========================================================================
// Value types
// ===========================================================================

/// A WebAssembly value type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueType {
    // Number types
    I32,
    I64,
    F32,
    F64,
    // Vector types
    V128,
    // Reference type shorthands
    FuncRef,
    ExternRef,
    // Typed references
    Ref(RefType),
}

impl ValueType {
    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            ValueType::I32 => buf.push(0x7f),
            ValueType::I64 => buf.push(0x7e),
            ValueType::F32 => buf.push(0x7d),
            ValueType::F64 => buf.push(0x7c),
            ValueType::V128 => buf.push(0x7b),
            ValueType::FuncRef => buf.push(0x70),
            ValueType::ExternRef => buf.push(0x6f),
            ValueType::Ref(rt) => rt.encode(buf),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::I32 => write!(f, "i32"),
            ValueType::I64 => write!(f, "i64"),
            ValueType::F32 => write!(f, "f32"),
            ValueType::F64 => write!(f, "f64"),
            ValueType::V128 => write!(f, "v128"),
            ValueType::FuncRef => write!(f, "funcref"),
            ValueType::ExternRef => write!(f, "externref"),
            ValueType::Ref(rt) => write!(f, "{rt}"),
        }
    }
}

// ===========================================================================
// Composite types (GC)
// ===========================================================================

/// A packed storage type, usable only in struct fields and array elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackedType {
    I8,
    I16,
}

impl fmt::Display for PackedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackedType::I8 => write!(f, "i8"),
            PackedType::I16 => write!(f, "i16"),
        }
    }
}

/// A field's storage: a full value type or a packed type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StorageType {
    Val(ValueType),
    Packed(PackedType),
}

impl StorageType {
    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            StorageType::Val(vt) => vt.encode(buf),
            StorageType::Packed(PackedType::I8) => buf.push(0x78),
            StorageType::Packed(PackedType::I16) => buf.push(0x77),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::Val(vt) => write!(f, "{vt}"),
            StorageType::Packed(pt) => write!(f, "{pt}"),
        }
    }
}

/// A (storage type, mutability) pair: one struct field or array element type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldType {
    pub storage: StorageType,
    pub mutable: bool,
}

impl FieldType {
    pub fn new(storage: StorageType, mutable: bool) -> FieldType {
        FieldType { storage, mutable }
    }

    /// An immutable or mutable field holding a full value type.
    pub fn val(value_type: ValueType, mutable: bool) -> FieldType {
        FieldType::new(StorageType::Val(value_type), mutable)
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        self.storage.encode(buf);
        encoding::write_vu1(buf, self.mutable);
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mutable {
            write!(f, "(mut {})", self.storage)
        } else {
            write!(f, "{}", self.storage)
        }
    }
}

/// A function signature: parameter types and result types, in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FuncType {
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

impl FuncType {
    pub fn new(params: Vec<ValueType>, results: Vec<ValueType>) -> FuncType {
        FuncType { params, results }
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(TYPE_FUNC);
        encoding::write_vu32(buf, self.params.len() as u32);
        for p in &self.params {
            p.encode(buf);
        }
        encoding::write_vu32(buf, self.results.len() as u32);
        for r in &self.results {
            r.encode(buf);
        }
    }
}

/// An ordered sequence of fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructType {
    pub fields: Vec<FieldType>,
}

impl StructType {
    pub fn new(fields: Vec<FieldType>) -> StructType {
        StructType { fields }
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(TYPE_STRUCT);
        encoding::write_vu32(buf, self.fields.len() as u32);
        for field in &self.fields {
            field.encode(buf);
        }
    }
}

/// A single element field type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrayType {
    pub field: FieldType,
}

impl ArrayType {
    pub fn new(field: FieldType) -> ArrayType {
        ArrayType { field }
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(TYPE_ARRAY);
        self.field.encode(buf);
    }
}

/// Function, struct, or array shape of a type definition.
#[derive(Debug, Clone, PartialEq)]
pub enum CompositeType {
    Func(FuncType),
    Struct(StructType),
    Array(ArrayType),
}

impl CompositeType {
    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            CompositeType::Func(ft) => ft.encode(buf),
            CompositeType::Struct(st) => st.encode(buf),
            CompositeType::Array(at) => at.encode(buf),
        }
    }
}

impl From<FuncType> for CompositeType {
    fn from(ft: FuncType) -> CompositeType {
        CompositeType::Func(ft)
    }
}

impl From<StructType> for CompositeType {
    fn from(st: StructType) -> CompositeType {
        CompositeType::Struct(st)
    }
}

impl From<ArrayType> for CompositeType {
    fn from(at: ArrayType) -> CompositeType {
        CompositeType::Array(at)
    }
}

/// A composite type together with its place in a subtype hierarchy.
///
/// A final subtype with no supertypes is the common case and encodes as the
/// bare composite form.
#[derive(Debug, Clone, PartialEq)]
pub struct SubType {
    pub is_final: bool,
    pub super_types: Vec<u32>,
    pub composite: CompositeType,
}

impl SubType {
    /// A final type with no supertypes.
    pub fn plain(composite: impl Into<CompositeType>) -> SubType {
        SubType {
            is_final: true,
            super_types: Vec::new(),
            composite: composite.into(),
        }
    }

    /// A type extending the given supertype, open for further subtyping.
    pub fn extending(super_type: u32, composite: impl Into<CompositeType>) -> SubType {
        SubType {
            is_final: false,
            super_types: vec![super_type],
            composite: composite.into(),
        }
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        if self.is_final && self.super_types.is_empty() {
            self.composite.encode(buf);
            return;
        }
        buf.push(if self.is_final {
            encoding::TYPE_SUB_FINAL
        } else {
            encoding::TYPE_SUB
        });
        encoding::write_vu32(buf, self.super_types.len() as u32);
        for st in &self.super_types {
            encoding::write_vu32(buf, *st);
        }
        self.composite.encode(buf);
    }
}

/// One entry of the type section: a single type or a recursion group.
///
/// The type index space counts every subtype inside every group, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeEntry {
    Single(SubType),
    Rec(Vec<SubType>),
}

impl TypeEntry {
    /// How many slots of the type index space this entry occupies.
    pub fn index_count(&self) -> u32 {
        match self {
            TypeEntry::Single(_) => 1,
            TypeEntry::Rec(members) => members.len() as u32,
        }
    }

    pub(crate) fn sub_types(&self) -> &[SubType] {
        match self {
            TypeEntry::Single(st) => std::slice::from_ref(st),
            TypeEntry::Rec(members) => members,
        }
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            TypeEntry::Single(st) => st.encode(buf),
            TypeEntry::Rec(members) => {
                buf.push(encoding::TYPE_REC);
                encoding::write_vu32(buf, members.len() as u32);
                for member in members {
                    member.encode(buf);
                }
            }
        }
    }
}

impl From<CompositeType> for TypeEntry {
    fn from(composite: CompositeType) -> TypeEntry {
        TypeEntry::Single(SubType::plain(composite))
    }
}

impl From<FuncType> for TypeEntry {
    fn from(ft: FuncType) -> TypeEntry {
        TypeEntry::Single(SubType::plain(ft))
    }
}

impl From<StructType> for TypeEntry {
    fn from(st: StructType) -> TypeEntry {
        TypeEntry::Single(SubType::plain(st))
    }
}

impl From<ArrayType> for TypeEntry {
    fn from(at: ArrayType) -> TypeEntry {
        TypeEntry::Single(SubType::plain(at))
    }
}

// ===========================================================================
// Limits and the memory/table/global type constructors
// ===========================================================================

/// Size bounds for memories and tables, in pages or elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
    /// Shared memories (threads proposal) require an explicit `max`.
    pub shared: bool,
}

impl Limits {
    pub fn at_least(min: u32) -> Limits {
        Limits {
            min,
            max: None,
            shared: false,
        }
    }

    pub fn bounded(min: u32, max: u32) -> Limits {
        Limits {
            min,
            max: Some(max),
            shared: false,
        }
    }

    pub fn shared(min: u32, max: u32) -> Limits {
        Limits {
            min,
            max: Some(max),
            shared: true,
        }
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        match (self.max, self.shared) {
            (Some(max), true) => {
                buf.push(encoding::LIMITS_SHARED_MIN_MAX);
                encoding::write_vu32(buf, self.min);
                encoding::write_vu32(buf, max);
            }
            (Some(max), false) => {
                buf.push(encoding::LIMITS_MIN_MAX);
                encoding::write_vu32(buf, self.min);
                encoding::write_vu32(buf, max);
            }
            (None, _) => {
                buf.push(encoding::LIMITS_MIN);
                encoding::write_vu32(buf, self.min);
            }
        }
    }
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.min)?;
        if let Some(max) = self.max {
            write!(f, " {max}")?;
        }
        if self.shared {
            write!(f, " shared")?;
        }
        Ok(())
    }
}

/// A memory type is just its limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    pub limits: Limits,
}

impl MemoryType {
    pub fn new(limits: Limits) -> MemoryType {
        MemoryType { limits }
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        self.limits.encode(buf);
    }
}

/// Element reference type plus limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableType {
    pub element: RefType,
    pub limits: Limits,
}

impl TableType {
    pub fn new(element: RefType, limits: Limits) -> TableType {
        TableType { element, limits }
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        self.element.encode(buf);
        self.limits.encode(buf);
    }
}

/// Value type plus mutability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalType {
    pub value_type: ValueType,
    pub mutable: bool,
}

impl GlobalType {
    pub fn new(value_type: ValueType, mutable: bool) -> GlobalType {
        GlobalType { value_type, mutable }
    }

    pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
        self.value_type.encode(buf);
        encoding::write_vu1(buf, self.mutable);
    }
}

impl fmt::Display for GlobalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mutable {
            write!(f, "(mut {})", self.value_type)
        } else {
            write!(f, "{}", self.value_type)
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
