//! Text encoder tests: full renderings for small modules and targeted
//! assertions for individual forms.

use wasmith::instruction::{BlockType, Instruction, MemArg};
use wasmith::module::{
    CodeSection, Data, DataSection, Element, ElementSection, Export, ExportDesc, ExportSection,
    Func, FunctionSection, Global, GlobalSection, Import, ImportDesc, ImportSection,
    MemorySection, Module, ModuleBuilder, Section, TableSection, TypeSection,
};
use wasmith::text::encode_text;
use wasmith::types::{
    FieldType, FuncType, GlobalType, HeapType, Limits, MemoryType, RefType, StructType, SubType,
    TableType, TypeEntry, ValueType,
};

fn module_with(sections: Vec<Section>) -> Module {
    let mut builder = ModuleBuilder::new();
    for section in sections {
        builder = builder.section(section);
    }
    builder.finish()
}

#[test]
fn empty_module() {
    assert_eq!(encode_text(&Module::new()).unwrap(), "(module\n)");
}

#[test]
fn add_function_module() {
    let add = FuncType::new(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32]);
    let module = module_with(vec![
        Section::Type(TypeSection::new(vec![add.into()])),
        Section::Function(FunctionSection {
            type_indices: vec![0],
        }),
        Section::Export(ExportSection {
            exports: vec![Export::new("add", ExportDesc::Func(0))],
        }),
        Section::Code(CodeSection {
            funcs: vec![Func::new(
                vec![],
                vec![
                    Instruction::LocalGet { local: 0 },
                    Instruction::LocalGet { local: 1 },
                    Instruction::I32Add,
                ],
            )],
        }),
    ]);
    let expected = "\
(module
  (type (func (param i32) (param i32) (result i32)))
  (func (export \"add\") (type 0)
    local.get 0
    local.get 1
    i32.add
  )
)";
    assert_eq!(encode_text(&module).unwrap(), expected);
}

#[test]
fn if_else_blocks_render_flat_with_indentation() {
    let ty = FuncType::new(vec![ValueType::I32], vec![ValueType::I32]);
    let module = module_with(vec![
        Section::Type(TypeSection::new(vec![ty.into()])),
        Section::Function(FunctionSection {
            type_indices: vec![0],
        }),
        Section::Code(CodeSection {
            funcs: vec![Func::new(
                vec![],
                vec![
                    Instruction::LocalGet { local: 0 },
                    Instruction::If {
                        block_type: BlockType::Value(ValueType::I32),
                        then_body: vec![Instruction::I32Const { value: 1 }],
                        else_body: Some(vec![Instruction::I32Const { value: 0 }]),
                    },
                ],
            )],
        }),
    ]);
    let expected = "\
(module
  (type (func (param i32) (result i32)))
  (func (type 0)
    local.get 0
    if (result i32)
      i32.const 1
    else
      i32.const 0
    end
  )
)";
    assert_eq!(encode_text(&module).unwrap(), expected);
}

#[test]
fn locals_render_per_run() {
    let module = module_with(vec![
        Section::Type(TypeSection::new(vec![FuncType::default().into()])),
        Section::Function(FunctionSection {
            type_indices: vec![0],
        }),
        Section::Code(CodeSection {
            funcs: vec![Func::new(
                vec![(2, ValueType::I32), (1, ValueType::F64)],
                vec![],
            )],
        }),
    ]);
    let wat = encode_text(&module).unwrap();
    assert!(wat.contains("    (local i32 i32)\n"), "{wat}");
    assert!(wat.contains("    (local f64)\n"), "{wat}");
}

#[test]
fn gc_struct_type_and_accessors() {
    let point = StructType::new(vec![
        FieldType::val(ValueType::I32, false),
        FieldType::val(ValueType::I32, true),
    ]);
    let getter = FuncType::new(vec![], vec![ValueType::I32]);
    let module = module_with(vec![
        Section::Type(TypeSection::new(vec![point.into(), getter.into()])),
        Section::Function(FunctionSection {
            type_indices: vec![1],
        }),
        Section::Code(CodeSection {
            funcs: vec![Func::new(
                vec![],
                vec![
                    Instruction::I32Const { value: 1 },
                    Instruction::I32Const { value: 2 },
                    Instruction::StructNew { type_index: 0 },
                    Instruction::StructGet {
                        type_index: 0,
                        field: 1,
                    },
                ],
            )],
        }),
    ]);
    let wat = encode_text(&module).unwrap();
    assert!(
        wat.contains("(type (struct (field i32) (field (mut i32))))"),
        "{wat}"
    );
    assert!(wat.contains("struct.new 0\n"), "{wat}");
    assert!(wat.contains("struct.get 0 1\n"), "{wat}");
}

#[test]
fn rec_group_and_subtypes() {
    let base = StructType::new(vec![FieldType::val(ValueType::I32, false)]);
    let extended = StructType::new(vec![
        FieldType::val(ValueType::I32, false),
        FieldType::val(ValueType::F64, false),
    ]);
    let module = module_with(vec![Section::Type(TypeSection::new(vec![TypeEntry::Rec(
        vec![
            SubType {
                is_final: false,
                super_types: vec![],
                composite: base.into(),
            },
            SubType::extending(0, extended),
        ],
    )]))]);
    let expected = "\
(module
  (rec
    (type (sub (struct (field i32))))
    (type (sub 0 (struct (field i32) (field f64))))
  )
)";
    assert_eq!(encode_text(&module).unwrap(), expected);
}

#[test]
fn shared_memory_and_atomics() {
    let ty = FuncType::new(vec![], vec![ValueType::I32]);
    let module = module_with(vec![
        Section::Type(TypeSection::new(vec![ty.into()])),
        Section::Function(FunctionSection {
            type_indices: vec![0],
        }),
        Section::Memory(MemorySection {
            memories: vec![MemoryType::new(Limits::shared(1, 1))],
        }),
        Section::Code(CodeSection {
            funcs: vec![Func::new(
                vec![],
                vec![
                    Instruction::I32Const { value: 0 },
                    Instruction::I32Const { value: 1 },
                    Instruction::I32AtomicRmwAdd {
                        memarg: MemArg::new(2, 0),
                    },
                ],
            )],
        }),
    ]);
    let wat = encode_text(&module).unwrap();
    assert!(wat.contains("(memory 1 1 shared)"), "{wat}");
    assert!(wat.contains("i32.atomic.rmw.add offset=0 align=4\n"), "{wat}");
}

#[test]
fn imports_and_free_standing_exports() {
    let log = FuncType::new(vec![ValueType::I32], vec![]);
    let module = module_with(vec![
        Section::Type(TypeSection::new(vec![log.into()])),
        Section::Import(ImportSection {
            imports: vec![Import {
                module: "env".to_string(),
                name: "log".to_string(),
                desc: ImportDesc::Func { type_index: 0 },
            }],
        }),
        Section::Export(ExportSection {
            exports: vec![Export::new("log", ExportDesc::Func(0))],
        }),
    ]);
    let expected = "\
(module
  (type (func (param i32)))
  (import \"env\" \"log\" (func (type 0)))
  (export \"log\" (func 0))
)";
    assert_eq!(encode_text(&module).unwrap(), expected);
}

#[test]
fn globals_with_inline_export() {
    let module = module_with(vec![
        Section::Global(GlobalSection {
            globals: vec![Global::new(
                GlobalType::new(ValueType::I32, true),
                vec![Instruction::I32Const { value: 42 }],
            )],
        }),
        Section::Export(ExportSection {
            exports: vec![Export::new("counter", ExportDesc::Global(0))],
        }),
    ]);
    let wat = encode_text(&module).unwrap();
    assert!(
        wat.contains("(global (export \"counter\") (mut i32) i32.const 42)"),
        "{wat}"
    );
}

#[test]
fn element_and_data_segments() {
    let ty = FuncType::default();
    let module = module_with(vec![
        Section::Type(TypeSection::new(vec![ty.into()])),
        Section::Function(FunctionSection {
            type_indices: vec![0],
        }),
        Section::Table(TableSection {
            tables: vec![TableType::new(RefType::funcref(), Limits::at_least(1))],
        }),
        Section::Memory(MemorySection {
            memories: vec![MemoryType::new(Limits::at_least(1))],
        }),
        Section::Element(ElementSection {
            elements: vec![Element::active_functions(
                0,
                vec![Instruction::I32Const { value: 0 }],
                vec![0],
            )],
        }),
        Section::Code(CodeSection {
            funcs: vec![Func::new(vec![], vec![])],
        }),
        Section::Data(DataSection {
            segments: vec![Data::active(
                0,
                vec![Instruction::I32Const { value: 0 }],
                vec![b'h', b'i', 0x00],
            )],
        }),
    ]);
    let wat = encode_text(&module).unwrap();
    assert!(
        wat.contains("(elem (table 0) (offset i32.const 0) func 0)"),
        "{wat}"
    );
    assert!(
        wat.contains("(data (memory 0) (offset i32.const 0) \"hi\\00\")"),
        "{wat}"
    );
}

#[test]
fn reference_instructions_render() {
    let ty = FuncType::new(vec![], vec![ValueType::FuncRef]);
    let module = module_with(vec![
        Section::Type(TypeSection::new(vec![ty.into()])),
        Section::Function(FunctionSection {
            type_indices: vec![0],
        }),
        Section::Code(CodeSection {
            funcs: vec![Func::new(
                vec![],
                vec![
                    Instruction::RefNull {
                        heap_type: HeapType::Func,
                    },
                    Instruction::RefNull {
                        heap_type: HeapType::Func,
                    },
                    Instruction::I32Const { value: 1 },
                    Instruction::SelectTyped {
                        types: vec![ValueType::FuncRef],
                    },
                ],
            )],
        }),
    ]);
    let wat = encode_text(&module).unwrap();
    assert!(wat.contains("ref.null func\n"), "{wat}");
    assert!(wat.contains("select (result funcref)\n"), "{wat}");
}

#[test]
fn tail_calls_render() {
    let ty = FuncType::new(vec![ValueType::I32], vec![ValueType::I32]);
    let module = module_with(vec![
        Section::Type(TypeSection::new(vec![ty.into()])),
        Section::Function(FunctionSection {
            type_indices: vec![0, 0],
        }),
        Section::Code(CodeSection {
            funcs: vec![
                Func::new(
                    vec![],
                    vec![
                        Instruction::LocalGet { local: 0 },
                        Instruction::ReturnCall { func: 1 },
                    ],
                ),
                Func::new(vec![], vec![Instruction::LocalGet { local: 0 }]),
            ],
        }),
    ]);
    let wat = encode_text(&module).unwrap();
    assert!(wat.contains("return_call 1\n"), "{wat}");
}

#[test]
fn encoding_is_deterministic() {
    let module = module_with(vec![
        Section::Type(TypeSection::new(vec![FuncType::default().into()])),
        Section::Function(FunctionSection {
            type_indices: vec![0],
        }),
        Section::Code(CodeSection {
            funcs: vec![Func::new(vec![], vec![Instruction::Nop])],
        }),
    ]);
    assert_eq!(encode_text(&module).unwrap(), encode_text(&module).unwrap());
}

#[test]
fn same_error_surface_as_binary_encoder() {
    let module = module_with(vec![Section::Export(ExportSection {
        exports: vec![Export::new("f", ExportDesc::Func(0))],
    })]);
    assert!(encode_text(&module).is_err());
}
