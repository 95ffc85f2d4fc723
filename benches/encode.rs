use criterion::{Criterion, black_box, criterion_group, criterion_main};
use wasmith::instruction::{BlockType, Instruction, MemArg};
use wasmith::module::{
    CodeSection, Export, ExportDesc, ExportSection, Func, FunctionSection, MemorySection, Module,
    ModuleBuilder, Section, TypeSection,
};
use wasmith::types::{FuncType, Limits, MemoryType, ValueType};
use wasmith::{encoder, text};

/// Builds a module with `n` exported functions, each mixing arithmetic,
/// control flow, and memory traffic, to exercise the full emit path.
fn synthetic_module(n: u32) -> Module {
    let ty = FuncType::new(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32]);
    let mut funcs = Vec::new();
    let mut exports = Vec::new();
    for i in 0..n {
        funcs.push(Func::new(
            vec![(2, ValueType::I32)],
            vec![
                Instruction::LocalGet { local: 0 },
                Instruction::LocalGet { local: 1 },
                Instruction::I32Add,
                Instruction::LocalSet { local: 2 },
                Instruction::Block {
                    block_type: BlockType::Value(ValueType::I32),
                    body: vec![
                        Instruction::LocalGet { local: 2 },
                        Instruction::If {
                            block_type: BlockType::Value(ValueType::I32),
                            then_body: vec![
                                Instruction::LocalGet { local: 2 },
                                Instruction::I32Load {
                                    memarg: MemArg::new(2, 0),
                                },
                            ],
                            else_body: Some(vec![Instruction::I32Const { value: -1 }]),
                        },
                    ],
                },
            ],
        ));
        exports.push(Export::new(format!("f{i}"), ExportDesc::Func(i)));
    }
    ModuleBuilder::new()
        .section(Section::Type(TypeSection::new(vec![ty.into()])))
        .section(Section::Function(FunctionSection {
            type_indices: vec![0; n as usize],
        }))
        .section(Section::Memory(MemorySection {
            memories: vec![MemoryType::new(Limits::at_least(1))],
        }))
        .section(Section::Export(ExportSection { exports }))
        .section(Section::Code(CodeSection { funcs }))
        .finish()
}

fn bench_binary(c: &mut Criterion) {
    let module = synthetic_module(500);
    c.bench_function("encode_binary_500_funcs", |b| {
        b.iter(|| encoder::encode(black_box(&module)).unwrap())
    });
}

fn bench_text(c: &mut Criterion) {
    let module = synthetic_module(500);
    c.bench_function("encode_text_500_funcs", |b| {
        b.iter(|| text::encode_text(black_box(&module)).unwrap())
    });
}

criterion_group!(benches, bench_binary, bench_text);
criterion_main!(benches);
