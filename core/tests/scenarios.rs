//! End-to-end launch-site rewriting scenarios, one per testable property in
//! the module driver's governing design: a host module built straight from
//! source text, a device kernel declaring the parameter shape under test,
//! and an assertion on the printed, re-parseable result.

use launchpatch_core::{rewrite_module, RewriteError};
use launchpatch_ir::write::write_module;
use launchpatch_ir::{Function, InstructionData, Module, Signature, Type};
use launchpatch_reader::parse_module;

fn parse(text: &str) -> Module {
    parse_module(text).unwrap_or_else(|e| panic!("fixture failed to parse: {e}"))
}

/// A minimal defined device kernel with the given parameter types, none
/// marked by-value.
fn device_with_params(name: &str, params: Vec<Type>) -> Module {
    let mut device = Module::new();
    let sig = Signature::new(params, None);
    let mut f = Function::new(name, sig);
    let block = f.create_block();
    let ret = f.dfg.make_inst(InstructionData::Ret { value: None });
    f.layout.append_inst(ret, block);
    device.functions.push(f);
    device
}

fn assert_ordered(haystack: &str, needles: &[&str]) {
    let mut from = 0;
    for needle in needles {
        let at = haystack[from..]
            .find(needle)
            .unwrap_or_else(|| panic!("expected to find {needle:?} after byte {from} in:\n{haystack}"));
        from += at + needle.len();
    }
}

#[test]
fn s1_int32_and_float_marshal_in_order() {
    let mut host = parse(
        r#"
        declare void @kernel_setup_argument(i8*, i32)
        declare void @kernel_launch(i8*)
        declare void @f()

        define void @main() {
        block0:
            %slot0 = alloca i32
            %p0 = bitcast i32* %slot0 to i8*
            %sz0 = iconst i32 4
            call void @kernel_setup_argument(%p0, %sz0)
            %slot1 = alloca f32
            %p1 = bitcast f32* %slot1 to i8*
            %sz1 = iconst i32 4
            call void @kernel_setup_argument(%p1, %sz1)
            %fa = func_addr @f
            %fb = bitcast void* %fa to i8*
            call void @kernel_launch(%fb)
            ret void
        }
        "#,
    );
    let device = device_with_params("f", vec![Type::i32(), Type::Float32]);

    rewrite_module(&mut host, &device, "device ir text").expect("rewrite succeeds");
    let printed = write_module(&host);

    assert_ordered(
        &printed,
        &[
            "call void @configure_kernel(",
            "call void @set_kernel_arg_int32(",
            "call void @set_kernel_arg_float(",
            "call void @kernel_go()",
        ],
    );
    assert_eq!(printed.matches("iconst i32 0").count(), 3);
    parse_module(&printed).expect("rewritten module re-parses");
}

#[test]
fn s2_pointer_to_float_emits_gpu_buffer() {
    let mut host = parse(
        r#"
        declare void @kernel_setup_argument(i8*, i32)
        declare void @kernel_launch(i8*)
        declare void @f()

        define void @main() {
        block0:
            %slot = alloca f32*
            %p = bitcast f32** %slot to i8*
            %sz = iconst i32 8
            call void @kernel_setup_argument(%p, %sz)
            %fa = func_addr @f
            %fb = bitcast void* %fa to i8*
            call void @kernel_launch(%fb)
            ret void
        }
        "#,
    );
    let device = device_with_params("f", vec![Type::pointer_to(Type::Float32)]);

    rewrite_module(&mut host, &device, "device ir text").expect("rewrite succeeds");
    let printed = write_module(&host);

    assert_eq!(printed.matches("call void @set_kernel_arg_gpu_buffer(").count(), 1);
    assert!(printed.contains("iconst i32 4"), "element size should be f32's 4 bytes:\n{printed}");
    parse_module(&printed).expect("rewritten module re-parses");
}

#[test]
fn s3_pointer_to_struct_without_inner_pointers_is_one_buffer_call() {
    let mut host = parse(
        r#"
        type struct0 = { i32, f32 }

        declare void @kernel_setup_argument(i8*, i32)
        declare void @kernel_launch(i8*)
        declare void @f()

        define void @main() {
        block0:
            %slot = alloca struct0*
            %p = bitcast struct0** %slot to i8*
            %sz = iconst i32 8
            call void @kernel_setup_argument(%p, %sz)
            %fa = func_addr @f
            %fb = bitcast void* %fa to i8*
            call void @kernel_launch(%fb)
            ret void
        }
        "#,
    );
    let device = device_with_params("f", vec![Type::i32()]);

    rewrite_module(&mut host, &device, "device ir text").expect("rewrite succeeds");
    let printed = write_module(&host);

    assert_eq!(printed.matches("call void @set_kernel_arg_gpu_buffer(").count(), 1);
    assert!(printed.contains("iconst i32 8"), "element size should be the struct's 8 bytes:\n{printed}");
    parse_module(&printed).expect("rewritten module re-parses");
}

#[test]
fn s4_byvalue_struct_with_inner_pointer_clones_and_splits() {
    let mut host = parse(
        r#"
        type struct0 = { i32, f32* }

        declare void @kernel_setup_argument(i8*, i32)
        declare void @kernel_launch(i8*)
        declare void @f()

        define void @main() {
        block0:
            %slot = alloca struct0
            %p = bitcast struct0* %slot to i8*
            %sz = iconst i32 12
            call void @kernel_setup_argument(%p, %sz)
            %fa = func_addr @f
            %fb = bitcast void* %fa to i8*
            call void @kernel_launch(%fb)
            ret void
        }
        "#,
    );

    let mut device = Module::new();
    let device_struct = device
        .structs
        .declare(None, vec![Type::i32(), Type::pointer_to(Type::Float32)]);
    let mut sig = Signature::new(vec![Type::pointer_to(Type::Struct(device_struct))], None);
    sig.by_val[0] = true;
    let mut f = Function::new("f", sig);
    let block = f.create_block();
    let ret = f.dfg.make_inst(InstructionData::Ret { value: None });
    f.layout.append_inst(ret, block);
    device.functions.push(f);

    rewrite_module(&mut host, &device, "device ir text").expect("rewrite succeeds");
    let printed = write_module(&host);

    assert_ordered(
        &printed,
        &[
            "alloca struct",
            "store i32",
            "call void @set_kernel_arg_hostside_buffer(",
            "gep struct0,",
            "load f32*,",
            "call void @set_kernel_arg_gpu_buffer(",
        ],
    );
    assert!(printed.contains("iconst i32 12"), "twin buffer size should match the original's 12 bytes:\n{printed}");
    assert!(printed.contains("iconst i32 4"), "forwarded pointer's element size should be f32's 4 bytes:\n{printed}");
    parse_module(&printed).expect("rewritten module re-parses");
}

#[test]
fn s5_byvalue_vector_is_one_hostside_buffer() {
    let mut host = parse(
        r#"
        declare void @kernel_setup_argument(i8*, i32)
        declare void @kernel_launch(i8*)
        declare void @f()

        define void @main() {
        block0:
            %slot = alloca f32x4
            %p = bitcast f32x4* %slot to i8*
            %sz = iconst i32 16
            call void @kernel_setup_argument(%p, %sz)
            %fa = func_addr @f
            %fb = bitcast void* %fa to i8*
            call void @kernel_launch(%fb)
            ret void
        }
        "#,
    );
    let device = device_with_params("f", vec![Type::Vector(Box::new(Type::Float32), 4)]);

    rewrite_module(&mut host, &device, "device ir text").expect("rewrite succeeds");
    let printed = write_module(&host);

    assert_eq!(printed.matches("call void @set_kernel_arg_hostside_buffer(").count(), 1);
    assert!(printed.contains("iconst i32 16"), "vector buffer size should be 4 x f32 = 16 bytes:\n{printed}");
    parse_module(&printed).expect("rewritten module re-parses");
}

#[test]
fn s6_double_parameter_is_rejected() {
    let mut host = parse(
        r#"
        declare void @kernel_setup_argument(i8*, i32)
        declare void @kernel_launch(i8*)
        declare void @f()

        define void @main() {
        block0:
            %slot = alloca f64
            %p = bitcast f64* %slot to i8*
            %sz = iconst i32 8
            call void @kernel_setup_argument(%p, %sz)
            %fa = func_addr @f
            %fb = bitcast void* %fa to i8*
            call void @kernel_launch(%fb)
            ret void
        }
        "#,
    );
    let device = device_with_params("f", vec![Type::Float64]);

    let err = rewrite_module(&mut host, &device, "device ir text").unwrap_err();
    assert!(matches!(err, RewriteError::DoubleNotSupported { .. }));
}

#[test]
fn unknown_kernel_target_is_reported() {
    let mut host = parse(
        r#"
        declare void @kernel_setup_argument(i8*, i32)
        declare void @kernel_launch(i8*)
        declare void @missing()

        define void @main() {
        block0:
            %fa = func_addr @missing
            %fb = bitcast void* %fa to i8*
            call void @kernel_launch(%fb)
            ret void
        }
        "#,
    );
    let device = Module::new();

    let err = rewrite_module(&mut host, &device, "device ir text").unwrap_err();
    assert!(matches!(err, RewriteError::UnknownKernel { .. }));
}

#[test]
fn invoke_style_launch_preserves_normal_successor_edge() {
    let mut host = parse(
        r#"
        declare void @kernel_setup_argument(i8*, i32)
        declare i32 @kernel_launch(i8*)
        declare void @f()

        define void @main() {
        block0:
            %fa = func_addr @f
            %fb = bitcast void* %fa to i8*
            %r = invoke to block1 unwind block2 i32 @kernel_launch(%fb)
        block1:
            ret void
        block2:
            unreachable
        }
        "#,
    );
    let device = device_with_params("f", vec![]);

    rewrite_module(&mut host, &device, "device ir text").expect("rewrite succeeds");
    let printed = write_module(&host);

    assert!(printed.contains("iconst i32 0"));
    assert!(printed.contains("br block1"));
    parse_module(&printed).expect("rewritten module re-parses");
}
