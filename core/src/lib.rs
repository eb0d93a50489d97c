//! `launchpatch-core`: rewrites a host module's legacy
//! `kernel_setup_argument`/`kernel_launch` call sequences into the runtime's
//! `configure_kernel`/`set_kernel_arg_*`/`kernel_go` calling convention.
//!
//! This crate operates purely on already-parsed [`launchpatch_ir::Module`]
//! values; reading and writing IR text is the front end's job (see the
//! `launchpatch-cli` crate).

pub mod classify;
pub mod cloner;
pub mod error;
pub mod layout;
pub mod marshal;
pub mod rewrite;

pub use cloner::StructCloner;
pub use error::RewriteError;

use launchpatch_ir::verifier::verify_module;
use launchpatch_ir::{Function, Module, Signature};

const DEVICE_IR_GLOBAL_NAME: &str = "device_ir_source";

/// Rewrite every function in `host` against `device`'s kernel declarations,
/// embedding `device_ir_text` as a single shared module-level constant
/// (spec §4.5 step 4), then verify the result.
///
/// `device_ir_text` is the device module's own printed (or otherwise
/// serialized) form; this crate treats it as an opaque string to embed, not
/// something it parses or interprets.
pub fn rewrite_module(
    host: &mut Module,
    device: &Module,
    device_ir_text: &str,
) -> Result<(), RewriteError> {
    let device_ir_global = host.declare_global(DEVICE_IR_GLOBAL_NAME, device_ir_text.to_string());

    let mut cloner = StructCloner::new();
    let count = host.functions.len();
    for i in 0..count {
        let mut func = std::mem::replace(
            &mut host.functions[i],
            Function::new("", Signature::default()),
        );
        let result = rewrite::rewrite_function(&mut func, host, device, &mut cloner, device_ir_global);
        host.functions[i] = func;
        result?;
    }

    let errors = verify_module(host);
    if !errors.is_ok() {
        return Err(RewriteError::VerificationFailure(errors.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpatch_reader::parse_module;

    fn parse(text: &str) -> Module {
        parse_module(text).expect("fixture parses")
    }

    #[test]
    fn module_with_no_launch_calls_is_left_verifiable() {
        let mut host = parse(
            r#"
            define void @main() {
            block0:
                ret void
            }
            "#,
        );
        let device = parse("");
        rewrite_module(&mut host, &device, "device ir text").expect("rewrite succeeds");
    }

    #[test]
    fn unknown_kernel_is_reported() {
        let mut host = parse(
            r#"
            declare void @kernel_setup_argument(i8*, i32)
            declare void @kernel_launch(i8*)
            declare void @missing_kernel()

            define void @main() {
            block0:
                %slot = alloca i32
                %p = bitcast i32* %slot to i8*
                %sz = iconst i32 4
                call void @kernel_setup_argument(%p, %sz)
                %name = func_addr @missing_kernel
                %nb = bitcast void* %name to i8*
                call void @kernel_launch(%nb)
                ret void
            }
            "#,
        );
        let device = parse("");
        let err = rewrite_module(&mut host, &device, "device ir text").unwrap_err();
        assert!(matches!(err, RewriteError::UnknownKernel { .. }));
    }
}
