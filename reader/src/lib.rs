//! A parser for the textual dialect `launchpatch_ir::write` emits.
//!
//! Mirrors the role `cranelift-reader` plays for `.clif` text: a small,
//! self-contained recursive-descent parser with its own lexer and error
//! type, used by the driver to read both the host module and the device
//! module back into [`launchpatch_ir::Module`] values, and by tests to
//! build fixtures without hand-assembling IR through the builder API.

pub mod error;
mod lexer;
mod parser;

pub use error::{Location, ParseError, ParseResult};

use launchpatch_ir::Module;

/// Parse a complete module from its textual form.
pub fn parse_module(source: &str) -> ParseResult<Module> {
    parser::Parser::new(source)?.parse_module()
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpatch_ir::write::write_module;

    #[test]
    fn parses_a_minimal_function() {
        let text = "\
define void @main() {
block0:
    ret void
}
";
        let module = parse_module(text).expect("parse");
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.functions[0].name, "main");
    }

    #[test]
    fn round_trips_struct_global_and_declare() {
        let text = "\
type struct0 = struct.float4 { f32, f32, f32, f32 }
global @src = \"kernel source\\n\"
declare i32 @cudaLaunch(i8*)
define i32 @host(i32 %p0) {
block0:
    %v1 = iconst i32 1
    %v2 = global_addr @src
    %v3 = call i32 @cudaLaunch(%v2)
    ret i32 %v3
}
";
        let module = parse_module(text).expect("parse");
        assert_eq!(module.find_func("cudaLaunch").is_some(), true);
        assert_eq!(module.find_global("src").is_some(), true);
        let printed = write_module(&module);
        let reparsed = parse_module(&printed).expect("reparse");
        assert_eq!(write_module(&reparsed), printed);
    }

    #[test]
    fn rejects_use_before_definition() {
        let text = "\
define void @main() {
block0:
    store i32 %v0, i32* %v1
    ret void
}
";
        assert!(parse_module(text).is_err());
    }

    #[test]
    fn parses_forward_branch_and_invoke() {
        let text = "\
declare i32 @kernel_launch(i8*)
define void @main() {
block0:
    br block1
block1:
    %v0 = iconst i8 0
    %v1 = bitcast i8 %v0 to i8*
    %v2 = invoke to block1 unwind block2 i32 @kernel_launch(%v1)
    ret void
block2:
    unreachable
}
";
        let module = parse_module(text).expect("parse");
        assert_eq!(module.functions[0].layout.blocks().count(), 3);
    }
}
