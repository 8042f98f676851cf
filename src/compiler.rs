//! Pipeline orchestration: source text through lexing, parsing, semantic
//! analysis, optional constant folding and exactly one back end. Each pass
//! consumes the previous pass's output; the first diagnostic aborts the
//! compile.

use crate::asmgen;
use crate::ast::Program;
use crate::error::SourceMetadata;
use crate::fold;
use crate::grammar::lexer::{self, Framing};
use crate::grammar::{ParseError, Parser};
use crate::llvmgen;
use crate::semantic::{self, SemanticError};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    AArch64,
    Llvm,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asm" | "aarch64" => Ok(Self::AArch64),
            "llvm" | "ir" => Ok(Self::Llvm),
            other => Err(format!(
                "unknown backend '{}' (expected 'asm' or 'llvm')",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub backend: Backend,
    pub framing: Framing,
    /// Run the constant folder between the analyser and the back end.
    pub fold: bool,
    pub dump_tokens: bool,
    pub dump_ast: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            backend: Backend::AArch64,
            framing: Framing::Braces,
            fold: true,
            dump_tokens: false,
            dump_ast: false,
        }
    }
}

/// One error type per pipeline stage; the `Display` prefixes are part of
/// the CLI contract (`Error:` for lex/parse/codegen, `Semantic Error:` for
/// the analyser).
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Error: {0}")]
    Parse(#[from] ParseError),
    #[error("Semantic Error: {0}")]
    Semantic(#[from] SemanticError),
    #[error("Error: {0}")]
    Codegen(#[from] asmgen::CodegenError),
    #[error("Error: {0}")]
    Llvm(#[from] llvmgen::LlvmError),
}

/// Run the whole pipeline over one compilation unit, returning the chosen
/// back end's textual output.
pub fn compile(meta: &SourceMetadata, options: &Options) -> Result<String, CompileError> {
    if options.dump_tokens {
        let tokens = lexer::tokenize(meta, options.framing)
            .map_err(|e| e.map_kind(crate::grammar::ParseErrorKind::Lex))?;
        for token in &tokens {
            println!("{:?}", token);
        }
    }

    let mut parser = Parser::new(meta, options.framing)?;
    let program: Program = parser.parse()?;
    if options.dump_ast {
        println!("{:#?}", program);
    }

    semantic::check(&program, meta)?;

    let program = if options.fold {
        fold::fold_program(program)
    } else {
        program
    };

    match options.backend {
        Backend::AArch64 => Ok(asmgen::generate_program(&program, meta)?.to_string()),
        Backend::Llvm => Ok(llvmgen::generate_program(&program, meta)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn asm_options() -> Options {
        Options::default()
    }

    fn llvm_options() -> Options {
        Options {
            backend: Backend::Llvm,
            ..Options::default()
        }
    }

    fn compile_text(source: &str, options: &Options) -> String {
        let meta = SourceMetadata::new(source);
        compile(&meta, options).expect("expected the compile to succeed")
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!("asm".parse(), Ok(Backend::AArch64));
        assert_eq!("llvm".parse(), Ok(Backend::Llvm));
        assert!("wasm".parse::<Backend>().is_err());
    }

    #[test]
    fn scenario_constant_fold_through_both_backends() {
        let asm = compile_text("int main(){ return 2+3*4; }", &asm_options());
        assert!(asm.contains("mov x0, #14"));
        let ir = compile_text("int main(){ return 2+3*4; }", &llvm_options());
        assert!(ir.contains("ret i32 14"));
    }

    #[test]
    fn scenario_while_loop_compiles_in_both_backends() {
        let source = "int main(){ int x=5; int y=0; while(x>0){ y=y+x; x=x-1; } return y; }";
        let asm = compile_text(source, &asm_options());
        assert!(asm.contains(".L0:"));
        assert!(asm.contains(".L1:"));
        let ir = compile_text(source, &llvm_options());
        assert!(ir.contains("br label %L0"));
    }

    #[test]
    fn scenario_array_sum() {
        let source = "int main(){ int a[3]; a[0]=10; a[1]=20; a[2]=a[0]+a[1]; return a[2]; }";
        let asm = compile_text(source, &asm_options());
        assert!(asm.contains("sub sp, sp, #48"));
        let ir = compile_text(source, &llvm_options());
        assert!(ir.contains("alloca i32, i32 3"));
    }

    #[test]
    fn scenario_call() {
        let source = "int add(int a,int b){ return a+b; } int main(){ return add(7,35); }";
        let asm = compile_text(source, &asm_options());
        assert!(asm.contains("bl  _add"));
        let ir = compile_text(source, &llvm_options());
        assert!(ir.contains("call i32 @add(i32 7, i32 35)"));
    }

    #[test]
    fn scenario_pointer_write() {
        let source = "int main(){ int x=1; int* p=&x; *p=99; return x; }";
        let asm = compile_text(source, &asm_options());
        assert!(asm.contains("str x1, [x0]"));
        let ir = compile_text(source, &llvm_options());
        assert!(ir.contains("store i32 99"));
    }

    #[test]
    fn scenario_folded_condition() {
        let source = "int main(){ if(!(1==2) && (3<4)) { return 1; } return 0; }";
        let asm = compile_text(source, &asm_options());
        // the condition collapsed to `true`
        assert!(asm.contains("mov x0, #1"));
        let ir = compile_text(source, &llvm_options());
        assert!(ir.contains("br i1 1, label"));
    }

    #[test]
    fn folding_can_be_disabled() {
        let options = Options {
            fold: false,
            ..Options::default()
        };
        let asm = compile_text("int main(){ return 2+3*4; }", &options);
        assert!(asm.contains("mov x0, #3"));
        assert!(asm.contains("mul x0, x0, x1"));
    }

    #[test]
    fn offside_sources_compile() {
        let options = Options {
            framing: Framing::Offside,
            ..Options::default()
        };
        let source = "int main():\n    int x = 40\n    return x + 2\n";
        let asm = compile_text(source, &options);
        assert!(asm.contains("_main:"));
        assert!(asm.contains("mov x0, #40"));
    }

    #[test]
    fn diagnostics_carry_their_prefix() {
        let meta = SourceMetadata::new("int main() { return $; }");
        let err = compile(&meta, &asm_options()).unwrap_err();
        assert!(err.to_string().starts_with("Error: "));

        let meta = SourceMetadata::new("int main() { return true; }");
        let err = compile(&meta, &asm_options()).unwrap_err();
        assert!(err.to_string().starts_with("Semantic Error: "));
    }

    #[test]
    fn parse_errors_stop_the_pipeline_with_a_location() {
        let meta = SourceMetadata::new("int main() { return 1 }");
        let err = compile(&meta, &asm_options()).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("1:23"));
    }

    #[test]
    fn compiles_are_deterministic() {
        let source = "int main(){ int a[2]; a[0]=1; a[1]=2; return a[0]+a[1]; }";
        assert_eq!(
            compile_text(source, &asm_options()),
            compile_text(source, &asm_options())
        );
        assert_eq!(
            compile_text(source, &llvm_options()),
            compile_text(source, &llvm_options())
        );
    }
}
