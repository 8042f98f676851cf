use hyc::compiler::{self, Backend, Options};
use hyc::error::SourceMetadata;
use hyc::grammar::lexer::Framing;
use std::error::Error;
use structopt::StructOpt;

fn main() {
    if let Err(ref e) = run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    use std::fs;

    let opt = Opt::from_args();
    let file = fs::read_to_string(&opt.file)?;
    let meta = SourceMetadata::new(&file).with_file(opt.file.clone());

    let options = Options {
        backend: opt.emit,
        framing: if opt.offside {
            Framing::Offside
        } else {
            Framing::Braces
        },
        fold: !opt.no_fold,
        dump_tokens: opt.dump_tokens,
        dump_ast: opt.dump_ast,
    };

    let output = compiler::compile(&meta, &options)?;

    let out_file = opt.output.unwrap_or_else(|| match options.backend {
        Backend::AArch64 => std::path::PathBuf::from("out.s"),
        Backend::Llvm => opt.file.with_extension("ll"),
    });
    fs::write(out_file, output)?;

    Ok(())
}

#[derive(Debug, StructOpt)]
#[structopt(name = "hyc", about = "Ahead-of-time compiler for HyLang")]
struct Opt {
    /// The file to compile
    #[structopt(parse(from_os_str))]
    file: std::path::PathBuf,
    /// The output file (defaults to `out.s`, or the input with an `.ll`
    /// extension for the LLVM back end)
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    output: Option<std::path::PathBuf>,
    /// Which back end to run: 'asm' (AArch64) or 'llvm'
    #[structopt(long = "emit", default_value = "asm")]
    emit: Backend,
    /// Lex the input with indentation framing instead of braces
    #[structopt(long)]
    offside: bool,
    /// Skip the constant folder
    #[structopt(long = "no-fold")]
    no_fold: bool,
    /// Print the token stream to stdout
    #[structopt(long = "dump-tokens")]
    dump_tokens: bool,
    /// Print the parsed AST to stdout
    #[structopt(long = "dump-ast")]
    dump_ast: bool,
}
