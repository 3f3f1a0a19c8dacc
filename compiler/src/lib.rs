pub mod cli;
pub mod codegen;
pub mod config;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod symbols;

pub use codegen::{Instruction, OpCode, Program};
pub use config::{CompilerConfig, ControlFlow};
pub use lexer::{Lexer, Token, TokenKind, TokenSource};
pub use object::{read_program, write_program, ObjectError, ObjectFormat};
pub use parser::{CompileError, Compilation, Parser};
pub use symbols::{Symbol, SymbolKind, SymbolTable};

/// Compile PL/0 source text into a stack machine program.
pub fn compile(source: &str, config: &CompilerConfig) -> Result<Compilation, CompileError> {
    Parser::new(Lexer::new(source), config)?.parse()
}
