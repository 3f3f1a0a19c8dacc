use crate::codegen::{CodeBuffer, CodegenError, Instruction, Operation, Program, SysCall};
use crate::config::{CompilerConfig, ControlFlow};
use crate::lexer::{LexerError, Token, TokenKind, TokenSource};
use crate::symbols::{Symbol, SymbolError, SymbolKind, SymbolTable};
use std::fmt;

/// Result of a successful compilation.
#[derive(Debug)]
pub struct Compilation {
    pub program: Program,
    pub symbols: SymbolTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Declaration {
    Constant,
    Variable,
}

/// Single-pass recognizer and code generator.
///
/// The parser owns the whole compilation context: the lookahead token and its
/// 1-based index, the symbol table, the code buffer and the running frame
/// size. Every grammar routine recognizes its construct and emits code for it
/// in the same step; there is no syntax tree.
pub struct Parser<S: TokenSource> {
    source: S,
    current: Token,
    index: usize,
    symbols: SymbolTable,
    code: CodeBuffer,
    frame_header: i32,
    frame_size: i32,
    control_flow: ControlFlow,
}

impl<S: TokenSource> Parser<S> {
    /// Prime the lookahead with the first token of `source`.
    pub fn new(mut source: S, config: &CompilerConfig) -> Result<Self, CompileError> {
        let current = source
            .next_token()
            .map_err(|source| CompileError::Lexical { index: 1, source })?;

        Ok(Self {
            source,
            current,
            index: 1,
            symbols: SymbolTable::with_capacity(config.symbol_capacity),
            code: CodeBuffer::with_capacity(config.code_capacity),
            frame_header: config.frame_header,
            frame_size: config.frame_header,
            control_flow: config.control_flow,
        })
    }

    /// program = block "." .
    pub fn parse(mut self) -> Result<Compilation, CompileError> {
        self.block()?;
        self.consume(TokenKind::Period)?;
        self.emit(Instruction::system(SysCall::Halt))?;

        if self.current.kind != TokenKind::Null {
            return Err(self.unexpected(TokenKind::Null));
        }

        let program = self.code.finalize();
        tracing::debug!(
            instructions = program.len(),
            symbols = self.symbols.len(),
            "compilation finished"
        );

        Ok(Compilation {
            program,
            symbols: self.symbols,
        })
    }

    /// block = constDecl varDecl statement { ";" statement } .
    ///
    /// The frame reservation is emitted first and patched with the final
    /// frame size once every declaration has been read.
    fn block(&mut self) -> Result<(), CompileError> {
        self.frame_size = self.frame_header;
        let reserve = self.emit(Instruction::reserve(self.frame_size))?;

        self.const_declarations()?;
        self.var_declarations()?;
        self.patch(reserve, self.frame_size)?;

        self.statement()?;
        while self.current.kind == TokenKind::Semicolon {
            self.consume(TokenKind::Semicolon)?;
            self.statement()?;
        }
        Ok(())
    }

    /// constDecl = [ "const" ident "=" number { "," ident "=" number } ";" ] .
    fn const_declarations(&mut self) -> Result<(), CompileError> {
        if self.current.kind != TokenKind::Const {
            return Ok(());
        }
        self.consume(TokenKind::Const)?;
        self.declare_identifier(Declaration::Constant)?;
        while self.current.kind == TokenKind::Comma {
            self.consume(TokenKind::Comma)?;
            self.declare_identifier(Declaration::Constant)?;
        }
        self.consume(TokenKind::Semicolon)?;
        Ok(())
    }

    /// varDecl = [ "var" ident { "," ident } ";" ] .
    fn var_declarations(&mut self) -> Result<(), CompileError> {
        if self.current.kind != TokenKind::Var {
            return Ok(());
        }
        self.consume(TokenKind::Var)?;
        self.declare_identifier(Declaration::Variable)?;
        while self.current.kind == TokenKind::Comma {
            self.consume(TokenKind::Comma)?;
            self.declare_identifier(Declaration::Variable)?;
        }
        self.consume(TokenKind::Semicolon)?;
        Ok(())
    }

    fn declare_identifier(&mut self, declaration: Declaration) -> Result<(), CompileError> {
        let index = self.index;
        let name = self.identifier()?;
        self.symbols
            .check_available(&name)
            .map_err(|err| self.symbol_error(err, index))?;

        self.consume(TokenKind::Identifier)?;
        let symbol = match declaration {
            Declaration::Constant => {
                self.consume(TokenKind::Equal)?;
                let value = self.number()?;
                Symbol::constant(name, value)
            }
            Declaration::Variable => {
                let offset = self.frame_size;
                self.frame_size = offset.checked_add(1).ok_or(CompileError::CapacityExceeded {
                    index,
                    resource: Resource::Frame,
                    limit: i32::MAX as usize,
                })?;
                Symbol::variable(name, 0, offset)
            }
        };

        tracing::debug!(name = %symbol.name, kind = %symbol.kind, "declared");
        self.symbols
            .declare(symbol)
            .map_err(|err| self.symbol_error(err, index))
    }

    /// statement = [ ident ":=" expression
    ///             | "begin" statement { ";" statement } "end"
    ///             | "if" condition "then" statement [ "else" statement ]
    ///             | "while" condition "do" statement
    ///             | "read" ident
    ///             | "write" expression ] .
    fn statement(&mut self) -> Result<(), CompileError> {
        match self.current.kind {
            TokenKind::Identifier => self.assignment(),
            TokenKind::Begin => self.compound(),
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Read => self.read_statement(),
            TokenKind::Write => self.write_statement(),
            _ => Ok(()),
        }
    }

    fn assignment(&mut self) -> Result<(), CompileError> {
        let index = self.index;
        let name = self.identifier()?;
        self.consume(TokenKind::Identifier)?;
        self.consume(TokenKind::Becomes)?;
        self.expression()?;

        let (level, offset) = self.resolve_store_target(&name, index)?;
        self.emit(Instruction::store(level, offset))?;
        Ok(())
    }

    fn compound(&mut self) -> Result<(), CompileError> {
        self.consume(TokenKind::Begin)?;
        self.statement()?;
        while self.current.kind == TokenKind::Semicolon {
            self.consume(TokenKind::Semicolon)?;
            self.statement()?;
        }
        self.consume(TokenKind::End)?;
        Ok(())
    }

    fn if_statement(&mut self) -> Result<(), CompileError> {
        self.consume(TokenKind::If)?;
        self.condition()?;
        let skip_then = self.forward_jump(Instruction::jump_if_false(0))?;
        self.consume(TokenKind::Then)?;
        self.statement()?;

        if self.current.kind == TokenKind::Else {
            let skip_else = self.forward_jump(Instruction::jump(0))?;
            self.land(skip_then)?;
            self.consume(TokenKind::Else)?;
            self.statement()?;
            self.land(skip_else)
        } else {
            self.land(skip_then)
        }
    }

    fn while_statement(&mut self) -> Result<(), CompileError> {
        let loop_start = self.current_address()?;
        self.consume(TokenKind::While)?;
        self.condition()?;
        let exit = self.forward_jump(Instruction::jump_if_false(0))?;
        self.consume(TokenKind::Do)?;
        self.statement()?;

        if self.control_flow == ControlFlow::Jumps {
            self.emit(Instruction::jump(loop_start))?;
        }
        self.land(exit)
    }

    fn read_statement(&mut self) -> Result<(), CompileError> {
        self.consume(TokenKind::Read)?;
        let index = self.index;
        let name = self.identifier()?;
        self.consume(TokenKind::Identifier)?;
        self.emit(Instruction::system(SysCall::Read))?;

        let (level, offset) = self.resolve_store_target(&name, index)?;
        self.emit(Instruction::store(level, offset))?;
        Ok(())
    }

    fn write_statement(&mut self) -> Result<(), CompileError> {
        self.consume(TokenKind::Write)?;
        self.expression()?;
        self.emit(Instruction::system(SysCall::Write))?;
        Ok(())
    }

    /// condition = "odd" expression | expression relop expression .
    fn condition(&mut self) -> Result<(), CompileError> {
        if self.current.kind == TokenKind::Odd {
            self.consume(TokenKind::Odd)?;
            self.expression()?;
            self.emit(Instruction::operation(Operation::Odd))?;
            return Ok(());
        }

        self.expression()?;
        let relation = self.current.kind;
        let operation = match relation {
            TokenKind::Equal => Operation::Eql,
            TokenKind::NotEqual => Operation::Neq,
            TokenKind::Less => Operation::Lss,
            TokenKind::LessEqual => Operation::Leq,
            TokenKind::Greater => Operation::Gtr,
            TokenKind::GreaterEqual => Operation::Geq,
            _ => return Err(self.unexpected(TokenKind::Equal)),
        };
        self.consume(relation)?;
        self.expression()?;
        self.emit(Instruction::operation(operation))?;
        Ok(())
    }

    /// expression = [ "+" | "-" ] term { ( "+" | "-" ) term } .
    fn expression(&mut self) -> Result<(), CompileError> {
        let negate = match self.current.kind {
            TokenKind::Plus => {
                self.consume(TokenKind::Plus)?;
                false
            }
            TokenKind::Minus => {
                self.consume(TokenKind::Minus)?;
                true
            }
            _ => false,
        };

        self.term()?;
        if negate {
            self.emit(Instruction::operation(Operation::Neg))?;
        }

        while matches!(self.current.kind, TokenKind::Plus | TokenKind::Minus) {
            let operator = self.current.kind;
            self.consume(operator)?;
            self.term()?;
            let operation = if operator == TokenKind::Plus {
                Operation::Add
            } else {
                Operation::Sub
            };
            self.emit(Instruction::operation(operation))?;
        }
        Ok(())
    }

    /// term = factor { ( "*" | "/" ) factor } .
    fn term(&mut self) -> Result<(), CompileError> {
        self.factor()?;

        while matches!(self.current.kind, TokenKind::Multiply | TokenKind::Slash) {
            let operator = self.current.kind;
            self.consume(operator)?;
            self.factor()?;
            let operation = if operator == TokenKind::Multiply {
                Operation::Mul
            } else {
                Operation::Div
            };
            self.emit(Instruction::operation(operation))?;
        }
        Ok(())
    }

    /// factor = ident | number | "(" expression ")" .
    fn factor(&mut self) -> Result<(), CompileError> {
        match self.current.kind {
            TokenKind::Identifier => {
                let index = self.index;
                let name = self.identifier()?;
                self.resolve_and_load(&name, index)?;
                self.consume(TokenKind::Identifier)?;
            }
            TokenKind::Number => {
                let value = self.number()?;
                self.emit(Instruction::literal(value))?;
            }
            _ => {
                self.consume(TokenKind::LeftParen)?;
                self.expression()?;
                self.consume(TokenKind::RightParen)?;
            }
        }
        Ok(())
    }

    fn resolve(&self, name: &str, index: usize) -> Result<SymbolKind, CompileError> {
        self.symbols
            .lookup(name)
            .map(|symbol| symbol.kind)
            .ok_or_else(|| CompileError::UndeclaredIdentifier {
                index,
                name: name.to_string(),
            })
    }

    fn resolve_and_load(&mut self, name: &str, index: usize) -> Result<(), CompileError> {
        let instruction = match self.resolve(name, index)? {
            SymbolKind::Constant { value } => Instruction::literal(value),
            // One flat scope, so the level distance is the declared level.
            SymbolKind::Variable { level, offset } => Instruction::load(level, offset),
        };
        self.emit(instruction)?;
        Ok(())
    }

    fn resolve_store_target(&self, name: &str, index: usize) -> Result<(u16, i32), CompileError> {
        match self.resolve(name, index)? {
            SymbolKind::Constant { .. } => Err(CompileError::ConstantMutation {
                index,
                name: name.to_string(),
            }),
            SymbolKind::Variable { level, offset } => Ok((level, offset)),
        }
    }

    /// Emit a jump whose target is filled in later by `land`. Nothing is
    /// emitted when bodies run unguarded.
    fn forward_jump(&mut self, jump: Instruction) -> Result<Option<usize>, CompileError> {
        match self.control_flow {
            ControlFlow::Jumps => self.emit(jump).map(Some),
            ControlFlow::Unguarded => Ok(None),
        }
    }

    /// Point a pending forward jump at the next instruction to be emitted.
    fn land(&mut self, jump: Option<usize>) -> Result<(), CompileError> {
        match jump {
            Some(address) => {
                let target = self.current_address()?;
                self.patch(address, target)
            }
            None => Ok(()),
        }
    }

    fn current_address(&self) -> Result<i32, CompileError> {
        i32::try_from(self.code.next_address()).map_err(|_| CompileError::CapacityExceeded {
            index: self.index,
            resource: Resource::CodeBuffer,
            limit: self.code.capacity(),
        })
    }

    fn emit(&mut self, instruction: Instruction) -> Result<usize, CompileError> {
        self.code
            .emit(instruction)
            .map_err(|err| self.codegen_error(err))
    }

    fn patch(&mut self, address: usize, modifier: i32) -> Result<(), CompileError> {
        self.code
            .patch(address, modifier)
            .map_err(|err| self.codegen_error(err))
    }

    /// Check the lookahead and pull the next token from the source.
    /// Returns the token that was consumed.
    fn consume(&mut self, expected: TokenKind) -> Result<Token, CompileError> {
        if self.current.kind != expected {
            return Err(self.unexpected(expected));
        }

        let next = self
            .source
            .next_token()
            .map_err(|source| CompileError::Lexical {
                index: self.index + 1,
                source,
            })?;
        self.index += 1;
        Ok(std::mem::replace(&mut self.current, next))
    }

    /// Name of the lookahead identifier, without consuming it.
    fn identifier(&self) -> Result<String, CompileError> {
        match (self.current.kind, self.current.lexeme()) {
            (TokenKind::Identifier, Some(name)) => Ok(name.to_string()),
            _ => Err(self.unexpected(TokenKind::Identifier)),
        }
    }

    fn number(&mut self) -> Result<i32, CompileError> {
        let token = self.consume(TokenKind::Number)?;
        // Number tokens are only built through `Token::number`.
        Ok(token.value().unwrap_or_default())
    }

    fn unexpected(&self, expected: TokenKind) -> CompileError {
        CompileError::UnexpectedToken {
            index: self.index,
            expected,
            found: self.current.kind,
        }
    }

    fn symbol_error(&self, error: SymbolError, index: usize) -> CompileError {
        match error {
            SymbolError::Duplicate(name) => CompileError::DuplicateIdentifier { index, name },
            SymbolError::Full(limit) => CompileError::CapacityExceeded {
                index,
                resource: Resource::SymbolTable,
                limit,
            },
        }
    }

    fn codegen_error(&self, error: CodegenError) -> CompileError {
        match error {
            CodegenError::Full(limit) => CompileError::CapacityExceeded {
                index: self.index,
                resource: Resource::CodeBuffer,
                limit,
            },
            other => CompileError::Internal {
                index: self.index,
                source: other,
            },
        }
    }
}

/// Bounded storage that can run out during compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    SymbolTable,
    CodeBuffer,
    Frame,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::SymbolTable => write!(f, "symbol table"),
            Resource::CodeBuffer => write!(f, "code buffer"),
            Resource::Frame => write!(f, "frame"),
        }
    }
}

/// Every compilation failure is fatal and names the 1-based index of the
/// token being looked at when it happened.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("token {index}: {source}")]
    Lexical { index: usize, source: LexerError },

    #[error("token {index}: expected {expected}, found {found}")]
    UnexpectedToken {
        index: usize,
        expected: TokenKind,
        found: TokenKind,
    },

    #[error("token {index}: identifier '{name}' is already declared")]
    DuplicateIdentifier { index: usize, name: String },

    #[error("token {index}: identifier '{name}' is not declared")]
    UndeclaredIdentifier { index: usize, name: String },

    #[error("token {index}: cannot assign to constant '{name}'")]
    ConstantMutation { index: usize, name: String },

    #[error("token {index}: {resource} capacity of {limit} exceeded")]
    CapacityExceeded {
        index: usize,
        resource: Resource,
        limit: usize,
    },

    #[error("token {index}: internal code generation error: {source}")]
    Internal { index: usize, source: CodegenError },
}

impl CompileError {
    pub fn index(&self) -> usize {
        match self {
            CompileError::Lexical { index, .. }
            | CompileError::UnexpectedToken { index, .. }
            | CompileError::DuplicateIdentifier { index, .. }
            | CompileError::UndeclaredIdentifier { index, .. }
            | CompileError::ConstantMutation { index, .. }
            | CompileError::CapacityExceeded { index, .. }
            | CompileError::Internal { index, .. } => *index,
        }
    }
}
