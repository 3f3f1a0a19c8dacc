use crate::config::{CompilerConfig, ControlFlow};
use crate::lexer::Lexer;
use crate::object::{self, ObjectFormat};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pl0c")]
#[command(about = "A single-pass PL/0 compiler")]
#[command(version)]
pub struct Cli {
    /// Maximum level of diagnostics written to stderr
    #[arg(long, global = true, default_value_t = tracing::Level::WARN)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a source file into an object file
    Compile {
        /// Source file to compile
        input: PathBuf,

        /// Object file to write (defaults to the input with an .obj extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Object format (guessed from the output extension when omitted)
        #[arg(long, value_enum)]
        format: Option<ObjectFormat>,

        /// Evaluate `if`/`while` conditions without emitting jumps
        #[arg(long)]
        unguarded_control_flow: bool,

        #[arg(long, default_value_t = 100)]
        symbol_capacity: usize,

        #[arg(long, default_value_t = 500)]
        code_capacity: usize,

        /// Also print the instruction listing to stdout
        #[arg(long)]
        listing: bool,
    },
    /// Print the token stream of a source file
    Tokens {
        input: PathBuf,
    },
    /// Print the listing of an object file
    List {
        object: PathBuf,

        /// Object format (guessed from the extension when omitted)
        #[arg(long, value_enum)]
        format: Option<ObjectFormat>,
    },
}

pub struct CliHandler;

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, cli: Cli) -> Result<()> {
        match cli.command {
            Commands::Compile {
                input,
                output,
                format,
                unguarded_control_flow,
                symbol_capacity,
                code_capacity,
                listing,
            } => {
                let control_flow = if unguarded_control_flow {
                    ControlFlow::Unguarded
                } else {
                    ControlFlow::Jumps
                };
                let config = CompilerConfig::new()
                    .with_symbol_capacity(symbol_capacity)
                    .with_code_capacity(code_capacity)
                    .with_control_flow(control_flow);
                let output = output.unwrap_or_else(|| default_output(&input));
                let format = format.unwrap_or_else(|| ObjectFormat::from_path(&output));

                let listing_text = self.compile_file(&input, &output, format, &config)?;
                if listing {
                    print!("{}", listing_text);
                }
                Ok(())
            }
            Commands::Tokens { input } => {
                for line in self.token_lines(&input)? {
                    println!("{}", line);
                }
                Ok(())
            }
            Commands::List { object, format } => {
                let format = format.unwrap_or_else(|| ObjectFormat::from_path(&object));
                let program = object::read_object_file(&object, format)
                    .with_context(|| format!("Failed to read object file {}", object.display()))?;
                print!("{}", program.listing());
                Ok(())
            }
        }
    }

    /// Compile `input` and write the object file. Nothing is written unless
    /// compilation succeeds. Returns the listing of the emitted program.
    pub fn compile_file(
        &self,
        input: &Path,
        output: &Path,
        format: ObjectFormat,
        config: &CompilerConfig,
    ) -> Result<String> {
        let source = fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?;

        tracing::debug!(input = %input.display(), "compiling");
        let compilation = match crate::compile(&source, config) {
            Ok(compilation) => compilation,
            Err(e) => {
                tracing::debug!(index = e.index(), "compilation failed");
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to compile {}", input.display())));
            }
        };

        object::write_object_file(&compilation.program, format, output)
            .with_context(|| format!("Failed to write {}", output.display()))?;

        tracing::debug!(
            output = %output.display(),
            instructions = compilation.program.len(),
            "object file written"
        );
        Ok(compilation.program.listing())
    }

    /// One display line per token, including the trailing end-of-input token.
    pub fn token_lines(&self, input: &Path) -> Result<Vec<String>> {
        let source = fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?;

        let tokens = Lexer::new(&source)
            .tokenize()
            .with_context(|| format!("Failed to tokenize {}", input.display()))?;
        Ok(tokens.iter().map(ToString::to_string).collect())
    }
}

impl Default for CliHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("obj")
}
