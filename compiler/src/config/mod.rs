//! Compiler configuration options

/// How `if` and `while` are lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlFlow {
    /// Guard bodies with `JPC`/`JMP` and patch the targets.
    #[default]
    Jumps,
    /// Compile the condition but emit no jumps, so bodies always run.
    Unguarded,
}

/// Configuration options for a single compilation
#[derive(Clone, Debug)]
pub struct CompilerConfig {
    pub symbol_capacity: usize,
    pub code_capacity: usize,
    pub frame_header: i32,
    pub control_flow: ControlFlow,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            symbol_capacity: 100,
            code_capacity: 500,
            frame_header: 4,
            control_flow: ControlFlow::Jumps,
        }
    }
}

impl CompilerConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of symbol table entries
    pub fn with_symbol_capacity(mut self, capacity: usize) -> Self {
        self.symbol_capacity = capacity;
        self
    }

    /// Set the maximum number of emitted instructions
    pub fn with_code_capacity(mut self, capacity: usize) -> Self {
        self.code_capacity = capacity;
        self
    }

    /// Set the number of words reserved at the start of every frame
    pub fn with_frame_header(mut self, words: i32) -> Self {
        self.frame_header = words;
        self
    }

    pub fn with_control_flow(mut self, control_flow: ControlFlow) -> Self {
        self.control_flow = control_flow;
        self
    }
}
