use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Constant { value: i32 },
    Variable { level: u16, offset: i32 },
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Constant { value } => write!(f, "const = {}", value),
            SymbolKind::Variable { level, offset } => write!(f, "var @ {}:{}", level, offset),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn constant(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Constant { value },
        }
    }

    pub fn variable(name: impl Into<String>, level: u16, offset: i32) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Variable { level, offset },
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, SymbolKind::Constant { .. })
    }
}

/// Flat, bounded symbol table. Entries stay in declaration order.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    capacity: usize,
}

impl SymbolTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            symbols: Vec::new(),
            capacity,
        }
    }

    /// Fails if `name` is taken or no entry is left for it.
    pub fn check_available(&self, name: &str) -> Result<(), SymbolError> {
        if self.contains(name) {
            return Err(SymbolError::Duplicate(name.to_string()));
        }
        if self.symbols.len() >= self.capacity {
            return Err(SymbolError::Full(self.capacity));
        }
        Ok(())
    }

    pub fn declare(&mut self, symbol: Symbol) -> Result<(), SymbolError> {
        self.check_available(&symbol.name)?;
        self.symbols.push(symbol);
        Ok(())
    }

    /// Most recent entry with this name.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().rev().find(|symbol| symbol.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SymbolError {
    #[error("Identifier '{0}' is already declared")]
    Duplicate(String),

    #[error("Symbol table is full ({0} entries)")]
    Full(usize),
}
