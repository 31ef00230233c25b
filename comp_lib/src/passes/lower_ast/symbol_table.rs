use llvm_ir::{Type, ValueId};
use std::fmt::Write;

/// What a name stands for.
///
/// Global and static arrays carry `frozen`: their literal initializer, kept
/// only when nothing in the program ever writes to the array, so that the
/// constant evaluator may fold indexed reads.
#[derive(Debug, Clone)]
pub enum SymbolKind {
    IntVar,
    IntArray { len: i32, frozen: Option<Vec<i32>> },
    ConstInt { value: i32 },
    ConstIntArray { values: Vec<i32> },
    StaticInt,
    StaticIntArray { len: i32, frozen: Option<Vec<i32>> },
    IntFunc { params: Vec<Type> },
    VoidFunc { params: Vec<Type> },
}

impl SymbolKind {
    pub fn is_const(&self) -> bool {
        matches!(self, Self::ConstInt { .. } | Self::ConstIntArray { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Self::IntFunc { .. } | Self::VoidFunc { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Self::IntArray { .. } | Self::ConstIntArray { .. } | Self::StaticIntArray { .. }
        )
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::IntVar => "int",
            Self::IntArray { .. } => "int[]",
            Self::ConstInt { .. } => "const int",
            Self::ConstIntArray { .. } => "const int[]",
            Self::StaticInt => "static int",
            Self::StaticIntArray { .. } => "static int[]",
            Self::IntFunc { .. } => "int()",
            Self::VoidFunc { .. } => "void()",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    /// Line of the declaration.
    pub line: u32,
    /// The IR value backing the symbol: an `Alloca`, `GlobalVariable`,
    /// `Argument`, `Function`, or a constant for `const int`.
    pub value: ValueId,
    pub kind: SymbolKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    /// Insertion-ordered.
    symbols: Vec<Symbol>,
}

/// The lexically scoped symbol table.
///
/// Scopes form a tree built as the visitor descends; popping a scope returns
/// to its parent but keeps the child linked under it, so the whole tree can
/// be enumerated afterwards (depth-first, symbols in insertion order).
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope { parent: None, children: Vec::new(), symbols: Vec::new() }],
            current: ScopeId(0),
        }
    }

    pub fn is_global_scope(&self) -> bool {
        self.current == ScopeId(0)
    }

    pub fn push_scope(&mut self) {
        let child = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(self.current),
            children: Vec::new(),
            symbols: Vec::new(),
        });
        self.scopes[self.current.0].children.push(child);
        self.current = child;
    }

    pub fn pop_scope(&mut self) {
        self.current = self.scopes[self.current.0]
            .parent
            .expect("cannot pop the root scope");
    }

    /// Local lookup only; drives redefinition diagnostics.
    pub fn exists_in_scope(&self, name: &str) -> bool {
        self.scopes[self.current.0]
            .symbols
            .iter()
            .any(|symbol| symbol.name == name)
    }

    /// Adds a symbol to the current scope. On a name collision the existing
    /// symbol is kept and `Err` returns the new symbol unchanged.
    pub fn add(&mut self, symbol: Symbol) -> Result<(), Symbol> {
        if self.exists_in_scope(&symbol.name) {
            return Err(symbol);
        }
        self.scopes[self.current.0].symbols.push(symbol);
        Ok(())
    }

    /// Walks the parent chain, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            let found = self.scopes[id.0]
                .symbols
                .iter()
                .rev()
                .find(|symbol| symbol.name == name);
            if found.is_some() {
                return found;
            }
            scope = self.scopes[id.0].parent;
        }
        None
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            // Two passes to appease the borrow checker.
            let found = self.scopes[id.0]
                .symbols
                .iter()
                .rposition(|symbol| symbol.name == name);
            if let Some(at) = found {
                return self.scopes[id.0].symbols.get_mut(at);
            }
            scope = self.scopes[id.0].parent;
        }
        None
    }

    /// Same walk as [`lookup`](Self::lookup), narrowed to function symbols.
    pub fn lookup_function(&self, name: &str) -> Option<&Symbol> {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            let found = self.scopes[id.0]
                .symbols
                .iter()
                .rev()
                .find(|symbol| symbol.name == name && symbol.kind.is_function());
            if found.is_some() {
                return found;
            }
            scope = self.scopes[id.0].parent;
        }
        None
    }

    /// Enumerates the whole scope tree depth-first from the root, symbols in
    /// insertion order within each scope.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let mut next_id = 0;
        self.dump_scope(ScopeId(0), 0, &mut next_id, &mut out);
        out
    }

    fn dump_scope(&self, id: ScopeId, depth: usize, next_id: &mut usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        let _ = writeln!(out, "{indent}scope {}", *next_id);
        *next_id += 1;
        for symbol in &self.scopes[id.0].symbols {
            let _ = writeln!(
                out,
                "{indent}  {} {} (line {})",
                symbol.kind.describe(),
                symbol.name,
                symbol.line
            );
        }
        for &child in &self.scopes[id.0].children {
            self.dump_scope(child, depth + 1, next_id, out);
        }
    }
}
