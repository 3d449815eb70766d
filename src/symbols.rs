//! Symbol table
//!
//! All scopes of one compilation live in a single [SymbolTable]. The global scope holds the
//! string constants and the entry labels of the definitions, every definition and the main
//! script get their own scope whose parent is the global one.
//!
//! The table is also the allocator for everything the lowering pass invents: temporaries,
//! labels and string constants. One counter per table makes every generated name unique across
//! the whole program, so two independent compilations never share state.

use std::borrow::Cow;
use std::collections::HashMap;
use std::{fmt, io};

use ptree::{Style, TreeItem};
use thiserror::Error;

use crate::ir::{Label, Name};
use crate::Type;

/// Handle to one scope of a [SymbolTable]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

impl ScopeId {
    pub const GLOBAL: ScopeId = ScopeId(0);
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SCOPE#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    Formal,
    Local,
    Temporary,
    Label,
    StringConstant(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Absent for labels and string constants
    pub typ: Option<Type>,
}

impl Symbol {
    /// Whether the symbol names storage that a frame has to provide
    pub fn is_storage(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Formal | SymbolKind::Local | SymbolKind::Temporary
        )
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, self.typ) {
            (SymbolKind::StringConstant(text), _) => write!(f, "{} = {text:?}", self.name),
            (SymbolKind::Label, _) => write!(f, "{} (label)", self.name),
            (kind, Some(typ)) => {
                let kind = match kind {
                    SymbolKind::Formal => "formal",
                    SymbolKind::Local => "local",
                    _ => "temporary",
                };
                write!(f, "{}: {typ} ({kind})", self.name)
            }
            (_, None) => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SymbolError {
    #[error("'{0}' is already declared in this scope")]
    AlreadyDeclared(String),

    #[error("'{0}' is not declared")]
    NotDeclared(String),
}

#[derive(Debug, Clone)]
struct Scope {
    owner: String,
    parent: Option<ScopeId>,
    symbols: Vec<Symbol>,
    index: HashMap<String, usize>,
}

impl Scope {
    fn new(owner: String, parent: Option<ScopeId>) -> Self {
        Self {
            owner,
            parent,
            symbols: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn get(&self, name: &str) -> Option<&Symbol> {
        self.index.get(name).map(|&i| &self.symbols[i])
    }

    fn insert(&mut self, symbol: Symbol) -> Result<(), SymbolError> {
        if self.index.contains_key(&symbol.name) {
            return Err(SymbolError::AlreadyDeclared(symbol.name));
        }
        self.index.insert(symbol.name.clone(), self.symbols.len());
        self.symbols.push(symbol);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    owners: HashMap<String, ScopeId>,
    strings: HashMap<String, Label>,
    counter: usize,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(String::from("<global>"), None)],
            owners: HashMap::new(),
            strings: HashMap::new(),
            counter: 0,
        }
    }

    /// Open a new scope for a definition (or the main script), parented to the global scope
    pub fn add_scope(&mut self, owner: &str) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes
            .push(Scope::new(owner.to_string(), Some(ScopeId::GLOBAL)));
        self.owners.insert(owner.to_string(), id);
        id
    }

    /// The scope opened for `owner` by [SymbolTable::add_scope]
    pub fn scope_of(&self, owner: &str) -> Option<ScopeId> {
        self.owners.get(owner).copied()
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    pub fn owner(&self, scope: ScopeId) -> &str {
        &self.scopes[scope.0].owner
    }

    pub fn declare_formal(
        &mut self,
        scope: ScopeId,
        name: &str,
        typ: Type,
    ) -> Result<(), SymbolError> {
        self.scopes[scope.0].insert(Symbol {
            name: name.to_string(),
            kind: SymbolKind::Formal,
            typ: Some(typ),
        })
    }

    /// Declare a local variable
    ///
    /// Fails if the name is already declared in `scope` itself. Names of enclosing scopes may be
    /// shadowed.
    pub fn declare_local(
        &mut self,
        scope: ScopeId,
        name: &str,
        typ: Type,
    ) -> Result<(), SymbolError> {
        self.scopes[scope.0].insert(Symbol {
            name: name.to_string(),
            kind: SymbolKind::Local,
            typ: Some(typ),
        })
    }

    /// Declare a label with a fixed name, e.g. the entry point of a definition
    pub fn declare_label(&mut self, scope: ScopeId, name: &str) -> Result<Label, SymbolError> {
        self.scopes[scope.0].insert(Symbol {
            name: name.to_string(),
            kind: SymbolKind::Label,
            typ: None,
        })?;
        Ok(Label::from(name))
    }

    /// Find a name in `scope` or any of its parents
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Result<&Symbol, SymbolError> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            if let Some(symbol) = scope.get(name) {
                return Ok(symbol);
            }
            current = scope.parent;
        }
        Err(SymbolError::NotDeclared(name.to_string()))
    }

    pub fn fresh_temporary(&mut self, scope: ScopeId, typ: Type) -> Name {
        let name = format!("%t{}", self.next());
        self.insert_generated(scope, name.clone(), SymbolKind::Temporary, Some(typ));
        Name::from(name)
    }

    /// A new label; `hint` only makes listings easier to read
    pub fn fresh_label(&mut self, scope: ScopeId, hint: Option<&str>) -> Label {
        let name = format!(".{}{}", hint.unwrap_or("L"), self.next());
        self.insert_generated(scope, name.clone(), SymbolKind::Label, None);
        Label::from(name)
    }

    /// The label of the string constant `text`, created on first use
    pub fn intern_string(&mut self, text: &str) -> Label {
        if let Some(label) = self.strings.get(text) {
            return label.clone();
        }

        let name = format!(".str{}", self.next());
        self.insert_generated(
            ScopeId::GLOBAL,
            name.clone(),
            SymbolKind::StringConstant(text.to_string()),
            None,
        );

        let label = Label::from(name);
        self.strings.insert(text.to_string(), label.clone());
        label
    }

    /// The text of the string constant behind `label`
    pub fn string_constant(&self, label: &Label) -> Option<&str> {
        match self.scopes[0].get(label.as_str()) {
            Some(Symbol {
                kind: SymbolKind::StringConstant(text),
                ..
            }) => Some(text.as_str()),
            _ => None,
        }
    }

    /// All string constants as `(label, text)` in creation order
    pub fn string_constants(&self) -> impl Iterator<Item = (&str, &str)> {
        self.scopes[0].symbols.iter().filter_map(|s| match &s.kind {
            SymbolKind::StringConstant(text) => Some((s.name.as_str(), text.as_str())),
            _ => None,
        })
    }

    /// The symbols of `scope` only, in declaration order
    pub fn symbols(&self, scope: ScopeId) -> &[Symbol] {
        &self.scopes[scope.0].symbols
    }

    pub fn formals(&self, scope: ScopeId) -> impl Iterator<Item = &Symbol> {
        self.symbols(scope)
            .iter()
            .filter(|s| s.kind == SymbolKind::Formal)
    }

    /// Render the scope tree (global scope, its children and all symbols)
    pub fn write_tree<W: io::Write>(&self, out: W) -> io::Result<()> {
        ptree::write_tree(&TreeNode::Scope(self, ScopeId::GLOBAL), out)
    }

    fn next(&mut self) -> usize {
        let n = self.counter;
        self.counter += 1;
        n
    }

    fn insert_generated(
        &mut self,
        scope: ScopeId,
        name: String,
        kind: SymbolKind,
        typ: Option<Type>,
    ) {
        let scope = &mut self.scopes[scope.0];
        scope.index.insert(name.clone(), scope.symbols.len());
        scope.symbols.push(Symbol { name, kind, typ });
    }
}

#[derive(Clone)]
enum TreeNode<'a> {
    Scope(&'a SymbolTable, ScopeId),
    Symbol(&'a Symbol),
}

impl<'a> TreeItem for TreeNode<'a> {
    type Child = Self;

    fn write_self<W: io::Write>(&self, f: &mut W, style: &Style) -> io::Result<()> {
        match self {
            TreeNode::Scope(table, id) => write!(f, "{}", style.paint(table.owner(*id))),
            TreeNode::Symbol(symbol) => write!(f, "{}", style.paint(symbol)),
        }
    }

    fn children(&self) -> Cow<[Self::Child]> {
        match self {
            TreeNode::Scope(table, id) => {
                let (table, id): (&'a SymbolTable, ScopeId) = (*table, *id);
                let scopes = (0..table.scopes.len())
                    .map(ScopeId)
                    .filter(|child| table.parent(*child) == Some(id))
                    .map(|child| TreeNode::Scope(table, child));
                let symbols = table.symbols(id).iter().map(TreeNode::Symbol);
                Cow::from(scopes.chain(symbols).collect::<Vec<_>>())
            }
            TreeNode::Symbol(_) => Cow::from(vec![]),
        }
    }
}
