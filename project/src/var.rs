use crate::table::Table;

/// A sub-module connection: a name inside a module aliased to a
/// variable visible in the enclosing scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Connect {
    pub name: String,
    pub src: String,
}

/// The kind of a source-level variable, matching the XMILE element it
/// was declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Stock,
    Flow,
    Aux,
    Module,
    /// A `<connect>` alias: resolves to another variable and inherits
    /// its offset rather than holding its own equation.
    Ref,
}

/// One source-level variable as loaded from a model definition.
/// Equations are kept as raw strings here - lexing and parsing happen
/// once this variable is compiled into an `AVar`.
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    pub kind: VarKind,
    pub name: String,
    pub eqn: Option<String>,
    pub inflows: Vec<String>,
    pub outflows: Vec<String>,
    pub connects: Vec<Connect>,
    pub gf: Option<Table>,
    pub is_nonneg: bool,
    /// Only meaningful for `VarKind::Ref`: the name this alias
    /// resolves to in the parent scope.
    pub src: Option<String>,
}

impl Var {
    pub fn new(kind: VarKind, name: impl Into<String>) -> Var {
        Var {
            kind,
            name: name.into(),
            eqn: None,
            inflows: vec![],
            outflows: vec![],
            connects: vec![],
            gf: None,
            is_nonneg: false,
            src: None,
        }
    }

    pub fn with_eqn(mut self, eqn: impl Into<String>) -> Var {
        self.eqn = Some(eqn.into());
        self
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Var {
        self.src = Some(src.into());
        self
    }
}
