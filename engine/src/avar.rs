use std::cell::{Cell, RefCell};
use std::rc::Rc;

use sdsim_common::Spanned;
use sdsim_project::{Model, Var};
use sdsim_syntax::AstNode;

use crate::ids::{AModuleId, AVarId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    Unvisited,
    Visiting,
    Done,
}

/// The compiled, annotated form of a source [`Var`]. Dependencies,
/// inflows, and outflows are stored as [`AVarId`] indices rather than
/// direct references since the whole annotated tree lives in one
/// [`Registry`] arena.
#[derive(Debug)]
pub struct AVar {
    pub var: Rc<Var>,
    pub parent_module: AModuleId,
    qualified_name: RefCell<Option<String>>,
    /// Slab column this variable's value lives at. `-1` until offset
    /// assignment runs; modules never get one of their own.
    pub offset: i32,
    pub ast: Option<Spanned<AstNode>>,
    pub direct_deps: Vec<AVarId>,
    pub inflows: Vec<AVarId>,
    pub outflows: Vec<AVarId>,
    pub is_const: bool,
    /// Set when `var.kind == VarKind::Module`.
    pub module: Option<AModuleId>,
    /// Set when `var.kind == VarKind::Ref`, after binding.
    pub ref_src: Option<AVarId>,
    pub(crate) state: Cell<VisitState>,
}

impl AVar {
    pub fn new(var: Rc<Var>, parent_module: AModuleId) -> AVar {
        AVar {
            var,
            parent_module,
            qualified_name: RefCell::new(None),
            offset: -1,
            ast: None,
            direct_deps: vec![],
            inflows: vec![],
            outflows: vec![],
            is_const: false,
            module: None,
            ref_src: None,
            state: Cell::new(VisitState::Unvisited),
        }
    }
}

/// One compiled model instance: the `AVar`s it owns plus their
/// topologically sorted run-lists. The root module additionally owns
/// the synthetic `time` variable, at `avars[0]`.
#[derive(Debug)]
pub struct AModule {
    pub model: Rc<Model>,
    pub parent: Option<AModuleId>,
    /// The `Module`-kind `AVar` that owns this module; `None` for the
    /// root.
    pub owner: Option<AVarId>,
    pub avars: Vec<AVarId>,
    pub initials: Vec<AVarId>,
    pub flows: Vec<AVarId>,
    pub stocks: Vec<AVarId>,
    pub time: Option<AVarId>,
}

impl AModule {
    pub fn new(model: Rc<Model>, parent: Option<AModuleId>, owner: Option<AVarId>) -> AModule {
        AModule {
            model,
            parent,
            owner,
            avars: vec![],
            initials: vec![],
            flows: vec![],
            stocks: vec![],
            time: None,
        }
    }
}

/// Arena owning every `AVar` and `AModule` in a compiled model tree.
#[derive(Default, Debug)]
pub struct Registry {
    avars: Vec<AVar>,
    modules: Vec<AModule>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    pub fn push_avar(&mut self, av: AVar) -> AVarId {
        let id = AVarId(self.avars.len() as u32);
        self.avars.push(av);
        id
    }

    pub fn push_module(&mut self, module: AModule) -> AModuleId {
        let id = AModuleId(self.modules.len() as u32);
        self.modules.push(module);
        id
    }

    pub fn avar(&self, id: AVarId) -> &AVar {
        &self.avars[id.0 as usize]
    }

    pub fn avar_mut(&mut self, id: AVarId) -> &mut AVar {
        &mut self.avars[id.0 as usize]
    }

    pub fn module(&self, id: AModuleId) -> &AModule {
        &self.modules[id.0 as usize]
    }

    pub fn module_mut(&mut self, id: AModuleId) -> &mut AModule {
        &mut self.modules[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.avars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.avars.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = AVarId> {
        (0..self.avars.len()).map(|i| AVarId(i as u32))
    }
}

/// Dotted qualified name for `id`: unqualified at the root, `<module>.<name>`
/// recursing through every enclosing module otherwise. Memoized on the
/// `AVar` itself since a qualified name never changes once assigned.
pub fn qualified_name(registry: &Registry, id: AVarId) -> String {
    if let Some(cached) = registry.avar(id).qualified_name.borrow().as_ref() {
        return cached.clone();
    }

    let av = registry.avar(id);
    let module = registry.module(av.parent_module);
    let name = match module.owner {
        None => av.var.name.clone(),
        Some(owner_id) => format!("{}.{}", qualified_name(registry, owner_id), av.var.name),
    };

    *registry.avar(id).qualified_name.borrow_mut() = Some(name.clone());
    name
}
