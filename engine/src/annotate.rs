use std::rc::Rc;

use sdsim_common::{Diagnostic, ErrorCode, Span};
use sdsim_project::{Model, Project, Var, VarKind};
use sdsim_syntax::{parse_equation, AstNode};

use crate::avar::{AModule, AVar, Registry, VisitState};
use crate::builtins::lookup_builtin;
use crate::error::EngineError;
use crate::ids::{AModuleId, AVarId};
use crate::resolve::resolve;

/// Builds the full `AVar`/`AModule` tree for `model` and every
/// sub-module it references, with the root module additionally owning
/// a synthetic `time` variable at `avars[0]`. A module variable whose
/// name doesn't match any model in `project` is reported as an
/// `UnknownModel` diagnostic and stands in as an empty sub-model so
/// the tree still shapes out.
pub fn build_root_module(
    registry: &mut Registry,
    project: &Project,
    model: Rc<Model>,
    diagnostics: &mut Vec<Diagnostic>,
) -> AModuleId {
    build_module(registry, project, model, None, None, true, diagnostics)
}

fn build_module(
    registry: &mut Registry,
    project: &Project,
    model: Rc<Model>,
    parent: Option<AModuleId>,
    owner: Option<AVarId>,
    is_root: bool,
    diagnostics: &mut Vec<Diagnostic>,
) -> AModuleId {
    let module_id = registry.push_module(AModule::new(model.clone(), parent, owner));

    if is_root {
        let time_var = Rc::new(Var::new(VarKind::Aux, "time"));
        let time_id = registry.push_avar(AVar::new(time_var, module_id));
        registry.module_mut(module_id).avars.push(time_id);
        registry.module_mut(module_id).time = Some(time_id);
    }

    for var in &model.vars {
        let var_rc = Rc::new(var.clone());
        let kind = var_rc.kind;
        let avid = registry.push_avar(AVar::new(var_rc.clone(), module_id));
        registry.module_mut(module_id).avars.push(avid);

        if kind == VarKind::Module {
            // A module variable instantiates the project's model of
            // the same name, the way `sd_project_get_model` looks it
            // up by `v->name` in the original evaluator.
            let child_model = match project.get_model(&var_rc.name) {
                Some(found) => Rc::new(found.clone()),
                None => {
                    diagnostics.push(EngineError::UnknownModel(var_rc.name.clone()).into());
                    Rc::new(Model {
                        name: var_rc.name.clone(),
                        vars: vec![],
                    })
                }
            };
            let child_id = build_module(registry, project, child_model, Some(module_id), Some(avid), false, diagnostics);
            registry.avar_mut(avid).module = Some(child_id);

            // `<connect>` elements on a module expose aliases into the
            // parent scope; each becomes a REF-kind AVar living inside
            // the child module, resolved against the parent in
            // `bind_ref` once the whole tree exists.
            for connect in &var_rc.connects {
                let ref_var = Rc::new(Var::new(VarKind::Ref, connect.name.clone()).with_src(connect.src.clone()));
                let ref_id = registry.push_avar(AVar::new(ref_var, child_id));
                registry.module_mut(child_id).avars.push(ref_id);
            }
        }
    }

    module_id
}

/// Phase A: binds every variable's equation, resolving identifiers
/// and built-in calls, and resolves `connect` aliases and stock
/// inflow/outflow lists. Sub-modules are bound depth-first, children
/// before their owning module's own variable.
pub fn bind_module(registry: &mut Registry, module_id: AModuleId) -> Vec<Diagnostic> {
    let mut diagnostics = vec![];
    let avar_ids = registry.module(module_id).avars.clone();
    let time_id = registry.module(module_id).time;

    for avid in avar_ids {
        if Some(avid) == time_id {
            continue;
        }

        let kind = registry.avar(avid).var.kind;
        match kind {
            VarKind::Module => {
                let child = registry.avar(avid).module.expect("module var missing child");
                diagnostics.append(&mut bind_module(registry, child));
            }
            VarKind::Ref => bind_ref(registry, module_id, avid, &mut diagnostics),
            _ => bind_equation(registry, module_id, avid, &mut diagnostics),
        }
    }

    diagnostics
}

fn bind_ref(registry: &mut Registry, module_id: AModuleId, avid: AVarId, diagnostics: &mut Vec<Diagnostic>) {
    let Some(parent_id) = registry.module(module_id).parent else {
        diagnostics.push(Diagnostic::new(
            ErrorCode::Unspecified,
            format!(
                "`{}` is a connect alias but its module has no parent scope",
                registry.avar(avid).var.name
            ),
            Span::empty(),
        ));
        return;
    };

    let src_name = registry.avar(avid).var.src.clone().unwrap_or_default();
    match resolve(registry, parent_id, &src_name) {
        Some(src_id) => registry.avar_mut(avid).ref_src = Some(src_id),
        None => diagnostics.push(
            EngineError::UnresolvedName(src_name).into(),
        ),
    }
}

fn bind_equation(registry: &mut Registry, module_id: AModuleId, avid: AVarId, diagnostics: &mut Vec<Diagnostic>) {
    let var = registry.avar(avid).var.clone();

    if let Some(eqn) = &var.eqn {
        match parse_equation(eqn) {
            Ok(ast) => {
                let mut deps = vec![];
                bind_ast(registry, module_id, &ast.item, &mut deps, diagnostics);
                let is_const = matches!(ast.item, AstNode::FloatLit { .. });
                let av = registry.avar_mut(avid);
                av.is_const = is_const;
                av.direct_deps = deps;
                av.ast = Some(ast);
            }
            Err(mut errs) => diagnostics.append(&mut errs),
        }
    }

    if var.kind == VarKind::Stock {
        let inflows = resolve_names(registry, module_id, &var.inflows, diagnostics);
        let outflows = resolve_names(registry, module_id, &var.outflows, diagnostics);
        let av = registry.avar_mut(avid);
        av.inflows = inflows;
        av.outflows = outflows;
    }
}

fn resolve_names(
    registry: &Registry,
    module_id: AModuleId,
    names: &[String],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<AVarId> {
    let mut out = vec![];
    for name in names {
        match resolve(registry, module_id, name) {
            Some(id) => out.push(id),
            None => diagnostics.push(EngineError::UnresolvedName(name.clone()).into()),
        }
    }
    out
}

/// Walks `node` pre-order, binding `Ident`/`Call` back-references and
/// collecting the `AVarId`s this equation directly depends on.
fn bind_ast(
    registry: &Registry,
    module_id: AModuleId,
    node: &AstNode,
    deps: &mut Vec<AVarId>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    node.walk(&mut |n| match n {
        AstNode::Ident { name, bound } => match resolve(registry, module_id, name) {
            Some(id) => {
                bound.set(Some(id));
                deps.push(id);
            }
            None => diagnostics.push(EngineError::UnresolvedName(name.clone()).into()),
        },
        AstNode::Call { callee_name, builtin, .. } => match lookup_builtin(callee_name) {
            Some(id) => builtin.set(Some(id)),
            None => log::warn!("unknown built-in function `{}`", callee_name),
        },
        _ => {}
    });
}

/// Depth-first offset assignment: modules hold no offset of their
/// own and recurse into their children; refs are skipped here and
/// resolved transitively in [`assign_ref_offsets`] once every
/// non-ref variable has one.
pub fn assign_offsets(registry: &mut Registry, module_id: AModuleId, offset: &mut i32) {
    let avar_ids = registry.module(module_id).avars.clone();
    for avid in avar_ids {
        let kind = registry.avar(avid).var.kind;
        match kind {
            VarKind::Module => {
                let child = registry.avar(avid).module.expect("module var missing child");
                assign_offsets(registry, child, offset);
            }
            VarKind::Ref => {}
            _ => {
                registry.avar_mut(avid).offset = *offset;
                *offset += 1;
            }
        }
    }
}

pub fn assign_ref_offsets(registry: &mut Registry) {
    for id in registry.ids() {
        if registry.avar(id).var.kind == VarKind::Ref {
            let offset = ref_offset(registry, id);
            registry.avar_mut(id).offset = offset;
        }
    }
}

fn ref_offset(registry: &Registry, id: AVarId) -> i32 {
    let av = registry.avar(id);
    match av.ref_src {
        Some(src) => ref_offset(registry, src),
        None => av.offset,
    }
}

/// Phase B: DFS from each of `module`'s own variables (and, for
/// non-root modules, from its first variable too - the root skips its
/// own synthetic `time` at index 0) populating the three run-lists in
/// dependency order. A dependency found mid-traversal (on-stack, not
/// yet done) is a circularity error.
pub fn sort_runlists(registry: &mut Registry, module_id: AModuleId) -> Result<(), EngineError> {
    clear_visited(registry, module_id);

    let avar_ids = registry.module(module_id).avars.clone();
    let start = if registry.module(module_id).parent.is_none() { 1 } else { 0 };

    for &avid in avar_ids.iter().skip(start) {
        if registry.avar(avid).state.get() == VisitState::Done {
            continue;
        }
        if registry.avar(avid).var.kind == VarKind::Module {
            let child = registry.avar(avid).module.expect("module var missing child");
            sort_runlists(registry, child)?;
        }
        add_to_runlists(registry, module_id, avid)?;
    }

    Ok(())
}

fn clear_visited(registry: &mut Registry, module_id: AModuleId) {
    let avar_ids = registry.module(module_id).avars.clone();
    for avid in avar_ids {
        if registry.avar(avid).var.kind == VarKind::Module {
            let child = registry.avar(avid).module.expect("module var missing child");
            clear_visited(registry, child);
        }
        registry.avar_mut(avid).state.set(VisitState::Unvisited);
    }
}

fn add_to_runlists(registry: &mut Registry, module_id: AModuleId, avid: AVarId) -> Result<(), EngineError> {
    match registry.avar(avid).state.get() {
        VisitState::Done => return Ok(()),
        VisitState::Visiting => return Err(EngineError::Circular),
        VisitState::Unvisited => {}
    }

    registry.avar(avid).state.set(VisitState::Visiting);

    let deps = registry.avar(avid).direct_deps.clone();
    for dep in deps {
        if registry.avar(dep).state.get() == VisitState::Done {
            continue;
        }
        add_to_runlists(registry, module_id, dep)?;
    }

    let kind = registry.avar(avid).var.kind;
    let is_const = registry.avar(avid).is_const;
    match kind {
        VarKind::Module => {
            let module = registry.module_mut(module_id);
            module.initials.push(avid);
            module.flows.push(avid);
            module.stocks.push(avid);
        }
        VarKind::Stock => {
            let module = registry.module_mut(module_id);
            module.initials.push(avid);
            module.stocks.push(avid);
        }
        VarKind::Ref => {}
        _ => {
            let module = registry.module_mut(module_id);
            module.initials.push(avid);
            if is_const {
                module.stocks.push(avid);
            } else {
                module.flows.push(avid);
            }
        }
    }

    registry.avar(avid).state.set(VisitState::Done);
    Ok(())
}
