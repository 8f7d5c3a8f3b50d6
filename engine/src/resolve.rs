use sdsim_project::VarKind;

use crate::avar::Registry;
use crate::ids::{AModuleId, AVarId};

/// Resolves `name` to a variable visible from `module_id`. A leading
/// `.` is stripped; a remaining `head.rest` descends into the child
/// module named `head`; otherwise this is a plain scan of the
/// module's own variables (including its synthetic `time`, for the
/// root).
pub fn resolve(registry: &Registry, module_id: AModuleId, name: &str) -> Option<AVarId> {
    let name = name.strip_prefix('.').unwrap_or(name);

    if let Some(dot) = name.find('.') {
        let (head, rest) = name.split_at(dot);
        let rest = &rest[1..];
        let module = registry.module(module_id);
        let child = module.avars.iter().copied().find(|&id| {
            let av = registry.avar(id);
            av.var.kind == VarKind::Module && av.var.name == head
        })?;
        let child_module = registry.avar(child).module?;
        return resolve(registry, child_module, rest);
    }

    let module = registry.module(module_id);
    module
        .avars
        .iter()
        .copied()
        .find(|&id| registry.avar(id).var.name == name)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use sdsim_project::{Model, Var};

    use super::*;
    use crate::avar::{AModule, AVar};

    fn leaf(name: &str) -> Var {
        Var::new(VarKind::Aux, name)
    }

    #[test]
    fn resolves_plain_and_dotted_names() {
        let mut registry = Registry::new();
        let root = registry.push_module(AModule::new(
            Rc::new(Model {
                name: String::new(),
                vars: vec![],
            }),
            None,
            None,
        ));

        let child_model = Rc::new(Model {
            name: "sector".to_string(),
            vars: vec![],
        });
        let module_var = Rc::new(Var::new(VarKind::Module, "sector"));
        let module_avid = registry.push_avar(AVar::new(module_var, root));
        registry.module_mut(root).avars.push(module_avid);

        let child = registry.push_module(AModule::new(child_model, Some(root), Some(module_avid)));
        registry.avar_mut(module_avid).module = Some(child);

        let inner = registry.push_avar(AVar::new(Rc::new(leaf("rate")), child));
        registry.module_mut(child).avars.push(inner);

        assert_eq!(resolve(&registry, root, "sector.rate"), Some(inner));
        assert_eq!(resolve(&registry, root, ".sector.rate"), Some(inner));
        assert_eq!(resolve(&registry, root, "missing"), None);
        assert_eq!(resolve(&registry, child, "rate"), Some(inner));
    }
}
