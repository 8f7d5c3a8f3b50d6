use std::rc::Rc;

use sdsim_common::Diagnostic;
use sdsim_project::{Project, SimSpec, VarKind};
use sdsim_syntax::AstNode;

use crate::annotate::{assign_offsets, assign_ref_offsets, bind_module, build_root_module, sort_runlists};
use crate::avar::{qualified_name, Registry};
use crate::builtins::call_builtin;
use crate::error::EngineError;
use crate::ids::{AModuleId, AVarId};
use crate::resolve::resolve;

/// A compiled model ready to run: the annotated variable tree plus
/// the dense value slab Euler integration writes into. `curr`/`next`
/// are not stored directly - they are always `save_step`/`save_step+1`
/// row offsets into `slab`, recomputed on demand.
#[derive(Debug)]
pub struct Sim {
    project: Rc<Project>,
    registry: Registry,
    root_module: AModuleId,
    spec: SimSpec,
    slab: Vec<f64>,
    nvars: usize,
    nsteps: usize,
    nsaves: usize,
    save_every: usize,
    step: usize,
    save_step: usize,
}

impl Sim {
    /// Annotates `model_name` (or the project's root model, if
    /// `None`), topologically sorts it, assigns slab offsets, and
    /// resets it ready to run. Fails if the model doesn't exist, a
    /// name doesn't resolve, or a dependency cycle is found.
    pub fn new(project: Rc<Project>, model_name: Option<&str>) -> Result<Sim, Vec<Diagnostic>> {
        let name = model_name.unwrap_or("");
        let (file, model) = project
            .find_model(name)
            .ok_or_else(|| vec![EngineError::UnknownModel(name.to_string()).into()])?;

        file.sim_specs.validate().map_err(|d| vec![d])?;

        let mut registry = Registry::new();
        let mut diagnostics = vec![];
        let root_module = build_root_module(&mut registry, &project, Rc::new(model.clone()), &mut diagnostics);
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        let diagnostics = bind_module(&mut registry, root_module);
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        let mut offset = 0i32;
        assign_offsets(&mut registry, root_module, &mut offset);
        assign_ref_offsets(&mut registry);

        sort_runlists(&mut registry, root_module).map_err(|e| vec![e.into()])?;

        let spec = file.sim_specs.clone();
        let mut sim = Sim {
            project,
            registry,
            root_module,
            spec,
            slab: vec![],
            nvars: offset.max(1) as usize,
            nsteps: 0,
            nsaves: 0,
            save_every: 1,
            step: 0,
            save_step: 0,
        };
        sim.reset();
        Ok(sim)
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    fn curr_offset(&self) -> usize {
        self.save_step * self.nvars
    }

    fn next_offset(&self) -> usize {
        (self.save_step + 1) * self.nvars
    }

    /// Reallocates the slab from `spec` and evaluates the `initials`
    /// run-list into row 0. `nsteps`/`save_every`/`nsaves` use the
    /// exact formulas of the original evaluator so that save cadence
    /// and sample count match it precisely.
    pub fn reset(&mut self) {
        let dt = self.spec.dt;
        self.nsteps = ((self.spec.stop - self.spec.start) / dt) as usize + 1;
        let save_every = (self.spec.savestep / dt + 0.5) as usize;
        self.save_every = save_every.max(1);
        self.nsaves = self.nsteps / self.save_every + if self.nsteps % self.save_every != 0 { 1 } else { 0 };
        self.step = 0;
        self.save_step = 0;

        self.slab = vec![0.0; self.nvars * (self.nsaves + 1)];
        self.slab[0] = self.spec.start;

        let initials = self.registry.module(self.root_module).initials.clone();
        self.calc(0, 0, &initials, true);

        log::trace!(
            "reset: nsteps={} nsaves={} save_every={}",
            self.nsteps,
            self.nsaves,
            self.save_every
        );
    }

    /// Advances the simulation until the current save row's time
    /// exceeds `end` or the step budget is exhausted.
    pub fn run_to(&mut self, end: f64) {
        loop {
            if !(self.step < self.nsteps && self.slab[self.curr_offset()] <= end) {
                break;
            }

            let dt = self.spec.dt;
            let curr_off = self.curr_offset();
            let next_off = self.next_offset();

            let flows = self.registry.module(self.root_module).flows.clone();
            self.calc(curr_off, curr_off, &flows, false);

            let stocks = self.registry.module(self.root_module).stocks.clone();
            self.calc_stocks(next_off, curr_off, &stocks);

            if self.step + 1 == self.nsteps {
                break;
            }

            self.slab[next_off] = self.spec.start + (self.step + 1) as f64 * dt;

            let old_step = self.step;
            self.step += 1;
            if old_step % self.save_every != 0 {
                self.slab.copy_within(next_off..next_off + self.nvars, curr_off);
            } else {
                self.save_step += 1;
            }
        }
    }

    pub fn run_to_end(&mut self) {
        self.run_to(self.spec.stop + 1.0);
    }

    pub fn step_count(&self) -> usize {
        self.nsaves
    }

    pub fn var_count(&self) -> usize {
        self.nvars
    }

    /// Depth-first, root `time` first, dotted qualified names for
    /// every non-ref non-module variable.
    pub fn var_names(&self) -> Vec<String> {
        let mut names = vec![];
        if let Some(time_id) = self.registry.module(self.root_module).time {
            names.push(self.registry.avar(time_id).var.name.clone());
        }
        self.collect_names(self.root_module, &mut names);
        names
    }

    fn collect_names(&self, module_id: AModuleId, out: &mut Vec<String>) {
        let time_id = self.registry.module(module_id).time;
        for &avid in &self.registry.module(module_id).avars {
            if Some(avid) == time_id {
                continue;
            }
            let av = self.registry.avar(avid);
            match av.var.kind {
                VarKind::Module => {
                    let child = av.module.expect("module var missing child");
                    self.collect_names(child, out);
                }
                VarKind::Ref => {}
                _ => out.push(qualified_name(&self.registry, avid)),
            }
        }
    }

    pub fn get_value(&self, name: &str) -> Result<f64, Diagnostic> {
        if name == "time" {
            return Ok(self.slab[self.curr_offset()]);
        }
        let id = resolve(&self.registry, self.root_module, name)
            .ok_or_else(|| EngineError::UnknownVariable(name.to_string()))?;
        let offset = self.registry.avar(id).offset as usize;
        Ok(self.slab[self.curr_offset() + offset])
    }

    /// Up to `nsaves + 1` samples, one per save row.
    pub fn get_series(&self, name: &str) -> Result<Vec<f64>, Diagnostic> {
        let offset = if name == "time" {
            0
        } else {
            let id = resolve(&self.registry, self.root_module, name)
                .ok_or_else(|| EngineError::UnknownVariable(name.to_string()))?;
            self.registry.avar(id).offset as usize
        };

        Ok((0..=self.nsaves).map(|row| self.slab[row * self.nvars + offset]).collect())
    }

    /// Evaluates `avids` (an `initials` or `flows` run-list) into row
    /// `out_off`, reading identifier values from row `read_off`.
    /// Sub-module variables recurse into their own matching run-list.
    fn calc(&mut self, out_off: usize, read_off: usize, avids: &[AVarId], initial: bool) {
        let dt = self.spec.dt;
        for &avid in avids {
            if self.registry.avar(avid).var.kind == VarKind::Module {
                let child = self.registry.avar(avid).module.expect("module var missing child");
                let sub_list = if initial {
                    self.registry.module(child).initials.clone()
                } else {
                    self.registry.module(child).flows.clone()
                };
                self.calc(out_off, read_off, &sub_list, initial);
                continue;
            }

            let t = self.slab[read_off];
            let raw = self.svisit_avar(avid, read_off, dt, t);
            let value = match &self.registry.avar(avid).var.gf {
                Some(table) => table.lookup(raw),
                None => raw,
            };
            let offset = self.registry.avar(avid).offset as usize;
            self.slab[out_off + offset] = value;
        }
    }

    /// Evaluates a `stocks` run-list into row `out_off`. Stocks
    /// integrate from their inflow/outflow sums; constants (which also
    /// live in this list) simply re-evaluate their AST, matching the
    /// original evaluator's choice not to special-case memoization.
    fn calc_stocks(&mut self, out_off: usize, read_off: usize, avids: &[AVarId]) {
        let dt = self.spec.dt;
        for &avid in avids {
            match self.registry.avar(avid).var.kind {
                VarKind::Stock => {
                    let offset = self.registry.avar(avid).offset as usize;
                    let prev = self.slab[read_off + offset];
                    let inflows = self.registry.avar(avid).inflows.clone();
                    let outflows = self.registry.avar(avid).outflows.clone();
                    let mut delta = 0.0;
                    for id in inflows {
                        delta += self.slab[read_off + self.registry.avar(id).offset as usize];
                    }
                    for id in outflows {
                        delta -= self.slab[read_off + self.registry.avar(id).offset as usize];
                    }
                    self.slab[out_off + offset] = prev + delta * dt;
                }
                VarKind::Module => {
                    let child = self.registry.avar(avid).module.expect("module var missing child");
                    let sub_list = self.registry.module(child).stocks.clone();
                    self.calc_stocks(out_off, read_off, &sub_list);
                }
                _ => {
                    let t = self.slab[read_off];
                    let value = self.svisit_avar(avid, read_off, dt, t);
                    let offset = self.registry.avar(avid).offset as usize;
                    self.slab[out_off + offset] = value;
                }
            }
        }
    }

    fn svisit_avar(&self, avid: AVarId, read_off: usize, dt: f64, t: f64) -> f64 {
        match self.registry.avar(avid).ast.as_ref() {
            Some(ast) => self.svisit(&ast.item, read_off, dt, t),
            None => f64::NAN,
        }
    }

    fn svisit(&self, node: &AstNode, read_off: usize, dt: f64, t: f64) -> f64 {
        match node {
            AstNode::FloatLit { value, .. } => *value,
            AstNode::Ident { bound, .. } => match bound.get() {
                Some(id) => self.slab[read_off + self.registry.avar(id).offset as usize],
                None => f64::NAN,
            },
            AstNode::Paren { inner } => self.svisit(&inner.item, read_off, dt, t),
            AstNode::Unary { op, operand } => {
                let x = self.svisit(&operand.item, read_off, dt, t);
                match op {
                    '+' => x,
                    '-' => -x,
                    '!' => bool_to_f64(x == 0.0),
                    _ => f64::NAN,
                }
            }
            AstNode::Binary { op, left, right } => {
                let l = self.svisit(&left.item, read_off, dt, t);
                let r = self.svisit(&right.item, read_off, dt, t);
                eval_binary(*op, l, r)
            }
            AstNode::If { cond, then_branch, else_branch } => {
                let c = self.svisit(&cond.item, read_off, dt, t);
                if c != 0.0 {
                    self.svisit(&then_branch.item, read_off, dt, t)
                } else {
                    match else_branch {
                        Some(branch) => self.svisit(&branch.item, read_off, dt, t),
                        None => f64::NAN,
                    }
                }
            }
            AstNode::Call { args, builtin, .. } => {
                let mut buf = [0.0f64; 6];
                let n = args.len().min(buf.len());
                for (slot, arg) in buf.iter_mut().zip(args.iter()).take(n) {
                    *slot = self.svisit(&arg.item, read_off, dt, t);
                }
                match builtin.get() {
                    Some(id) => call_builtin(id, &buf[..n], dt, t),
                    None => f64::NAN,
                }
            }
        }
    }
}

fn bool_to_f64(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn eval_binary(op: char, l: f64, r: f64) -> f64 {
    match op {
        '+' => l + r,
        '-' => l - r,
        '*' => l * r,
        '/' => l / r,
        '^' => l.powf(r),
        '<' => bool_to_f64(l < r),
        '>' => bool_to_f64(l > r),
        '\u{2264}' => bool_to_f64(l <= r),
        '\u{2265}' => bool_to_f64(l >= r),
        '=' => bool_to_f64(l == r),
        '\u{2260}' => bool_to_f64(l != r),
        '&' => bool_to_f64(l == 1.0 && r == 1.0),
        '|' => bool_to_f64(l == 1.0 || r == 1.0),
        _ => f64::NAN,
    }
}
