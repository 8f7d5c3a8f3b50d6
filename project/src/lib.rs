//! The loaded-from-disk data model `sdsim-engine` compiles: files,
//! models, source-level variables, and graphical-function tables.
//! Nothing here resolves names or walks equations - that is the
//! engine's job once this tree exists.

pub mod table;
pub mod var;

pub use table::Table;
pub use var::{Connect, Var, VarKind};

use sdsim_common::{Diagnostic, ErrorCode, Span};

/// Top-level simulation parameters, read from a model's `<sim_specs>`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimSpec {
    pub start: f64,
    pub stop: f64,
    pub dt: f64,
    pub savestep: f64,
    pub method: String,
    pub time_units: String,
}

impl SimSpec {
    /// Rejects parameters no simulation can run with. `dt <= 0` would
    /// never advance time; `stop < start` would never take a step.
    pub fn validate(&self) -> Result<(), Diagnostic> {
        if !(self.dt > 0.0) {
            return Err(Diagnostic::new(
                ErrorCode::Unspecified,
                format!("dt must be positive, got {}", self.dt),
                Span::empty(),
            ));
        }
        if self.stop < self.start {
            return Err(Diagnostic::new(
                ErrorCode::Unspecified,
                format!("stop ({}) is before start ({})", self.stop, self.start),
                Span::empty(),
            ));
        }
        Ok(())
    }
}

/// One named system-dynamics model: a flat list of source variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub vars: Vec<Var>,
}

/// One loaded XMILE file: a header, its simulation parameters, and
/// every model it defines (the first model is the root model when a
/// file defines more than one).
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub header: String,
    pub sim_specs: SimSpec,
    pub models: Vec<Model>,
}

/// A fully loaded project, possibly assembled from more than one
/// source file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Project {
    pub files: Vec<File>,
}

impl Project {
    pub fn new(files: Vec<File>) -> Project {
        Project { files }
    }

    /// Returns the named model, or the first model of the first file
    /// when `name` is empty - the root model convention spec callers
    /// rely on when no model name is given.
    pub fn get_model(&self, name: &str) -> Option<&Model> {
        self.find_model(name).map(|(_, model)| model)
    }

    /// Like [`Project::get_model`] but also returns the file that
    /// defines it, since a model's simulation parameters live on its
    /// owning file rather than on the model itself.
    pub fn find_model(&self, name: &str) -> Option<(&File, &Model)> {
        if name.is_empty() {
            let file = self.files.first()?;
            return file.models.first().map(|model| (file, model));
        }
        self.files.iter().find_map(|file| {
            file.models
                .iter()
                .find(|m| m.name == name)
                .map(|model| (file, model))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(start: f64, stop: f64, dt: f64) -> SimSpec {
        SimSpec {
            start,
            stop,
            dt,
            savestep: dt,
            method: "euler".to_string(),
            time_units: "months".to_string(),
        }
    }

    #[test]
    fn rejects_nonpositive_dt() {
        assert!(spec(0.0, 10.0, 0.0).validate().is_err());
        assert!(spec(0.0, 10.0, -1.0).validate().is_err());
    }

    #[test]
    fn rejects_stop_before_start() {
        assert!(spec(10.0, 0.0, 1.0).validate().is_err());
    }

    #[test]
    fn accepts_well_formed_spec() {
        assert!(spec(0.0, 10.0, 1.0).validate().is_ok());
    }

    #[test]
    fn get_model_empty_name_returns_first() {
        let project = Project::new(vec![File {
            header: String::new(),
            sim_specs: spec(0.0, 1.0, 1.0),
            models: vec![
                Model {
                    name: "root".to_string(),
                    vars: vec![],
                },
                Model {
                    name: "sector".to_string(),
                    vars: vec![],
                },
            ],
        }]);
        assert_eq!(project.get_model("").unwrap().name, "root");
        assert_eq!(project.get_model("sector").unwrap().name, "sector");
        assert!(project.get_model("missing").is_none());
    }
}
