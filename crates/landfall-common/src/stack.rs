//! Stack: the desired-state graph for one deployment
//!
//! A stack collects variables (engine-side function calls and derived
//! values), resources in declaration order, and published outputs. Builders
//! append to it; [`Stack::validate`] checks the graph before it is rendered.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde_json::Value;
use tracing::debug;

use crate::resource::{
    collect_interpolations, collect_references, split_interpolation, Resource,
};
use crate::{Error, Result};

/// A named value computed by the engine (function invoke or expression)
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    /// Variable name, shares the namespace with resources
    pub name: String,
    /// Expression
    pub value: Value,
    /// Whether the value must be stored and displayed as secret
    pub secret: bool,
}

impl Variable {
    fn references(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        collect_references(&self.value, &mut names);
        names
    }
}

/// A published stack output
#[derive(Clone, Debug, PartialEq)]
pub struct Output {
    /// Expression
    pub value: Value,
    /// Whether the output is marked secret
    pub secret: bool,
}

/// Desired-state graph for one deployment
#[derive(Clone, Debug, Default)]
pub struct Stack {
    name: String,
    description: Option<String>,
    variables: Vec<Variable>,
    resources: Vec<Resource>,
    outputs: Vec<(String, Output)>,
}

impl Stack {
    /// Create an empty stack
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the human readable description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Stack name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stack description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn is_declared(&self, name: &str) -> bool {
        self.resources.iter().any(|r| r.name == name)
            || self.variables.iter().any(|v| v.name == name)
    }

    fn ensure_unique(&self, name: &str) -> Result<()> {
        if self.is_declared(name) {
            return Err(Error::graph(name, "name declared twice"));
        }
        Ok(())
    }

    /// Append a resource. Names must be unique across resources and variables.
    pub fn add_resource(&mut self, resource: Resource) -> Result<()> {
        self.ensure_unique(&resource.name)?;
        debug!(resource = %resource.name, type_token = %resource.type_token, "declared resource");
        self.resources.push(resource);
        Ok(())
    }

    /// Append a plain variable
    pub fn add_variable(&mut self, name: impl Into<String>, value: Value) -> Result<()> {
        self.push_variable(name.into(), value, false)
    }

    /// Append a variable whose value is secret
    pub fn add_secret_variable(&mut self, name: impl Into<String>, value: Value) -> Result<()> {
        self.push_variable(name.into(), value, true)
    }

    fn push_variable(&mut self, name: String, value: Value, secret: bool) -> Result<()> {
        self.ensure_unique(&name)?;
        debug!(variable = %name, secret, "declared variable");
        self.variables.push(Variable {
            name,
            value,
            secret,
        });
        Ok(())
    }

    /// Publish an output
    pub fn export(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.push_output(name.into(), value.into(), false)
    }

    /// Publish an output marked secret
    pub fn export_secret(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.push_output(name.into(), value.into(), true)
    }

    fn push_output(&mut self, name: String, value: Value, secret: bool) -> Result<()> {
        if self.outputs.iter().any(|(n, _)| *n == name) {
            return Err(Error::graph(name, "output published twice"));
        }
        self.outputs.push((name, Output { value, secret }));
        Ok(())
    }

    /// Resources in declaration order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Variables in declaration order
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Outputs in publication order
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &Output)> {
        self.outputs.iter().map(|(n, o)| (n.as_str(), o))
    }

    /// Look up a resource by name
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Look up a variable by name
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Look up an output by name
    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }

    /// Check that the graph can be handed to the engine:
    ///
    /// - every option points at a declared resource,
    /// - every interpolation names a declared resource or variable,
    /// - the dependency graph is acyclic,
    /// - no plain output is derived from a secret variable or a secret
    ///   resource output.
    pub fn validate(&self) -> Result<()> {
        let resource_names: HashSet<&str> =
            self.resources.iter().map(|r| r.name.as_str()).collect();

        for resource in &self.resources {
            for name in resource.options.references() {
                if !resource_names.contains(name.as_str()) {
                    return Err(Error::graph(
                        &resource.name,
                        format!("option references undeclared resource '{}'", name),
                    ));
                }
            }
            self.check_declared(&resource.name, &resource.references())?;
        }
        for variable in &self.variables {
            self.check_declared(&variable.name, &variable.references())?;
        }
        for (name, output) in &self.outputs {
            let mut refs = BTreeSet::new();
            collect_references(&output.value, &mut refs);
            self.check_declared(name, &refs)?;
        }

        self.topological_order()?;
        self.check_secret_outputs()
    }

    fn check_declared(&self, at: &str, refs: &BTreeSet<String>) -> Result<()> {
        match refs.iter().find(|name| !self.is_declared(name)) {
            Some(missing) => Err(Error::graph(
                at,
                format!("reference to undeclared '{}'", missing),
            )),
            None => Ok(()),
        }
    }

    /// Whether the interpolation `inner` reads a secret: a variable in
    /// `tainted`, or a resource output listed in its secret outputs
    fn reads_secret(&self, inner: &str, tainted: &HashSet<&str>) -> bool {
        let (head, property) = split_interpolation(inner);
        if tainted.contains(head) {
            return true;
        }
        let Some(resource) = self.resource(head) else {
            return false;
        };
        let secret_outputs = &resource.options.additional_secret_outputs;
        match property {
            Some(property) => secret_outputs.iter().any(|o| o == property),
            None => !secret_outputs.is_empty(),
        }
    }

    /// Names of variables that are secret or derived from a secret variable
    /// or a secret resource output
    pub fn secret_variables(&self) -> HashSet<&str> {
        let mut tainted: HashSet<&str> = self
            .variables
            .iter()
            .filter(|v| v.secret)
            .map(|v| v.name.as_str())
            .collect();
        loop {
            let before = tainted.len();
            for variable in &self.variables {
                let mut paths = BTreeSet::new();
                collect_interpolations(&variable.value, &mut paths);
                if paths.iter().any(|p| self.reads_secret(p, &tainted)) {
                    tainted.insert(variable.name.as_str());
                }
            }
            if tainted.len() == before {
                return tainted;
            }
        }
    }

    fn check_secret_outputs(&self) -> Result<()> {
        let tainted = self.secret_variables();
        for (name, output) in &self.outputs {
            if output.secret {
                continue;
            }
            let mut paths = BTreeSet::new();
            collect_interpolations(&output.value, &mut paths);
            if let Some(secret) = paths.iter().find(|p| self.reads_secret(p, &tainted)) {
                return Err(Error::graph(
                    name,
                    format!("plain output exposes secret '{}'", secret),
                ));
            }
        }
        Ok(())
    }

    /// Variables and resources in dependency order.
    ///
    /// Ties are broken by declaration order (variables first), so the result
    /// is stable for a given stack.
    pub fn topological_order(&self) -> Result<Vec<&str>> {
        let nodes: Vec<(&str, BTreeSet<String>)> = self
            .variables
            .iter()
            .map(|v| (v.name.as_str(), v.references()))
            .chain(
                self.resources
                    .iter()
                    .map(|r| (r.name.as_str(), r.references())),
            )
            .collect();
        let index: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (*name, i))
            .collect();

        let mut indegree = vec![0usize; nodes.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        for (i, (name, refs)) in nodes.iter().enumerate() {
            for r in refs {
                if r == name {
                    return Err(Error::graph(*name, "resource depends on itself"));
                }
                if let Some(&dep) = index.get(r.as_str()) {
                    indegree[i] += 1;
                    dependents[dep].push(i);
                }
            }
        }

        let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(nodes.len());
        while let Some(next) = ready.pop_first() {
            order.push(nodes[next].0);
            for &dependent in &dependents[next] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != nodes.len() {
            let stuck: Vec<&str> = nodes
                .iter()
                .enumerate()
                .filter(|(i, _)| indegree[*i] > 0)
                .map(|(_, (name, _))| *name)
                .collect();
            return Err(Error::graph(
                stuck[0],
                format!("dependency cycle among {}", stuck.join(", ")),
            ));
        }
        Ok(order)
    }
}
