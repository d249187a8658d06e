//! Rendering a [`Stack`] as a YAML program for the provisioning engine
//!
//! The document follows the engine's YAML program layout: `name`, `runtime`,
//! `description`, `variables`, `resources` and `outputs`. Resource options
//! reference other resources as `${name}`. Secret variables and outputs are
//! wrapped in `fn::secret` so the engine encrypts them in state.

use serde_json::{json, Map, Value};
use serde_yaml::{Mapping, Value as YamlValue};

use crate::resource::{format_timeout, Resource, ResourceOptions};
use crate::{reference, Error, Result, Stack};

const RUNTIME: &str = "yaml";

fn secret(value: &Value) -> Value {
    json!({ "fn::secret": value })
}

fn to_yaml(value: &Value) -> Result<YamlValue> {
    serde_yaml::to_value(value).map_err(|e| Error::serialization_for("program", e.to_string()))
}

fn render_options(options: &ResourceOptions) -> Value {
    let mut out = Map::new();
    if let Some(parent) = &options.parent {
        out.insert("parent".into(), json!(reference(parent)));
    }
    if !options.depends_on.is_empty() {
        let deps: Vec<String> = options.depends_on.iter().map(|d| reference(d)).collect();
        out.insert("dependsOn".into(), json!(deps));
    }
    if let Some(owner) = &options.deleted_with {
        out.insert("deletedWith".into(), json!(reference(owner)));
    }
    if let Some(provider) = &options.provider {
        out.insert("provider".into(), json!(reference(provider)));
    }
    if let Some(timeouts) = &options.custom_timeouts {
        let mut t = Map::new();
        for (key, value) in [
            ("create", timeouts.create),
            ("update", timeouts.update),
            ("delete", timeouts.delete),
        ] {
            if let Some(value) = value {
                t.insert(key.into(), json!(format_timeout(value)));
            }
        }
        out.insert("customTimeouts".into(), Value::Object(t));
    }
    if !options.additional_secret_outputs.is_empty() {
        out.insert(
            "additionalSecretOutputs".into(),
            json!(options.additional_secret_outputs),
        );
    }
    Value::Object(out)
}

fn render_resource(resource: &Resource) -> Result<YamlValue> {
    let mut out = Mapping::new();
    out.insert("type".into(), resource.type_token.clone().into());
    let has_properties = match &resource.properties {
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
        _ => true,
    };
    if has_properties {
        out.insert("properties".into(), to_yaml(&resource.properties)?);
    }
    if let Some(get) = &resource.get {
        out.insert("get".into(), to_yaml(get)?);
    }
    let options = render_options(&resource.options);
    if options.as_object().is_some_and(|o| !o.is_empty()) {
        out.insert("options".into(), to_yaml(&options)?);
    }
    Ok(YamlValue::Mapping(out))
}

/// Build the program document for `stack`
pub fn program(stack: &Stack) -> Result<YamlValue> {
    let mut doc = Mapping::new();
    doc.insert("name".into(), stack.name().into());
    doc.insert("runtime".into(), RUNTIME.into());
    if let Some(description) = stack.description() {
        doc.insert("description".into(), description.into());
    }

    if !stack.variables().is_empty() {
        let mut variables = Mapping::new();
        for variable in stack.variables() {
            let value = if variable.secret {
                secret(&variable.value)
            } else {
                variable.value.clone()
            };
            variables.insert(variable.name.clone().into(), to_yaml(&value)?);
        }
        doc.insert("variables".into(), YamlValue::Mapping(variables));
    }

    let mut resources = Mapping::new();
    for resource in stack.resources() {
        resources.insert(resource.name.clone().into(), render_resource(resource)?);
    }
    doc.insert("resources".into(), YamlValue::Mapping(resources));

    let mut outputs = Mapping::new();
    for (name, output) in stack.outputs() {
        let value = if output.secret {
            secret(&output.value)
        } else {
            output.value.clone()
        };
        outputs.insert(name.into(), to_yaml(&value)?);
    }
    if !outputs.is_empty() {
        doc.insert("outputs".into(), YamlValue::Mapping(outputs));
    }

    Ok(YamlValue::Mapping(doc))
}

/// Validate `stack` and render it as YAML program text
pub fn render_program(stack: &Stack) -> Result<String> {
    stack.validate()?;
    serde_yaml::to_string(&program(stack)?)
        .map_err(|e| Error::serialization_for("program", e.to_string()))
}
