//! Environment bindings
//!
//! A binding is an environment variable whose value is a template:
//!
//! - `${NAME}` expands another binding
//! - `${pkg:openssl}` expands a package prefix, `${pkg:openssl.lib}` its
//!   first `lib` dir (also `bin`, `include`, `pkgconfig`). Only a trailing
//!   output name is split off, so `${pkg:python3.9}` names `python3.9`
//! - `${toolchain}` expands the toolchain prefix
//! - `$$` is a literal `$`; any other `$` is kept as is
//!
//! Package references only see the dependency set, never the wider
//! universe, so the shell cannot reach a package the build does not use.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::core::deps::DependencySet;
use crate::core::toolchain::ToolchainDescription;
use crate::core::universe::OutputKind;
use crate::error::EnvironmentError;

/// One piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Binding(String),
    Package { name: String, output: Option<String> },
    Toolchain,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse the template of `binding`
pub fn parse(binding: &str, template: &str) -> Result<Vec<Segment>, EnvironmentError> {
    let malformed = |reason: String| EnvironmentError::MalformedTemplate {
        binding: binding.to_string(),
        reason,
    };

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        literal.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            literal.push('$');
            rest = tail;
        } else if let Some(tail) = after.strip_prefix('{') {
            let end = tail
                .find('}')
                .ok_or_else(|| malformed(format!("unterminated '${{' in '{template}'")))?;
            let reference = &tail[..end];

            let segment = if reference == "toolchain" {
                Segment::Toolchain
            } else if let Some(package) = reference.strip_prefix("pkg:") {
                let (name, output) = match package.rsplit_once('.') {
                    Some((name, output)) if OutputKind::parse(output).is_some() => {
                        (name, Some(output.to_string()))
                    }
                    _ => (package, None),
                };
                if name.is_empty() {
                    return Err(malformed(format!("empty package name in '${{{reference}}}'")));
                }
                Segment::Package {
                    name: name.to_string(),
                    output,
                }
            } else if is_identifier(reference) {
                Segment::Binding(reference.to_string())
            } else {
                return Err(malformed(format!("invalid reference '${{{reference}}}'")));
            };

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(segment);
            rest = &tail[end + 1..];
        } else {
            literal.push('$');
            rest = after;
        }
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// What package and toolchain references resolve against
#[derive(Debug, Clone, Copy)]
pub struct BindingContext<'a> {
    pub dependencies: &'a DependencySet,
    pub toolchain: &'a ToolchainDescription,
}

/// Resolve every binding to its final value
pub fn resolve(
    bindings: &BTreeMap<String, String>,
    context: BindingContext<'_>,
) -> Result<BTreeMap<String, String>, EnvironmentError> {
    let mut parsed = HashMap::new();
    for (name, template) in bindings {
        if !is_identifier(name) {
            return Err(EnvironmentError::MalformedTemplate {
                binding: name.clone(),
                reason: "binding name is not a valid variable name".to_string(),
            });
        }
        parsed.insert(name.as_str(), parse(name, template)?);
    }

    let mut resolver = Resolver {
        parsed: &parsed,
        context,
        resolved: HashMap::new(),
        in_progress: HashSet::new(),
        path: Vec::new(),
    };

    bindings
        .keys()
        .map(|name| Ok((name.clone(), resolver.visit(name)?)))
        .collect()
}

struct Resolver<'a> {
    parsed: &'a HashMap<&'a str, Vec<Segment>>,
    context: BindingContext<'a>,
    resolved: HashMap<String, String>,
    in_progress: HashSet<String>,
    path: Vec<String>,
}

impl Resolver<'_> {
    fn visit(&mut self, name: &str) -> Result<String, EnvironmentError> {
        if let Some(value) = self.resolved.get(name) {
            return Ok(value.clone());
        }

        if self.in_progress.contains(name) {
            let start = self.path.iter().position(|n| n == name).unwrap_or(0);
            let mut cycle = self.path[start..].to_vec();
            cycle.push(name.to_string());
            return Err(EnvironmentError::BindingCycle { cycle });
        }

        let parsed = self.parsed;
        let Some(segments) = parsed.get(name) else {
            return Err(EnvironmentError::UnknownBinding {
                binding: self.path.last().cloned().unwrap_or_default(),
                reference: name.to_string(),
            });
        };

        self.in_progress.insert(name.to_string());
        self.path.push(name.to_string());

        let mut value = String::new();
        for segment in segments {
            match segment {
                Segment::Literal(text) => value.push_str(text),
                Segment::Binding(reference) => value.push_str(&self.visit(reference)?),
                Segment::Toolchain => {
                    value.push_str(&self.context.toolchain.prefix.display().to_string());
                }
                Segment::Package { name: package, output } => {
                    value.push_str(&self.package(name, package, output.as_deref())?);
                }
            }
        }

        self.path.pop();
        self.in_progress.remove(name);
        self.resolved.insert(name.to_string(), value.clone());
        Ok(value)
    }

    fn package(
        &self,
        binding: &str,
        package: &str,
        output: Option<&str>,
    ) -> Result<String, EnvironmentError> {
        let dependencies = self.context.dependencies;
        let Some(found) = dependencies.get(package) else {
            // `${pkg:openssl.share}`: a known package with an unknown output
            if let Some((base, suffix)) = package.rsplit_once('.') {
                if output.is_none() && dependencies.get(base).is_some() {
                    return Err(EnvironmentError::UnknownOutput {
                        binding: binding.to_string(),
                        package: base.to_string(),
                        output: suffix.to_string(),
                    });
                }
            }
            return Err(EnvironmentError::UnresolvedDependency {
                binding: binding.to_string(),
                package: package.to_string(),
            });
        };

        let Some(output) = output else {
            return Ok(found.prefix.display().to_string());
        };

        let unknown = || EnvironmentError::UnknownOutput {
            binding: binding.to_string(),
            package: package.to_string(),
            output: output.to_string(),
        };
        let kind = OutputKind::parse(output).ok_or_else(unknown)?;
        found
            .dirs(kind)
            .first()
            .map(|dir| dir.display().to_string())
            .ok_or_else(unknown)
    }
}
